use crate::models::BaseTitle;

const MAX_GENRES: usize = 3;
const MAX_DIRECTORS: usize = 2;
const MAX_CAST: usize = 3;
const MAX_PLOT_CHARS: usize = 250;

/// Builds the similarity prompt for a seed title
pub fn build_prompt(base: &BaseTitle, target_count: usize) -> String {
    let year = base
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "?".to_string());
    let genres = if base.genres.is_empty() {
        "Unknown".to_string()
    } else {
        take_joined(&base.genres, MAX_GENRES)
    };
    let plot: String = base
        .description
        .as_deref()
        .unwrap_or_default()
        .chars()
        .take(MAX_PLOT_CHARS)
        .collect();
    let directors = take_joined(&base.director, MAX_DIRECTORS);
    let cast = take_joined(&base.cast, MAX_CAST);

    let mut prompt = format!(
        "Find {} similar {} to: {} ({})\nGenres: {}\n",
        target_count, base.title_type, base.name, year, genres
    );
    if !directors.is_empty() {
        prompt.push_str(&format!("Director: {}\n", directors));
    }
    if !plot.trim().is_empty() {
        prompt.push_str(&format!("Plot: {}\n", plot.trim()));
    }
    if !cast.is_empty() {
        prompt.push_str(&format!("Cast: {}\n", cast));
    }
    prompt.push_str(
        "JSON: {\"similar\":[{\"title\":\"Movie Name\",\"year\":2020,\"reason\":\"Brief reason\"}]}\n",
    );
    prompt.push_str(
        "Priority: 1) Same franchise/series titles FIRST 2) Same director/genre \
         3) Similar themes/tone 4) Popular acclaimed titles\n",
    );
    prompt.push_str(
        "Keep reasons under 6 words. Include sequels, prequels, and franchise titles at the top.",
    );
    prompt
}

fn take_joined(values: &[String], limit: usize) -> String {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .take(limit)
        .collect::<Vec<_>>()
        .join(", ")
}
