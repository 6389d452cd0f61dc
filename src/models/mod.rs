use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub mod addon;
pub mod title;

pub use addon::{
    discover_link, CatalogResponse, Manifest, MetaDetail, MetaLink, MetaResponse, Stream,
    StreamResponse, ADDON_ID, SIMILAR_CATALOG_ID, SIMILAR_ID_PREFIX,
};
pub use title::{BaseTitle, Candidate, ResolvedTitle, TitleType, PLACEHOLDER_PREFIX};

// ============================================================================
// Lenient field decoding
// ============================================================================

/// Reads a year from a number, a string such as `"2010"` or `"2008–2013"`, or
/// anything else (which yields `None`).
pub(crate) fn lenient_year<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(year_from_value))
}

pub(crate) fn year_from_value(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
        Value::String(s) => year_from_str(s),
        _ => None,
    }
}

/// Leading four-digit year of a date or range string
pub(crate) fn year_from_str(s: &str) -> Option<i32> {
    let digits: String = s.trim().chars().take(4).collect();
    if digits.len() == 4 && digits.chars().all(|c| c.is_ascii_digit()) {
        digits.parse().ok()
    } else {
        None
    }
}

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

/// Strings pass through, numbers are rendered, everything else is `None`
pub(crate) fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Person lists arrive as a single string, an array of strings, or an array
/// of `{ "name": ... }` objects.
pub(crate) fn lenient_names<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let names = match value {
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s],
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s),
                Value::Object(obj) => obj
                    .get("name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    };
    Ok(names)
}

// ============================================================================
// Cinemeta API Types
// ============================================================================

/// Response from GET /meta/{type}/{id}.json
#[derive(Debug, Clone, Deserialize)]
pub struct CinemetaMetaResponse {
    #[serde(default)]
    pub meta: Option<CinemetaMeta>,
}

/// Response from GET /catalog/{type}/top/search={query}.json
#[derive(Debug, Clone, Deserialize)]
pub struct CinemetaCatalogResponse {
    #[serde(default)]
    pub metas: Vec<Value>,
}

/// Raw meta object as Cinemeta serves it
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CinemetaMeta {
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub id: Option<String>,
    #[serde(rename = "type", default, deserialize_with = "lenient_opt_string")]
    pub title_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_year")]
    pub year: Option<i32>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub release_info: Option<String>,
    #[serde(default, deserialize_with = "lenient_names")]
    pub genres: Vec<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_names")]
    pub director: Vec<String>,
    #[serde(default, deserialize_with = "lenient_names")]
    pub cast: Vec<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub poster: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub background: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CinemetaMeta {
    /// Converts into a `BaseTitle`
    ///
    /// A missing `type` takes the requested type; a `type` outside
    /// movie/series, or a missing id, drops the entry.
    pub fn into_base_title(mut self, requested: TitleType) -> Option<BaseTitle> {
        let id = self.id.filter(|id| !id.trim().is_empty())?;
        let title_type = match self.title_type.as_deref() {
            None => requested,
            Some(raw) => raw.parse().ok()?,
        };
        let year = self
            .year
            .or_else(|| self.release_info.as_deref().and_then(year_from_str));
        if let Some(release_info) = self.release_info {
            self.extra
                .insert("releaseInfo".to_string(), Value::String(release_info));
        }

        Some(BaseTitle {
            id,
            title_type,
            name: self.name,
            year,
            genres: self.genres,
            description: self.description,
            director: self.director,
            cast: self.cast,
            poster: self.poster,
            background: self.background,
            extra: self.extra,
        })
    }
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// Response from GET /search/{movie|tv}
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchResponse {
    #[serde(default)]
    pub results: Vec<TmdbSearchResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbSearchResult {
    pub id: u64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub first_air_date: Option<String>,
}

impl TmdbSearchResult {
    pub fn display_name(&self) -> Option<&str> {
        self.title.as_deref().or(self.name.as_deref())
    }

    pub fn year(&self) -> Option<i32> {
        self.release_date
            .as_deref()
            .or(self.first_air_date.as_deref())
            .and_then(year_from_str)
    }
}

/// Response from GET /{movie|tv}/{id}/external_ids
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbExternalIds {
    #[serde(default)]
    pub imdb_id: Option<String>,
}

// ============================================================================
// Gemini API Types
// ============================================================================

/// Request body for POST /models/{model}:generateContent
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub contents: Vec<GeminiContent>,
    pub generation_config: GenerationConfig,
}

impl GenerateContentRequest {
    /// Single user turn with the fixed generation parameters
    pub fn single_turn(prompt: &str) -> Self {
        Self {
            contents: vec![GeminiContent {
                role: Some("user".to_string()),
                parts: vec![GeminiPart {
                    text: Some(prompt.to_string()),
                }],
            }],
            generation_config: GenerationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: 0.4,
            top_k: 20,
            top_p: 0.8,
            max_output_tokens: 1200,
            response_mime_type: "application/json".to_string(),
        }
    }
}

/// Response from generateContent; only the first text part is used
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeminiCandidate {
    #[serde(default)]
    pub content: Option<GeminiContent>,
}

impl GenerateContentResponse {
    /// `candidates[0].content.parts[0].text`, trimmed
    pub fn first_text(&self) -> Option<String> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_ref()
            .map(|text| text.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_year_from_str() {
        assert_eq!(year_from_str("2010"), Some(2010));
        assert_eq!(year_from_str("2008–2013"), Some(2008));
        assert_eq!(year_from_str("2014-11-05"), Some(2014));
        assert_eq!(year_from_str("soon"), None);
        assert_eq!(year_from_str(""), None);
    }

    #[test]
    fn test_cinemeta_meta_conversion() {
        let raw = json!({
            "id": "tt1375666",
            "type": "movie",
            "name": "Inception",
            "releaseInfo": "2010",
            "genres": ["Action", "Sci-Fi"],
            "director": ["Christopher Nolan"],
            "cast": [{"name": "Leonardo DiCaprio"}, "Tom Hardy"],
            "imdbRating": "8.8"
        });

        let meta: CinemetaMeta = serde_json::from_value(raw).unwrap();
        let base = meta.into_base_title(TitleType::Movie).unwrap();

        assert_eq!(base.id, "tt1375666");
        assert_eq!(base.title_type, TitleType::Movie);
        assert_eq!(base.year, Some(2010));
        assert_eq!(base.genres, vec!["Action", "Sci-Fi"]);
        assert_eq!(base.cast, vec!["Leonardo DiCaprio", "Tom Hardy"]);
        assert_eq!(base.extra["imdbRating"], "8.8");
        assert_eq!(base.extra["releaseInfo"], "2010");
    }

    #[test]
    fn test_cinemeta_meta_missing_type_uses_requested() {
        let meta: CinemetaMeta =
            serde_json::from_value(json!({"id": "tt0903747", "name": "Breaking Bad"})).unwrap();
        let base = meta.into_base_title(TitleType::Series).unwrap();
        assert_eq!(base.title_type, TitleType::Series);
    }

    #[test]
    fn test_cinemeta_meta_unknown_type_or_missing_id_dropped() {
        let meta: CinemetaMeta =
            serde_json::from_value(json!({"id": "x", "type": "channel", "name": "News"})).unwrap();
        assert!(meta.into_base_title(TitleType::Movie).is_none());

        let meta: CinemetaMeta = serde_json::from_value(json!({"name": "No Id"})).unwrap();
        assert!(meta.into_base_title(TitleType::Movie).is_none());
    }

    #[test]
    fn test_director_as_plain_string() {
        let meta: CinemetaMeta = serde_json::from_value(
            json!({"id": "tt1", "director": "Denis Villeneuve", "genres": null}),
        )
        .unwrap();
        assert_eq!(meta.director, vec!["Denis Villeneuve"]);
        assert!(meta.genres.is_empty());
    }

    #[test]
    fn test_tmdb_search_result_year_and_name() {
        let movie: TmdbSearchResult = serde_json::from_value(
            json!({"id": 157336, "title": "Interstellar", "release_date": "2014-11-05"}),
        )
        .unwrap();
        assert_eq!(movie.display_name(), Some("Interstellar"));
        assert_eq!(movie.year(), Some(2014));

        let show: TmdbSearchResult = serde_json::from_value(
            json!({"id": 1396, "name": "Breaking Bad", "first_air_date": ""}),
        )
        .unwrap();
        assert_eq!(show.display_name(), Some("Breaking Bad"));
        assert_eq!(show.year(), None);
    }

    #[test]
    fn test_generate_content_request_shape() {
        let request = GenerateContentRequest::single_turn("hello");
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1200);
        assert_eq!(json["generationConfig"]["topK"], 20);
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_generate_content_response_first_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{"content": {"parts": [{"text": "  {\"similar\": []}\n"}]}}]
        }))
        .unwrap();
        assert_eq!(response.first_text().as_deref(), Some("{\"similar\": []}"));

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.first_text(), None);
    }
}
