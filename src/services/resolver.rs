use std::sync::Arc;

use crate::{
    error::AppResult,
    models::{BaseTitle, Candidate, ResolvedTitle, TitleType},
    services::providers::{ExternalIdProvider, MetadataProvider},
};

/// Shortest normalized title that may count as a substring match
const MIN_CONTAINED_LEN: usize = 4;

/// Maps model suggestions onto catalog entries
///
/// Resolution is sequential so the number of requests hitting the secondary
/// lookup service stays bounded by the candidate count.
pub struct TitleResolver {
    metadata: Arc<dyn MetadataProvider>,
    external_ids: Arc<dyn ExternalIdProvider>,
}

impl TitleResolver {
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        external_ids: Arc<dyn ExternalIdProvider>,
    ) -> Self {
        Self {
            metadata,
            external_ids,
        }
    }

    /// Resolves every candidate, preserving order
    ///
    /// For series, candidates that look like the seed itself are dropped.
    /// Every other candidate yields exactly one entry: the catalog match, or
    /// a placeholder when nothing matched or a lookup failed.
    pub async fn resolve(
        &self,
        candidates: Vec<Candidate>,
        target_type: TitleType,
        seed_name: Option<&str>,
        secondary_credential: Option<&str>,
    ) -> Vec<ResolvedTitle> {
        let mut resolved = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if target_type == TitleType::Series {
                if let Some(seed) = seed_name {
                    if is_same_series(seed, &candidate.title) {
                        tracing::debug!(candidate = %candidate.title, seed = %seed, "Skipping self-match");
                        continue;
                    }
                }
            }

            let entry = match self
                .find_match(&candidate, target_type, secondary_credential)
                .await
            {
                Ok(Some(meta)) => ResolvedTitle::from_match(meta, &candidate, target_type),
                Ok(None) => {
                    tracing::debug!(candidate = %candidate.title, "No catalog match, using placeholder");
                    ResolvedTitle::placeholder(&candidate, target_type)
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        candidate = %candidate.title,
                        "Candidate resolution failed, using placeholder"
                    );
                    ResolvedTitle::placeholder(&candidate, target_type)
                }
            };
            resolved.push(entry);
        }

        resolved
    }

    /// Primary search first, then the secondary lookup if it is configured
    async fn find_match(
        &self,
        candidate: &Candidate,
        target_type: TitleType,
        secondary_credential: Option<&str>,
    ) -> AppResult<Option<BaseTitle>> {
        if candidate.title.trim().is_empty() {
            return Ok(None);
        }

        let matches = self
            .metadata
            .search_titles(&candidate.query(), target_type)
            .await?;
        if let Some(first) = matches.into_iter().next() {
            if first.title_type == target_type {
                return Ok(Some(first));
            }
            tracing::debug!(
                candidate = %candidate.title,
                found_type = %first.title_type,
                "Primary match has the wrong type"
            );
        }

        let Some(credential) = secondary_credential else {
            return Ok(None);
        };

        let found = self
            .external_ids
            .resolve_external_id(candidate.title.trim(), candidate.year, target_type, credential)
            .await?;
        Ok(found.filter(|meta| meta.title_type == target_type))
    }
}

/// Lowercase alphanumerics, single-spaced, without a leading "the"
fn normalize_title(title: &str) -> String {
    let cleaned: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = cleaned.split_whitespace().collect();
    let words = match words.split_first() {
        Some((&"the", rest)) if !rest.is_empty() => rest,
        _ => &words[..],
    };
    words.join(" ")
}

/// Whether a suggested series is the seed series under another name
///
/// Heuristic: equal after normalization, or one contains the other and the
/// shorter side is long enough not to be a common word.
pub fn is_same_series(seed: &str, candidate: &str) -> bool {
    let seed = normalize_title(seed);
    let candidate = normalize_title(candidate);
    if seed.is_empty() || candidate.is_empty() {
        return false;
    }
    if seed == candidate {
        return true;
    }

    let (shorter, longer) = if seed.len() <= candidate.len() {
        (&seed, &candidate)
    } else {
        (&candidate, &seed)
    };
    shorter.chars().count() >= MIN_CONTAINED_LEN && longer.contains(shorter.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::providers::{MockExternalIdProvider, MockMetadataProvider};
    use mockall::predicate::eq;

    fn resolver(
        metadata: MockMetadataProvider,
        external_ids: MockExternalIdProvider,
    ) -> TitleResolver {
        TitleResolver::new(Arc::new(metadata), Arc::new(external_ids))
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(normalize_title("The Office (US)"), "office us");
        assert_eq!(normalize_title("  Breaking   Bad: "), "breaking bad");
        assert_eq!(normalize_title("The"), "the");
    }

    #[test]
    fn test_is_same_series() {
        assert!(is_same_series("Breaking Bad", "breaking bad"));
        assert!(is_same_series("The Office", "Office"));
        assert!(is_same_series("Stranger Things", "Stranger Things 2"));
        assert!(!is_same_series("Breaking Bad", "Better Call Saul"));
        // a shared opening word is enough to over-match
        assert!(is_same_series("Lost", "Lost in Space"));
        assert!(!is_same_series("Up", "Upload"));
        assert!(!is_same_series("", "Anything"));
    }

    #[tokio::test]
    async fn test_primary_match_is_used() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_search_titles()
            .with(eq("Interstellar 2014"), eq(TitleType::Movie))
            .times(1)
            .returning(|_, _| {
                Ok(vec![BaseTitle::new("tt0816692", TitleType::Movie, "Interstellar")])
            });
        let mut external = MockExternalIdProvider::new();
        external.expect_resolve_external_id().never();

        let resolved = resolver(metadata, external)
            .resolve(
                vec![Candidate::new("Interstellar", Some(2014), Some("Same director"))],
                TitleType::Movie,
                Some("Inception"),
                Some("tmdb-token"),
            )
            .await;

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].meta.id, "tt0816692");
        assert_eq!(resolved[0].meta.year, Some(2014));
        assert_eq!(resolved[0].reason.as_deref(), Some("Same director"));
    }

    #[tokio::test]
    async fn test_secondary_lookup_on_primary_miss() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_search_titles()
            .returning(|_, _| Ok(Vec::new()));
        let mut external = MockExternalIdProvider::new();
        external
            .expect_resolve_external_id()
            .withf(|title, year, title_type, credential| {
                title == "Heat"
                    && *year == Some(1995)
                    && *title_type == TitleType::Movie
                    && credential == "tok"
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(Some(
                    BaseTitle::new("tt0113277", TitleType::Movie, "Heat").with_year(Some(1995)),
                ))
            });

        let resolved = resolver(metadata, external)
            .resolve(
                vec![Candidate::new("Heat", Some(1995), None)],
                TitleType::Movie,
                None,
                Some("tok"),
            )
            .await;

        assert_eq!(resolved[0].meta.id, "tt0113277");
        assert!(!resolved[0].is_placeholder());
    }

    #[tokio::test]
    async fn test_no_secondary_credential_gives_placeholder() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_search_titles()
            .returning(|_, _| Ok(Vec::new()));
        let mut external = MockExternalIdProvider::new();
        external.expect_resolve_external_id().never();

        let resolved = resolver(metadata, external)
            .resolve(
                vec![Candidate::new("Some Obscure Title", Some(1987), Some("Hidden gem"))],
                TitleType::Movie,
                None,
                None,
            )
            .await;

        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].is_placeholder());
        assert!(resolved[0].meta.id.contains("Some Obscure Title 1987"));
        assert_eq!(resolved[0].meta.name, "Some Obscure Title");
        assert_eq!(resolved[0].meta.year, Some(1987));
        assert_eq!(resolved[0].reason.as_deref(), Some("Hidden gem"));
    }

    #[tokio::test]
    async fn test_wrong_type_match_is_discarded() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_search_titles().returning(|_, _| {
            Ok(vec![BaseTitle::new("tt0903747", TitleType::Series, "Breaking Bad")])
        });
        let mut external = MockExternalIdProvider::new();
        external
            .expect_resolve_external_id()
            .times(1)
            .returning(|_, _, _, _| Ok(None));

        let resolved = resolver(metadata, external)
            .resolve(
                vec![Candidate::new("Breaking Bad", None, None)],
                TitleType::Movie,
                None,
                Some("tok"),
            )
            .await;

        assert!(resolved[0].is_placeholder());
        assert_eq!(resolved[0].meta.title_type, TitleType::Movie);
    }

    #[tokio::test]
    async fn test_failure_is_isolated_per_candidate() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_search_titles()
            .with(eq("Broken 2001"), eq(TitleType::Movie))
            .returning(|_, _| Err(AppError::ExternalApi("boom".to_string())));
        metadata
            .expect_search_titles()
            .with(eq("Working 2002"), eq(TitleType::Movie))
            .returning(|_, _| Ok(vec![BaseTitle::new("tt2", TitleType::Movie, "Working")]));
        let mut external = MockExternalIdProvider::new();
        external
            .expect_resolve_external_id()
            .returning(|_, _, _, _| Err(AppError::ExternalApi("also boom".to_string())));

        let resolved = resolver(metadata, external)
            .resolve(
                vec![
                    Candidate::new("Broken", Some(2001), None),
                    Candidate::new("Working", Some(2002), None),
                ],
                TitleType::Movie,
                None,
                Some("tok"),
            )
            .await;

        assert_eq!(resolved.len(), 2);
        assert!(resolved[0].is_placeholder());
        assert_eq!(resolved[1].meta.id, "tt2");
    }

    #[tokio::test]
    async fn test_series_self_match_is_filtered() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_search_titles()
            .with(eq("Better Call Saul 2015"), eq(TitleType::Series))
            .times(1)
            .returning(|_, _| {
                Ok(vec![BaseTitle::new("tt3032476", TitleType::Series, "Better Call Saul")])
            });
        let external = MockExternalIdProvider::new();

        let resolved = resolver(metadata, external)
            .resolve(
                vec![
                    Candidate::new("Breaking Bad", Some(2008), None),
                    Candidate::new("Better Call Saul", Some(2015), None),
                ],
                TitleType::Series,
                Some("Breaking Bad"),
                None,
            )
            .await;

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].meta.name, "Better Call Saul");
    }

    #[tokio::test]
    async fn test_movies_are_never_self_filtered() {
        let mut metadata = MockMetadataProvider::new();
        metadata
            .expect_search_titles()
            .returning(|_, _| Ok(Vec::new()));
        let external = MockExternalIdProvider::new();

        let resolved = resolver(metadata, external)
            .resolve(
                vec![Candidate::new("Inception", Some(2010), None)],
                TitleType::Movie,
                Some("Inception"),
                None,
            )
            .await;

        assert_eq!(resolved.len(), 1);
    }

    #[tokio::test]
    async fn test_blank_title_becomes_placeholder_without_lookup() {
        let mut metadata = MockMetadataProvider::new();
        metadata.expect_search_titles().never();
        let mut external = MockExternalIdProvider::new();
        external.expect_resolve_external_id().never();

        let resolved = resolver(metadata, external)
            .resolve(
                vec![Candidate::new("", Some(1999), None)],
                TitleType::Movie,
                None,
                Some("tok"),
            )
            .await;

        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].is_placeholder());
    }
}
