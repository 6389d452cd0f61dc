use serde::Serialize;

use super::{BaseTitle, ResolvedTitle, TitleType};

pub const ADDON_ID: &str = "community.kindred.ai-similar";
pub const SIMILAR_CATALOG_ID: &str = "ai-similar";
pub const SIMILAR_ID_PREFIX: &str = "similar:";
const LOGO_URL: &str = "https://stremio-logo.s3.eu-central-1.amazonaws.com/stremio-icon.png";
const BACKGROUND_URL: &str = "https://stremio-logo.s3.eu-central-1.amazonaws.com/hero-bg.png";

/// Deep link into the similar-titles catalog for a seed id
pub fn discover_link(title_type: TitleType, id: &str) -> String {
    format!(
        "stremio://discover/{}/{}/imdbId={}",
        title_type, SIMILAR_CATALOG_ID, id
    )
}

/// Add-on manifest served from /manifest.json
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub id: &'static str,
    pub version: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub logo: &'static str,
    pub background: &'static str,
    pub types: Vec<TitleType>,
    pub catalogs: Vec<ManifestCatalog>,
    pub resources: Vec<ManifestResource>,
    pub id_prefixes: Vec<&'static str>,
    pub behavior_hints: BehaviorHints,
    pub config: Vec<ConfigField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ManifestCatalog {
    #[serde(rename = "type")]
    pub title_type: TitleType,
    pub id: &'static str,
    pub name: &'static str,
    pub extra: Vec<CatalogExtraField>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CatalogExtraField {
    pub name: &'static str,
}

/// A resource is either a bare name or a restricted declaration
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ManifestResource {
    Name(&'static str),
    Detailed {
        name: &'static str,
        types: Vec<TitleType>,
        #[serde(rename = "idPrefixes")]
        id_prefixes: Vec<&'static str>,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorHints {
    pub configurable: bool,
    pub configuration_required: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigField {
    pub key: &'static str,
    pub title: &'static str,
    #[serde(rename = "type")]
    pub field_type: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<u64>,
}

impl Manifest {
    pub fn new(default_ttl: u64, default_max: usize) -> Self {
        let catalog = |title_type| ManifestCatalog {
            title_type,
            id: SIMILAR_CATALOG_ID,
            name: "AI Similar",
            extra: vec![
                CatalogExtraField { name: "imdbId" },
                CatalogExtraField { name: "max" },
            ],
        };

        Self {
            id: ADDON_ID,
            version: env!("CARGO_PKG_VERSION"),
            name: "AI Similar Titles",
            description: "Language-model generated similar movies and series",
            logo: LOGO_URL,
            background: BACKGROUND_URL,
            types: vec![TitleType::Movie, TitleType::Series],
            catalogs: vec![catalog(TitleType::Movie), catalog(TitleType::Series)],
            resources: vec![
                ManifestResource::Name("meta"),
                ManifestResource::Name("stream"),
                ManifestResource::Detailed {
                    name: "catalog",
                    types: vec![TitleType::Movie, TitleType::Series],
                    id_prefixes: vec!["similar", SIMILAR_CATALOG_ID],
                },
            ],
            id_prefixes: vec!["tt"],
            behavior_hints: BehaviorHints {
                configurable: true,
                configuration_required: true,
            },
            config: vec![
                ConfigField {
                    key: "geminiKey",
                    title: "Gemini API Key",
                    field_type: "text",
                    required: true,
                    default: None,
                },
                ConfigField {
                    key: "tmdbKey",
                    title: "TMDB (optional, improves matching)",
                    field_type: "text",
                    required: false,
                    default: None,
                },
                ConfigField {
                    key: "ttl",
                    title: "Cache TTL (seconds)",
                    field_type: "number",
                    required: false,
                    default: Some(default_ttl),
                },
                ConfigField {
                    key: "max",
                    title: "Max Similar Results (1-20)",
                    field_type: "number",
                    required: false,
                    default: Some(default_max as u64),
                },
            ],
        }
    }
}

/// Response for /catalog requests
#[derive(Debug, Clone, Serialize)]
pub struct CatalogResponse {
    pub metas: Vec<ResolvedTitle>,
}

impl CatalogResponse {
    pub fn empty() -> Self {
        Self { metas: Vec::new() }
    }

    /// The single entry shown when the catalog is opened without a seed id
    pub fn instructions(title_type: TitleType) -> Self {
        let mut meta = BaseTitle::new("ai:instructions", title_type, "Enter an IMDb ID (tt...)");
        meta.description = Some(
            "Usage: In the search/extra box type imdbId=tt1234567 OR open a title and choose \
             AI Similar provider to deep-link here."
                .to_string(),
        );
        meta.poster = Some(LOGO_URL.to_string());
        meta.background = Some(BACKGROUND_URL.to_string());
        Self {
            metas: vec![ResolvedTitle { meta, reason: None }],
        }
    }
}

/// Response for /meta requests
#[derive(Debug, Clone, Serialize)]
pub struct MetaResponse {
    pub meta: MetaDetail,
}

/// Base meta enriched with its similar titles
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaDetail {
    #[serde(flatten)]
    pub base: BaseTitle,
    pub ai_similar: Vec<ResolvedTitle>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<MetaLink>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetaDetail {
    pub fn new(mut base: BaseTitle, ai_similar: Vec<ResolvedTitle>) -> Self {
        // catalog metas carry their own `links`; ours replace them
        for owned in ["links", "aiSimilar", "error"] {
            base.extra.remove(owned);
        }
        let links = vec![MetaLink {
            name: "AI Similar",
            category: "recommendation",
            url: discover_link(base.title_type, &base.id),
        }];
        Self {
            base,
            ai_similar,
            links,
            error: None,
        }
    }

    /// Stand-in returned when the seed could not be loaded
    pub fn unknown(id: &str, title_type: TitleType, error: String) -> Self {
        Self {
            base: BaseTitle::new(id, title_type, "Unknown"),
            ai_similar: Vec::new(),
            links: Vec::new(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetaLink {
    pub name: &'static str,
    pub category: &'static str,
    pub url: String,
}

/// Response for /stream requests
#[derive(Debug, Clone, Serialize)]
pub struct StreamResponse {
    pub streams: Vec<Stream>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    pub name: String,
    pub title: String,
    pub description: String,
    pub external_url: String,
}

impl Stream {
    /// Navigational entry opening the similar-titles catalog for a seed
    pub fn similar_link(title_type: TitleType, id: &str, title_name: &str) -> Self {
        Self {
            name: "AI Similar".to_string(),
            title: "AI Similar Recommendations".to_string(),
            description: format!("Open AI Similar catalog for {}", title_name),
            external_url: discover_link(title_type, id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_serialization() {
        let json = serde_json::to_value(Manifest::new(21600, 8)).unwrap();

        assert_eq!(json["id"], ADDON_ID);
        assert_eq!(json["types"], serde_json::json!(["movie", "series"]));
        assert_eq!(json["catalogs"][1]["type"], "series");
        assert_eq!(json["catalogs"][0]["extra"][0]["name"], "imdbId");
        assert_eq!(json["resources"][0], "meta");
        assert_eq!(json["resources"][2]["name"], "catalog");
        assert_eq!(json["resources"][2]["idPrefixes"][0], "similar");
        assert_eq!(json["behaviorHints"]["configurationRequired"], true);
        assert_eq!(json["config"][0]["required"], true);
        assert!(json["config"][1].get("required").is_none());
        assert_eq!(json["config"][2]["default"], 21600);
        assert_eq!(json["config"][3]["default"], 8);
    }

    #[test]
    fn test_meta_detail_links_to_catalog() {
        let base = BaseTitle::new("tt1375666", TitleType::Movie, "Inception");
        let json = serde_json::to_value(MetaDetail::new(base, Vec::new())).unwrap();

        assert_eq!(json["name"], "Inception");
        assert_eq!(json["aiSimilar"], serde_json::json!([]));
        assert_eq!(
            json["links"][0]["url"],
            "stremio://discover/movie/ai-similar/imdbId=tt1375666"
        );
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_meta_detail_replaces_catalog_links() {
        let mut base = BaseTitle::new("tt1375666", TitleType::Movie, "Inception");
        base.extra.insert(
            "links".to_string(),
            serde_json::json!([{"name": "Sci-Fi", "category": "Genres", "url": "stremio:///genre"}]),
        );
        base.extra
            .insert("imdbRating".to_string(), serde_json::json!("8.8"));

        let text = serde_json::to_string(&MetaDetail::new(base, Vec::new())).unwrap();

        assert_eq!(text.matches("\"links\"").count(), 1);
        let json: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json["links"].as_array().unwrap().len(), 1);
        assert_eq!(json["links"][0]["name"], "AI Similar");
        assert_eq!(json["imdbRating"], "8.8");
    }

    #[test]
    fn test_unknown_meta_carries_error() {
        let detail = MetaDetail::unknown("tt0", TitleType::Series, "not found".to_string());
        let json = serde_json::to_value(detail).unwrap();

        assert_eq!(json["name"], "Unknown");
        assert_eq!(json["type"], "series");
        assert_eq!(json["error"], "not found");
    }

    #[test]
    fn test_stream_link() {
        let stream = Stream::similar_link(TitleType::Series, "tt0903747", "Breaking Bad");
        assert_eq!(
            stream.external_url,
            "stremio://discover/series/ai-similar/imdbId=tt0903747"
        );
        assert_eq!(stream.description, "Open AI Similar catalog for Breaking Bad");
    }
}
