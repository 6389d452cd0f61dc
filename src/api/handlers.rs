use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

use crate::{
    config::{clamp_max_results, RequestOverrides, RuntimeConfig},
    error::{AppError, AppResult},
    models::{
        BaseTitle, CatalogResponse, Manifest, MetaDetail, MetaResponse, Stream, StreamResponse,
        TitleType, SIMILAR_CATALOG_ID, SIMILAR_ID_PREFIX,
    },
};

use super::AppState;

/// Catalog extra segment (`imdbId=tt..&max=5`) split into seed id and overrides
#[derive(Debug, Default, PartialEq)]
pub struct CatalogExtra {
    pub imdb_id: Option<String>,
    pub overrides: RequestOverrides,
}

impl CatalogExtra {
    pub fn parse(raw: &str) -> Self {
        let mut extra = Self::default();
        for pair in strip_json(raw).split('&') {
            let Some((key, value)) = pair.split_once('=') else {
                continue;
            };
            let value = match urlencoding::decode(value) {
                Ok(value) => value.trim().to_string(),
                Err(_) => continue,
            };
            if value.is_empty() {
                continue;
            }
            match key {
                "imdbId" => extra.imdb_id = Some(value),
                "geminiKey" => extra.overrides.gemini_key = Some(value),
                "tmdbKey" => extra.overrides.tmdb_key = Some(value),
                "ttl" => extra.overrides.ttl = Some(value),
                "max" => extra.overrides.max = Some(value),
                _ => {}
            }
        }
        extra
    }
}

fn strip_json(raw: &str) -> &str {
    raw.strip_suffix(".json").unwrap_or(raw)
}

fn parse_type(raw: &str) -> AppResult<TitleType> {
    raw.parse().map_err(AppError::InvalidInput)
}

/// Seed id a catalog request asks about, if any
///
/// `similar:tt..` ids carry the seed themselves; the `ai-similar` catalog
/// takes it from the `imdbId` extra.
fn catalog_seed(catalog_id: &str, extra: &CatalogExtra) -> Option<String> {
    if let Some(seed) = catalog_id.strip_prefix(SIMILAR_ID_PREFIX) {
        return Some(seed.trim().to_string()).filter(|s| !s.is_empty());
    }
    extra.imdb_id.clone()
}

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

pub async fn manifest(State(state): State<AppState>) -> Json<Manifest> {
    Json(Manifest::new(
        state.config.cache_ttl_seconds,
        clamp_max_results(state.config.max_results as i64),
    ))
}

pub async fn catalog(
    State(state): State<AppState>,
    Path((title_type, catalog_id)): Path<(String, String)>,
    Query(overrides): Query<RequestOverrides>,
) -> Json<CatalogResponse> {
    Json(catalog_response(&state, &title_type, &catalog_id, CatalogExtra::default(), overrides).await)
}

pub async fn catalog_with_extra(
    State(state): State<AppState>,
    Path((title_type, catalog_id, extra)): Path<(String, String, String)>,
    Query(overrides): Query<RequestOverrides>,
) -> Json<CatalogResponse> {
    let extra = CatalogExtra::parse(&extra);
    Json(catalog_response(&state, &title_type, &catalog_id, extra, overrides).await)
}

/// Catalog lookups never fail; anything unexpected becomes an empty list
async fn catalog_response(
    state: &AppState,
    raw_type: &str,
    raw_catalog_id: &str,
    extra: CatalogExtra,
    query: RequestOverrides,
) -> CatalogResponse {
    let Ok(title_type) = parse_type(strip_json(raw_type)) else {
        return CatalogResponse::empty();
    };
    let catalog_id = strip_json(raw_catalog_id);
    if catalog_id != SIMILAR_CATALOG_ID && !catalog_id.starts_with(SIMILAR_ID_PREFIX) {
        return CatalogResponse::empty();
    }

    let Some(seed) = catalog_seed(catalog_id, &extra) else {
        return CatalogResponse::instructions(title_type);
    };

    let overrides = extra.overrides.or(query);
    let runtime = RuntimeConfig::resolve(&overrides, &state.config);

    match state.similarity.similar_for(title_type, &seed, &runtime).await {
        Ok(similar) => CatalogResponse {
            metas: similar.into_iter().map(|s| s.into_preview()).collect(),
        },
        Err(e) => {
            tracing::warn!(seed = %seed, title_type = %title_type, error = %e, "Catalog lookup failed");
            CatalogResponse::empty()
        }
    }
}

/// Seed meta enriched with its similar titles
///
/// A seed that cannot be loaded still answers 200 with an "Unknown" meta.
pub async fn meta(
    State(state): State<AppState>,
    Path((title_type, id)): Path<(String, String)>,
    Query(overrides): Query<RequestOverrides>,
) -> AppResult<Json<MetaResponse>> {
    let title_type = parse_type(&title_type)?;
    let id = strip_json(&id).to_string();
    let runtime = RuntimeConfig::resolve(&overrides, &state.config);

    let base = match state.metadata.fetch_meta(title_type, &id).await {
        Ok(base) => BaseTitle { id: id.clone(), ..base },
        Err(e) => {
            tracing::warn!(id = %id, title_type = %title_type, error = %e, "Seed meta unavailable");
            return Ok(Json(MetaResponse {
                meta: MetaDetail::unknown(&id, title_type, e.to_string()),
            }));
        }
    };

    let similar = match state
        .similarity
        .similar_for_base(base.clone(), title_type, &runtime)
        .await
    {
        Ok(similar) => similar,
        Err(e) => {
            tracing::warn!(id = %id, error = %e, "Similar titles unavailable for meta");
            return Ok(Json(MetaResponse {
                meta: MetaDetail {
                    error: Some(e.to_string()),
                    ..MetaDetail::new(base, Vec::new())
                },
            }));
        }
    };

    tracing::info!(id = %id, similar = similar.len(), "Meta served");
    Ok(Json(MetaResponse {
        meta: MetaDetail::new(base, similar),
    }))
}

/// One navigational stream that opens the similar-titles catalog
pub async fn stream(
    State(state): State<AppState>,
    Path((title_type, id)): Path<(String, String)>,
) -> AppResult<Json<StreamResponse>> {
    let title_type = parse_type(&title_type)?;
    let id = strip_json(&id).to_string();

    let name = match state.metadata.fetch_meta(title_type, &id).await {
        Ok(base) if !base.name.trim().is_empty() => base.name,
        Ok(_) => id.clone(),
        Err(e) => {
            tracing::debug!(id = %id, error = %e, "Stream title lookup failed, using id");
            id.clone()
        }
    };

    Ok(Json(StreamResponse {
        streams: vec![Stream::similar_link(title_type, &id, &name)],
    }))
}
