//! Catalog data sources used to resolve suggestions
//!
//! The metadata provider answers both "what is this id" and "which titles
//! match this text"; the external id provider maps free text to a canonical id
//! through a second service when the first finds nothing.
use crate::{
    error::AppResult,
    models::{BaseTitle, TitleType},
};

pub mod cinemeta;
pub mod tmdb;

pub use cinemeta::CinemetaProvider;
pub use tmdb::TmdbProvider;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch canonical metadata for a catalog id
    ///
    /// Fails with `NotFound` when the id is unknown for the type.
    async fn fetch_meta(&self, title_type: TitleType, id: &str) -> AppResult<BaseTitle>;

    /// Search titles of one type by free text, best match first
    async fn search_titles(&self, query: &str, title_type: TitleType) -> AppResult<Vec<BaseTitle>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ExternalIdProvider: Send + Sync {
    /// Map a title and year to a canonical catalog entry, if the service knows one
    async fn resolve_external_id(
        &self,
        title: &str,
        year: Option<i32>,
        title_type: TitleType,
        credential: &str,
    ) -> AppResult<Option<BaseTitle>>;

    fn name(&self) -> &'static str;
}
