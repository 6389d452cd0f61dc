use std::sync::Arc;

use tokio::time::Duration;

use crate::{
    config::Config,
    db::{sweep_interval, Cache, CacheSweeperHandle},
    services::{
        providers::{CinemetaProvider, ExternalIdProvider, MetadataProvider, TmdbProvider},
        GeminiClient, RateLimiter, SimilarityService, TextGenerator, TitleResolver,
    },
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub metadata: Arc<dyn MetadataProvider>,
    pub similarity: Arc<SimilarityService>,
}

impl AppState {
    /// Wires the production providers and starts the cache sweeper
    pub fn new(config: Config) -> (Self, CacheSweeperHandle) {
        let metadata: Arc<dyn MetadataProvider> =
            Arc::new(CinemetaProvider::new(config.cinemeta_url.clone()));
        let external_ids: Arc<dyn ExternalIdProvider> =
            Arc::new(TmdbProvider::new(config.tmdb_url.clone()));
        let generator: Arc<dyn TextGenerator> = Arc::new(GeminiClient::from_config(&config));
        let (cache, sweeper) = Cache::new(sweep_interval(config.cache_ttl_seconds));
        tracing::info!(
            metadata = metadata.name(),
            external_ids = external_ids.name(),
            "Providers configured"
        );

        let state = Self::with_providers(config, metadata, external_ids, generator, cache);
        (state, sweeper)
    }

    /// Builds the state around caller-supplied collaborators
    pub fn with_providers(
        config: Config,
        metadata: Arc<dyn MetadataProvider>,
        external_ids: Arc<dyn ExternalIdProvider>,
        generator: Arc<dyn TextGenerator>,
        cache: Cache,
    ) -> Self {
        let resolver = TitleResolver::new(Arc::clone(&metadata), external_ids);
        let rate_limiter = RateLimiter::new(
            config.rate_limit_max_requests,
            Duration::from_secs(config.rate_limit_window_secs),
        );
        let similarity = SimilarityService::new(
            generator,
            Arc::clone(&metadata),
            resolver,
            rate_limiter,
            cache,
            Duration::from_millis(config.response_deadline_ms),
        );

        Self {
            config: Arc::new(config),
            metadata,
            similarity: Arc::new(similarity),
        }
    }
}
