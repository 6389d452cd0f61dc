use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::{
    config::{RuntimeConfig, MAX_RESULTS_CEILING},
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{BaseTitle, ResolvedTitle, TitleType},
    services::{
        llm::TextGenerator, parser::parse_candidates, prompt::build_prompt,
        providers::MetadataProvider, rate_limiter::RateLimiter, resolver::TitleResolver,
    },
};

/// Turns one seed title into a list of resolved similar titles
///
/// Steps per call: rate check, prompt, model call, parse, resolve. Missing
/// credential, blank seed and rate-limit denial all short-circuit to an
/// empty list. Transient model failures (5xx, 429, exhausted network
/// retries) also degrade to an empty list; other failures propagate.
///
/// Misses for the same key are coalesced: while a run for a key is in
/// flight, later requests wait on it instead of starting another one.
pub struct SimilarityService {
    generator: Arc<dyn TextGenerator>,
    metadata: Arc<dyn MetadataProvider>,
    resolver: TitleResolver,
    rate_limiter: RateLimiter,
    cache: Cache,
    response_deadline: Duration,
    in_flight: Mutex<HashMap<CacheKey, watch::Receiver<bool>>>,
}

impl SimilarityService {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        metadata: Arc<dyn MetadataProvider>,
        resolver: TitleResolver,
        rate_limiter: RateLimiter,
        cache: Cache,
        response_deadline: Duration,
    ) -> Self {
        Self {
            generator,
            metadata,
            resolver,
            rate_limiter,
            cache,
            response_deadline,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    /// Runs the pipeline once, without touching the cache
    pub async fn compute_similar(
        &self,
        base: &BaseTitle,
        target_type: TitleType,
        runtime: &RuntimeConfig,
    ) -> AppResult<Vec<ResolvedTitle>> {
        let Some(credential) = runtime.credential.as_deref() else {
            tracing::debug!(id = %base.id, "No LLM credential configured, skipping generation");
            return Ok(Vec::new());
        };
        if base.name.trim().is_empty() {
            tracing::debug!(id = %base.id, "Seed title has no name, skipping generation");
            return Ok(Vec::new());
        }

        if !self.rate_limiter.allow(credential).await {
            tracing::warn!(id = %base.id, "Similarity request denied by rate limiter");
            return Ok(Vec::new());
        }

        let max_results = runtime.max_results.clamp(1, MAX_RESULTS_CEILING);
        let prompt = build_prompt(base, max_results);

        let raw = match self.generator.generate(&prompt, credential).await {
            Ok(raw) => raw,
            Err(e) if e.is_transient() => {
                tracing::warn!(
                    id = %base.id,
                    status = ?e.status(),
                    error = %e,
                    "Transient LLM failure, returning no similar titles"
                );
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::error!(id = %base.id, error = %e, "LLM request failed");
                return Err(AppError::Llm(e));
            }
        };

        let mut candidates = parse_candidates(&raw);
        let parsed = candidates.len();
        candidates.truncate(max_results);

        let resolved = self
            .resolver
            .resolve(
                candidates,
                target_type,
                Some(base.name.as_str()),
                runtime.secondary_credential.as_deref(),
            )
            .await;

        tracing::info!(
            id = %base.id,
            name = %base.name,
            parsed,
            resolved = resolved.len(),
            placeholders = resolved.iter().filter(|r| r.is_placeholder()).count(),
            "Similar titles computed"
        );

        Ok(resolved)
    }

    /// Computes and stores the result under `key`
    async fn compute_and_store(
        &self,
        base: &BaseTitle,
        target_type: TitleType,
        runtime: &RuntimeConfig,
        key: &CacheKey,
    ) -> AppResult<Vec<ResolvedTitle>> {
        let similar = self.compute_similar(base, target_type, runtime).await?;
        let ttl = Cache::ttl_for(&similar, runtime.ttl_seconds);
        self.cache.set(key, &similar, ttl).await?;
        Ok(similar)
    }

    /// Cached list for `key`, or the answer when generation is impossible
    ///
    /// `None` means the caller has to orchestrate.
    async fn lookup_cached(
        &self,
        key: &CacheKey,
        runtime: &RuntimeConfig,
    ) -> AppResult<Option<Vec<ResolvedTitle>>> {
        if let Some(cached) = self.cache.get_from_cache(key).await? {
            tracing::debug!(key = %key, "Similar titles cache hit");
            return Ok(Some(cached));
        }
        if runtime.credential.is_none() {
            return Ok(Some(Vec::new()));
        }
        Ok(None)
    }

    /// Cached similar list for a seed whose metadata is already loaded
    ///
    /// On a miss the pipeline runs in its own task. If it outlives the
    /// response deadline an empty list is returned and the task keeps going
    /// so the next request finds the result cached.
    pub async fn similar_for_base(
        self: &Arc<Self>,
        base: BaseTitle,
        target_type: TitleType,
        runtime: &RuntimeConfig,
    ) -> AppResult<Vec<ResolvedTitle>> {
        let key = CacheKey::similar(target_type, &base.id, runtime.max_results);
        if let Some(answer) = self.lookup_cached(&key, runtime).await? {
            return Ok(answer);
        }
        self.orchestrate(base, target_type, runtime, key).await
    }

    /// Cached similar list for a seed id, loading its metadata on a miss
    pub async fn similar_for(
        self: &Arc<Self>,
        target_type: TitleType,
        id: &str,
        runtime: &RuntimeConfig,
    ) -> AppResult<Vec<ResolvedTitle>> {
        let key = CacheKey::similar(target_type, id, runtime.max_results);
        if let Some(answer) = self.lookup_cached(&key, runtime).await? {
            return Ok(answer);
        }

        let base = self.metadata.fetch_meta(target_type, id).await?;
        // the metadata provider may have found the id under the other type
        let base = BaseTitle {
            id: id.to_string(),
            ..base
        };
        self.orchestrate(base, target_type, runtime, key).await
    }

    /// Joins the run already in flight for `key`, or starts one
    async fn orchestrate(
        self: &Arc<Self>,
        base: BaseTitle,
        target_type: TitleType,
        runtime: &RuntimeConfig,
        key: CacheKey,
    ) -> AppResult<Vec<ResolvedTitle>> {
        let mut in_flight = self.in_flight.lock().await;
        // a run may have finished between the cache miss and taking the lock
        if let Some(cached) = self.cache.get_from_cache(&key).await? {
            return Ok(cached);
        }
        // a closed channel means the run died without cleaning up
        let running = in_flight
            .get(&key)
            .filter(|rx| rx.has_changed().is_ok())
            .cloned();
        if let Some(done) = running {
            drop(in_flight);
            tracing::debug!(key = %key, "Joining in-flight similarity run");
            return self.wait_for_run(&key, done).await;
        }

        let (done_tx, done_rx) = watch::channel(false);
        in_flight.insert(key.clone(), done_rx);
        drop(in_flight);

        let service = Arc::clone(self);
        let runtime = runtime.clone();
        let task_key = key.clone();
        let task = tokio::spawn(async move {
            let result = service
                .compute_and_store(&base, target_type, &runtime, &task_key)
                .await;
            service.in_flight.lock().await.remove(&task_key);
            let _ = done_tx.send(true);
            result
        });

        match tokio::time::timeout(self.response_deadline, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(AppError::Internal(join_error.to_string())),
            Err(_) => {
                tracing::warn!(
                    key = %key,
                    deadline_ms = self.response_deadline.as_millis() as u64,
                    "Similarity deadline elapsed, finishing in background"
                );
                Ok(Vec::new())
            }
        }
    }

    /// Waits, within the response deadline, for another request's run
    async fn wait_for_run(
        &self,
        key: &CacheKey,
        mut done: watch::Receiver<bool>,
    ) -> AppResult<Vec<ResolvedTitle>> {
        let finished = tokio::time::timeout(self.response_deadline, done.wait_for(|f| *f))
            .await
            .is_ok();
        if !finished {
            tracing::warn!(key = %key, "Similarity run still in flight after deadline");
            return Ok(Vec::new());
        }
        // a failed run stores nothing and reads as empty
        Ok(self.cache.get_from_cache(key).await?.unwrap_or_default())
    }
}
