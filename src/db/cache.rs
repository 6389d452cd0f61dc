use std::collections::HashMap;
use std::fmt::Display;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tokio::time::{Duration, Instant};

use crate::error::{AppError, AppResult};
use crate::models::TitleType;

/// Bounds for the lifetime of an empty (negative) result
const NEGATIVE_TTL_MIN: u64 = 30;
const NEGATIVE_TTL_MAX: u64 = 600;

/// Identifies one cached similar list
///
/// The result count is part of the key: lists are truncated before they are
/// stored, so different counts must not share a slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub title_type: TitleType,
    pub id: String,
    pub max_results: usize,
}

impl CacheKey {
    pub fn similar(title_type: TitleType, id: &str, max_results: usize) -> Self {
        Self {
            title_type,
            id: id.to_string(),
            max_results,
        }
    }
}

impl Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.title_type, self.id, self.max_results)
    }
}

/// Lifetime of an empty result: a tenth of the normal TTL within
/// `[NEGATIVE_TTL_MIN, NEGATIVE_TTL_MAX]`, and always below `ttl`.
pub fn negative_ttl(ttl: u64) -> u64 {
    let bounded = (ttl / 10).clamp(NEGATIVE_TTL_MIN, NEGATIVE_TTL_MAX);
    bounded.min(ttl.saturating_sub(1)).max(1)
}

/// How often the sweeper runs for a given default TTL
pub fn sweep_interval(ttl: u64) -> Duration {
    Duration::from_secs((ttl / 2).max(1))
}

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Handle for stopping the background sweeper
///
/// Dropping the handle stops the sweeper as well.
pub struct CacheSweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl CacheSweeperHandle {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        tracing::info!("Cache sweeper shutdown signal sent");
    }
}

/// Process-local TTL cache for similar lists
#[derive(Clone)]
pub struct Cache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Cache {
    /// Creates a cache and spawns its expiry sweeper
    ///
    /// Must be called from within a Tokio runtime.
    pub fn new(sweep_every: Duration) -> (Self, CacheSweeperHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let cache = Self::default();

        let entries = Arc::clone(&cache.entries);
        tokio::spawn(async move {
            Self::sweeper_task(entries, sweep_every, shutdown_rx).await;
        });

        (cache, CacheSweeperHandle { shutdown_tx })
    }

    async fn sweeper_task(
        entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
        sweep_every: Duration,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) {
        tracing::info!(interval_secs = sweep_every.as_secs(), "Cache sweeper started");
        let mut ticker = tokio::time::interval(sweep_every);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let evicted = Self::evict_expired(&entries).await;
                    if evicted > 0 {
                        tracing::debug!(evicted, "Evicted expired cache entries");
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Cache sweeper stopped");
                    break;
                }
            }
        }
    }

    async fn evict_expired(entries: &RwLock<HashMap<String, CacheEntry>>) -> usize {
        let now = Instant::now();
        let mut entries = entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Removes every expired entry now, returning how many were dropped
    pub async fn sweep(&self) -> usize {
        Self::evict_expired(&self.entries).await
    }

    /// Retrieves a value from the cache by key
    ///
    /// Entries past their expiry read as absent even before the sweeper has
    /// removed them.
    pub async fn get_from_cache<T: serde::de::DeserializeOwned>(
        &self,
        key: &CacheKey,
    ) -> AppResult<Option<T>> {
        let entries = self.entries.read().await;
        let entry = match entries.get(&key.to_string()) {
            Some(entry) if entry.expires_at > Instant::now() => entry,
            _ => return Ok(None),
        };

        let data = serde_json::from_str(&entry.value)
            .map_err(|e| AppError::Internal(format!("Cache deserialization error: {}", e)))?;
        Ok(Some(data))
    }

    /// Stores a value for `ttl` seconds, replacing any previous entry
    pub async fn set<T: serde::Serialize>(&self, key: &CacheKey, value: &T, ttl: u64) -> AppResult<()> {
        let json = serde_json::to_string(value)
            .map_err(|e| AppError::Internal(format!("Cache serialization error: {}", e)))?;

        let entry = CacheEntry {
            value: json,
            expires_at: Instant::now() + Duration::from_secs(ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);

        tracing::debug!(key = %key, ttl, "Cached value");
        Ok(())
    }

    /// TTL for a result list: the negative TTL when it is empty
    pub fn ttl_for<T>(values: &[T], ttl: u64) -> u64 {
        if values.is_empty() {
            negative_ttl(ttl)
        } else {
            ttl
        }
    }

    /// Seconds until `key` expires, if it is live
    pub async fn remaining_ttl(&self, key: &CacheKey) -> Option<Duration> {
        let entries = self.entries.read().await;
        let entry = entries.get(&key.to_string())?;
        entry.expires_at.checked_duration_since(Instant::now())
    }

    /// Number of stored entries, expired ones included until swept
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
