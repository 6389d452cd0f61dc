pub mod cache;

pub use cache::{negative_ttl, sweep_interval, Cache, CacheKey, CacheSweeperHandle};
