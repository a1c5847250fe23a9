//! Rankboard Cache System
//!
//! A single read-through layer in front of every leaderboard query:
//!
//! - **Key codec**: `(domain, parts)` to a stable, typed key string
//! - **Store**: TTL-bounded key-value backend behind [`CacheStore`]
//! - **Read-through**: probe, fetch on miss, write behind, absorb faults
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `rankboard.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! capacity = 10000
//! sweep_interval_secs = 300
//!
//! [cache.ttl]
//! comparison = 600
//! analytics = 1800
//! ```

mod config;
mod keys;
mod lock;
mod read_through;
mod store;

pub use config::{CacheConfig, DomainTtls};
pub use keys::{
    CacheDomain, CacheKey, DEFAULT_MAX_KEY_LEN, KEY_NAMESPACE, KeyCodec, KeyPart, make_key,
};
pub use read_through::ReadThrough;
pub use store::{CacheError, CacheStore, MemoryStore, spawn_sweeper};

/// Metric names emitted by the cache layer.
pub mod metric_names {
    pub use super::read_through::{
        METRIC_CACHE_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_MISS, METRIC_FETCH_MS,
    };
    pub use super::store::{METRIC_CACHE_EVICT, METRIC_CACHE_EXPIRED};
}
