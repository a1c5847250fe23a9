//! Cache storage.
//!
//! [`CacheStore`] is the backend contract used by the read-through layer;
//! [`MemoryStore`] is the embedded implementation: an LRU of JSON payloads
//! with absolute expiry, expired lazily on read and optionally swept.

use std::sync::{Arc, RwLock, Weak};
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use metrics::counter;
use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::debug;

use super::config::CacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

pub const METRIC_CACHE_EVICT: &str = "rankboard_cache_evict_total";
pub const METRIC_CACHE_EXPIRED: &str = "rankboard_cache_expired_total";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cache payload could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CacheError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }
}

/// Namespaced key-value store with per-entry TTL.
///
/// A miss is `Ok(None)`; `Err` is reserved for backend faults, which callers
/// absorb rather than surface.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError>;

    /// Returns whether an entry was removed.
    async fn invalidate(&self, key: &str) -> Result<bool, CacheError>;

    /// Removes every key starting with `prefix`, returning how many were removed.
    async fn invalidate_namespace(&self, prefix: &str) -> Result<usize, CacheError>;
}

struct Entry {
    value: Value,
    // `None` when the TTL overflows the clock; such entries never expire.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-process cache backend.
pub struct MemoryStore {
    entries: RwLock<LruCache<String, Entry>>,
}

impl MemoryStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.capacity_non_zero())),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "lookup");
        let expired = entries.get(key)?.is_expired(now);
        if expired {
            entries.pop(key);
            counter!(METRIC_CACHE_EXPIRED).increment(1);
            return None;
        }
        entries.get(key).map(|entry| entry.value.clone())
    }

    pub fn insert(&self, key: &str, value: Value, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        let evicted = rw_write(&self.entries, SOURCE, "insert").push(key.to_string(), entry);
        if evicted.is_some_and(|(evicted_key, _)| evicted_key != key) {
            counter!(METRIC_CACHE_EVICT).increment(1);
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        rw_write(&self.entries, SOURCE, "remove").pop(key).is_some()
    }

    pub fn remove_prefix(&self, prefix: &str) -> usize {
        let mut entries = rw_write(&self.entries, SOURCE, "remove_prefix");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    /// Drop every entry whose deadline has passed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = rw_write(&self.entries, SOURCE, "purge_expired");
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            entries.pop(key);
        }
        if !expired.is_empty() {
            counter!(METRIC_CACHE_EXPIRED).increment(expired.len() as u64);
        }
        expired.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        rw_read(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        self.insert(key, value, ttl);
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.remove(key))
    }

    async fn invalidate_namespace(&self, prefix: &str) -> Result<usize, CacheError> {
        Ok(self.remove_prefix(prefix))
    }
}

/// Periodically purge expired entries from `store`.
///
/// The task holds a weak reference and exits once the store is dropped.
pub fn spawn_sweeper(store: &Arc<MemoryStore>, every: Duration) -> JoinHandle<()> {
    let store: Weak<MemoryStore> = Arc::downgrade(store);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                break;
            };
            let purged = store.purge_expired();
            if purged > 0 {
                debug!(purged, remaining = store.len(), "Swept expired cache entries");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use serde_json::json;

    use super::*;

    fn store_with_capacity(capacity: usize) -> MemoryStore {
        MemoryStore::new(&CacheConfig {
            capacity,
            ..Default::default()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn entry_is_served_until_ttl_elapses() {
        let store = store_with_capacity(8);
        store.insert("k", json!({"pp": 800}), Duration::from_secs(10));

        tokio::time::advance(Duration::from_millis(9_999)).await;
        assert_eq!(store.lookup("k"), Some(json!({"pp": 800})));

        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(store.lookup("k"), None);
        assert!(store.is_empty(), "expired entry is dropped on read");
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_is_never_served() {
        let store = store_with_capacity(8);
        store.insert("k", json!(1), Duration::ZERO);
        assert_eq!(store.lookup("k"), None);
    }

    #[tokio::test]
    async fn set_overwrites_and_invalidate_removes() {
        let store = store_with_capacity(8);
        store.set("k", json!(1), Duration::from_secs(60)).await.unwrap();
        store.set("k", json!(2), Duration::from_secs(60)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(json!(2)));

        assert!(store.invalidate("k").await.unwrap());
        assert!(!store.invalidate("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn namespace_invalidation_only_touches_prefix() {
        let store = store_with_capacity(8);
        let ttl = Duration::from_secs(60);
        store.insert("rankboard:comparison:i=1|i=2", json!(1), ttl);
        store.insert("rankboard:comparison:i=2|i=1", json!(2), ttl);
        store.insert("rankboard:player:i=1", json!(3), ttl);

        let removed = store
            .invalidate_namespace("rankboard:comparison:")
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.lookup("rankboard:player:i=1"), Some(json!(3)));
    }

    #[test]
    fn capacity_evicts_least_recently_used() {
        let store = store_with_capacity(2);
        let ttl = Duration::from_secs(60);
        store.insert("a", json!("a"), ttl);
        store.insert("b", json!("b"), ttl);
        assert!(store.lookup("a").is_some());

        store.insert("c", json!("c"), ttl);

        assert!(store.lookup("a").is_some());
        assert!(store.lookup("b").is_none());
        assert!(store.lookup("c").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn purge_drops_only_expired_entries() {
        let store = store_with_capacity(8);
        store.insert("short", json!(1), Duration::from_secs(5));
        store.insert("long", json!(2), Duration::from_secs(50));

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(store.lookup("long"), Some(json!(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_and_lazy_expiry_agree() {
        let swept = Arc::new(store_with_capacity(8));
        let lazy = store_with_capacity(8);
        for store in [swept.as_ref(), &lazy] {
            store.insert("k", json!(1), Duration::from_secs(30));
        }
        let handle = spawn_sweeper(&swept, Duration::from_secs(60));

        tokio::time::sleep(Duration::from_secs(61)).await;

        assert_eq!(swept.len(), 0, "sweeper purged the entry");
        assert_eq!(lazy.len(), 1, "lazy store still holds it");
        assert_eq!(swept.lookup("k"), None);
        assert_eq!(lazy.lookup("k"), None);
        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn sweeper_stops_when_store_is_dropped() {
        let store = Arc::new(store_with_capacity(8));
        let handle = spawn_sweeper(&store, Duration::from_secs(1));
        drop(store);
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(handle.is_finished());
    }

    #[test]
    fn store_recovers_from_poisoned_lock() {
        let store = store_with_capacity(8);

        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = store
                .entries
                .write()
                .expect("entries lock should be acquired");
            panic!("poison entries lock");
        }));

        store.insert("k", json!(1), Duration::from_secs(60));
        assert_eq!(store.lookup("k"), Some(json!(1)));
    }
}
