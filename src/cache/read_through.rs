//! Read-through orchestration.
//!
//! `key -> cache check -> (hit: return) | (miss: fetch -> write-behind -> return)`.
//! The store is an optimization only: every store fault is logged, counted
//! and answered by computing fresh data.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::{CacheDomain, CacheKey, KeyCodec, KeyPart};
use super::store::CacheStore;

pub const METRIC_CACHE_HIT: &str = "rankboard_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "rankboard_cache_miss_total";
pub const METRIC_CACHE_ERROR: &str = "rankboard_cache_error_total";
pub const METRIC_FETCH_MS: &str = "rankboard_fetch_ms";

/// Single entry point for cached reads.
#[derive(Clone)]
pub struct ReadThrough {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    codec: KeyCodec,
}

impl ReadThrough {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        let codec = config.key_codec();
        Self {
            store,
            config,
            codec,
        }
    }

    pub fn key(&self, domain: CacheDomain, parts: &[KeyPart]) -> CacheKey {
        self.codec.make_key(domain, parts)
    }

    /// Serve `key` from the cache, or run `fetch` and cache its result.
    ///
    /// Errors from `fetch` propagate unchanged and are never cached.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, key: &CacheKey, fetch: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let domain = key.domain().as_str();

        if !self.config.enabled {
            return fetch().await;
        }

        if let Some(hit) = self.probe::<T>(key).await {
            counter!(METRIC_CACHE_HIT, "domain" => domain).increment(1);
            debug!(domain, key = %key, result = "hit", "Served from cache");
            return Ok(hit);
        }
        counter!(METRIC_CACHE_MISS, "domain" => domain).increment(1);

        let started = Instant::now();
        let value = fetch().await?;
        histogram!(METRIC_FETCH_MS, "domain" => domain)
            .record(started.elapsed().as_secs_f64() * 1000.0);

        self.write_behind(key, &value);
        Ok(value)
    }

    async fn probe<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        let domain = key.domain().as_str();
        let value = match self.store.get(key.as_str()).await {
            Ok(value) => value?,
            Err(error) => {
                counter!(METRIC_CACHE_ERROR, "op" => "get").increment(1);
                warn!(domain, key = %key, error = %error, "Cache read failed; computing fresh");
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                counter!(METRIC_CACHE_ERROR, "op" => "decode").increment(1);
                warn!(domain, key = %key, error = %error, "Cached payload undecodable; computing fresh");
                None
            }
        }
    }

    fn write_behind<T: Serialize>(&self, key: &CacheKey, value: &T) {
        let domain = key.domain().as_str();
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(error) => {
                counter!(METRIC_CACHE_ERROR, "op" => "encode").increment(1);
                warn!(domain, key = %key, error = %error, "Result not cacheable");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let ttl = self.config.ttl_for(key.domain());
        let key = key.clone();
        tokio::spawn(async move {
            if let Err(error) = store.set(key.as_str(), payload, ttl).await {
                counter!(METRIC_CACHE_ERROR, "op" => "set").increment(1);
                warn!(
                    domain = key.domain().as_str(),
                    key = %key,
                    error = %error,
                    "Cache write failed"
                );
            }
        });
    }

    /// Evict one key. Store faults are logged and reported as `false`.
    pub async fn invalidate(&self, key: &CacheKey) -> bool {
        match self.store.invalidate(key.as_str()).await {
            Ok(removed) => removed,
            Err(error) => {
                counter!(METRIC_CACHE_ERROR, "op" => "invalidate").increment(1);
                warn!(key = %key, error = %error, "Cache invalidation failed");
                false
            }
        }
    }

    /// Evict every key in `domain`. Store faults are logged and reported as zero.
    pub async fn invalidate_domain(&self, domain: CacheDomain) -> usize {
        match self.store.invalidate_namespace(&domain.prefix()).await {
            Ok(removed) => removed,
            Err(error) => {
                counter!(METRIC_CACHE_ERROR, "op" => "invalidate_namespace").increment(1);
                warn!(domain = domain.as_str(), error = %error, "Cache namespace invalidation failed");
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::cache::store::MemoryStore;

    async fn settle() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn second_call_is_served_from_cache() {
        let config = CacheConfig::default();
        let store = Arc::new(MemoryStore::new(&config));
        let cache = ReadThrough::new(store.clone(), config);
        let key = cache.key(CacheDomain::Player, &[KeyPart::from(7_i64)]);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value: Result<u32, ()> = cache
                .get_or_fetch(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(42)
                })
                .await;
            assert_eq!(value, Ok(42));
            settle().await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn fetch_errors_are_not_cached() {
        let config = CacheConfig::default();
        let store = Arc::new(MemoryStore::new(&config));
        let cache = ReadThrough::new(store.clone(), config);
        let key = cache.key(CacheDomain::Player, &[KeyPart::from(7_i64)]);

        let failed: Result<u32, &str> = cache.get_or_fetch(&key, || async { Err("down") }).await;
        assert_eq!(failed, Err("down"));
        settle().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn disabled_cache_always_fetches() {
        let config = CacheConfig {
            enabled: false,
            ..Default::default()
        };
        let store = Arc::new(MemoryStore::new(&config));
        let cache = ReadThrough::new(store.clone(), config);
        let key = cache.key(CacheDomain::Analytics, &[]);
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let _: Result<u32, ()> = cache
                .get_or_fetch(&key, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await;
            settle().await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn undecodable_payload_falls_back_to_fetch() {
        let config = CacheConfig::default();
        let store = Arc::new(MemoryStore::new(&config));
        let cache = ReadThrough::new(store.clone(), config.clone());
        let key = cache.key(CacheDomain::Player, &[KeyPart::from(1_i64)]);
        store.insert(
            key.as_str(),
            serde_json::json!("not a number"),
            config.ttl_for(CacheDomain::Player),
        );

        let value: Result<u32, ()> = cache.get_or_fetch(&key, || async { Ok(5) }).await;
        assert_eq!(value, Ok(5));
        settle().await;
        assert_eq!(store.lookup(key.as_str()), Some(serde_json::json!(5)));
    }

    #[tokio::test]
    async fn invalidate_domain_clears_only_that_domain() {
        let config = CacheConfig::default();
        let store = Arc::new(MemoryStore::new(&config));
        let cache = ReadThrough::new(store.clone(), config);
        let comparison = cache.key(
            CacheDomain::Comparison,
            &[KeyPart::from(1_i64), KeyPart::from(2_i64)],
        );
        let player = cache.key(CacheDomain::Player, &[KeyPart::from(1_i64)]);

        for key in [&comparison, &player] {
            let _: Result<u32, ()> = cache.get_or_fetch(key, || async { Ok(1) }).await;
        }
        settle().await;

        assert_eq!(cache.invalidate_domain(CacheDomain::Comparison).await, 1);
        assert!(store.lookup(comparison.as_str()).is_none());
        assert!(store.lookup(player.as_str()).is_some());
        assert!(cache.invalidate(&player).await);
    }
}
