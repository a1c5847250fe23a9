use std::collections::HashSet;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use metrics_util::debugging::{DebuggingRecorder, Snapshotter};
use rankboard::cache::metric_names::{
    METRIC_CACHE_ERROR, METRIC_CACHE_EVICT, METRIC_CACHE_EXPIRED, METRIC_CACHE_HIT,
    METRIC_CACHE_MISS, METRIC_FETCH_MS,
};
use rankboard::cache::{
    CacheConfig, CacheDomain, CacheError, CacheStore, KeyPart, MemoryStore, ReadThrough,
};
use serde_json::{Value, json};
use serial_test::serial;

// The recorder is process-global, so it is installed once and every test
// that reads it runs serially.
fn snapshotter() -> &'static Snapshotter {
    static SNAPSHOTTER: OnceLock<Snapshotter> = OnceLock::new();
    SNAPSHOTTER.get_or_init(|| {
        let recorder = DebuggingRecorder::new();
        let snapshotter = recorder.snapshotter();
        recorder
            .install()
            .expect("debug metrics recorder should install in this test process");
        snapshotter
    })
}

fn emitted_names(snapshotter: &Snapshotter) -> HashSet<String> {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, _)| composite_key.key().name().to_string())
        .collect()
}

struct BrokenStore;

#[async_trait]
impl CacheStore for BrokenStore {
    async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
        Err(CacheError::unavailable("timeout"))
    }

    async fn set(&self, _key: &str, _value: Value, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::unavailable("timeout"))
    }

    async fn invalidate(&self, _key: &str) -> Result<bool, CacheError> {
        Err(CacheError::unavailable("timeout"))
    }

    async fn invalidate_namespace(&self, _prefix: &str) -> Result<usize, CacheError> {
        Err(CacheError::unavailable("timeout"))
    }
}

#[tokio::test]
#[serial]
async fn read_through_paths_emit_expected_metric_keys() {
    let snapshotter = snapshotter();

    let config = CacheConfig::default();
    let store = Arc::new(MemoryStore::new(&config));
    let cache = ReadThrough::new(store, config.clone());
    let key = cache.key(CacheDomain::ScoreSearch, &[KeyPart::from("pp_desc")]);

    let _: Result<u32, ()> = cache.get_or_fetch(&key, || async { Ok(1) }).await;
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    let _: Result<u32, ()> = cache.get_or_fetch(&key, || async { Ok(1) }).await;

    let broken = ReadThrough::new(Arc::new(BrokenStore), config);
    let _: Result<u32, ()> = broken.get_or_fetch(&key, || async { Ok(2) }).await;

    let names = emitted_names(snapshotter);
    for expected in [
        METRIC_CACHE_HIT,
        METRIC_CACHE_MISS,
        METRIC_FETCH_MS,
        METRIC_CACHE_ERROR,
    ] {
        assert!(names.contains(expected), "missing metric {expected}");
    }
}

#[tokio::test]
#[serial]
async fn memory_store_emits_evict_and_expiry_metrics() {
    let snapshotter = snapshotter();

    let config = CacheConfig {
        capacity: 1,
        ..Default::default()
    };
    let store = MemoryStore::new(&config);
    store.insert("rankboard:player:1", json!(1), Duration::from_secs(60));
    store.insert("rankboard:player:2", json!(2), Duration::from_secs(60));
    store.insert("rankboard:player:3", json!(3), Duration::ZERO);
    assert_eq!(store.lookup("rankboard:player:3"), None);

    let names = emitted_names(snapshotter);
    assert!(names.contains(METRIC_CACHE_EVICT));
    assert!(names.contains(METRIC_CACHE_EXPIRED));
}
