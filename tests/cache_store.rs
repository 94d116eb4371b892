use http_lifecycle::cache::{
    CacheEntry, CacheManager, FileStore, KeyValueStore, MemoryStore, RequestMeta, ResponseMeta,
};
use http_lifecycle::CacheConfig;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

fn temp_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!(
        "http-lifecycle-it-{}-{}.json",
        tag,
        uuid::Uuid::new_v4()
    ))
}

#[tokio::test]
async fn test_round_trip_default_config() {
    let cache = CacheManager::in_memory(CacheConfig::default());
    cache
        .add_response("r1", &ResponseMeta::new(Some(100_000.0), json!({"a": 1})))
        .await
        .unwrap();
    assert_eq!(cache.get_response("r1").await, Some(json!({"a": 1})));
}

#[tokio::test]
async fn test_expired_entry_is_evicted_on_read() {
    let store = Arc::new(MemoryStore::new());
    let cache = CacheManager::new(CacheConfig::default(), store.clone());
    let past = CacheEntry::new(Some(1_000.0), json!("stale"));
    store
        .set("axios-cache-old", &serde_json::to_string(&past).unwrap())
        .await
        .unwrap();

    assert_eq!(cache.get_response("old").await, None);
    assert_eq!(store.get("axios-cache-old").await.unwrap(), None);
}

#[tokio::test]
async fn test_remove_is_idempotent() {
    let cache = CacheManager::in_memory(CacheConfig::default());
    cache.remove_response("missing").await.unwrap();
    cache.remove_response("missing").await.unwrap();
    assert_eq!(cache.get_response("missing").await, None);
}

#[tokio::test]
async fn test_file_store_keeps_entries_across_restart() {
    let path = temp_path("restart");
    {
        let store = Arc::new(FileStore::open(&path).await.unwrap());
        let cache = CacheManager::new(CacheConfig::new().with_prefix("app-"), store);
        cache
            .add_response("profile", &ResponseMeta::new(Some(60_000.0), json!({"id": 7})))
            .await
            .unwrap();
    }
    let store = Arc::new(FileStore::open(&path).await.unwrap());
    let cache = CacheManager::new(CacheConfig::new().with_prefix("app-"), store);
    assert_eq!(cache.get_response("profile").await, Some(json!({"id": 7})));
    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_zero_ttl_is_cacheable_but_negative_one_is_not() {
    let cache = CacheManager::in_memory(CacheConfig::default());
    assert!(cache.is_cacheable(&RequestMeta::with_ttl(0.0)));
    assert!(!cache.is_cacheable(&RequestMeta::with_ttl(-1.0)));
    assert!(!cache.is_cacheable(&RequestMeta::default()));
}

#[test]
fn test_is_valid_response_edges() {
    let cache = CacheManager::in_memory(CacheConfig::default());
    let entry = |until: Option<f64>| CacheEntry::new(until, json!(null));
    assert!(!cache.is_valid_response(&entry(Some(0.0))));
    assert!(!cache.is_valid_response(&entry(None)));
    assert!(!cache.is_valid_response(&entry(Some(f64::NAN))));
    assert!(cache.is_valid_response(&entry(Some(f64::INFINITY))));
    assert!(cache.is_valid_response(&entry(Some(
        http_lifecycle::cache::now_millis() + 100.0
    ))));
}
