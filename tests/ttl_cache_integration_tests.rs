//! Integration Tests for the TTL Cache
//!
//! Exercises the public API end to end: LRU pressure and TTL expiry racing
//! over the same entries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio_test::{assert_err, assert_ok};
use ttl_lru::{CacheConfig, CacheError, TtlCache};

// == Helper Functions ==

type Evicted<K, V> = Arc<Mutex<Vec<(K, V)>>>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ttl_lru=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn recording_cache<K, V>(capacity: usize) -> (TtlCache<K, V>, Evicted<K, V>)
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    init_tracing();
    let evicted: Evicted<K, V> = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&evicted);
    let cache = TtlCache::with_evict(capacity, move |k: &K, v: &V| {
        sink.lock().push((k.clone(), v.clone()));
    })
    .unwrap();
    (cache, evicted)
}

// == Construction ==

#[tokio::test]
async fn test_construction_errors() {
    assert_err!(TtlCache::<String, i32>::new(0));
    assert_ok!(TtlCache::<String, i32>::new(1));

    let config: CacheConfig = serde_json::from_str(r#"{"capacity": 0}"#).unwrap();
    let err = TtlCache::<String, i32>::from_config(&config).unwrap_err();
    assert_eq!(
        err,
        CacheError::InvalidConfiguration("capacity must be positive".to_string())
    );
}

// == Expiry ==

#[tokio::test(start_paused = true)]
async fn test_capacity_then_ttl_scenario() {
    let (cache, evicted) = recording_cache::<&'static str, i32>(2);

    cache.add("a", 1);
    cache.add("b", 2);
    assert!(cache.add_with_ttl("c", 3, Duration::from_millis(50)));
    assert_eq!(cache.len(), 2);

    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(cache.get(&"c"), None);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&"b"));
    assert_eq!(*evicted.lock(), vec![("a", 1), ("c", 3)]);
}

#[tokio::test(start_paused = true)]
async fn test_ttl_removes_entry_once() {
    let (cache, evicted) = recording_cache::<String, String>(10);

    cache.add_with_ttl("key".to_string(), "value".to_string(), Duration::from_secs(1));
    assert_eq!(cache.get(&"key".to_string()), Some("value".to_string()));

    tokio::time::sleep(Duration::from_millis(1100)).await;

    assert_eq!(cache.get(&"key".to_string()), None);
    assert!(!cache.is_pending(&"key".to_string()));
    assert_eq!(
        *evicted.lock(),
        vec![("key".to_string(), "value".to_string())]
    );

    // Nothing else fires later
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(evicted.lock().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_keeps_original_deadline() {
    let (cache, evicted) = recording_cache::<&'static str, &'static str>(10);

    assert!(!cache.add_with_ttl("k", "v1", Duration::from_secs(10)));
    tokio::time::sleep(Duration::from_millis(1)).await;
    cache.add_with_ttl("k", "v2", Duration::from_secs(3600));
    assert_eq!(cache.pending_len(), 1);

    tokio::time::sleep(Duration::from_secs(9)).await;
    assert_eq!(cache.get(&"k"), Some("v2"));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cache.get(&"k"), None);
    assert_eq!(*evicted.lock(), vec![("k", "v2")]);
}

#[tokio::test(start_paused = true)]
async fn test_rearm_after_fire_starts_new_deadline() {
    let cache = TtlCache::new(10).unwrap();

    cache.add_with_ttl("k", 1, Duration::from_secs(1));
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(!cache.contains(&"k"));

    cache.add_with_ttl("k", 2, Duration::from_secs(5));
    assert!(cache.is_pending(&"k"));

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert_eq!(cache.get(&"k"), Some(2));

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(cache.get(&"k"), None);
}

#[tokio::test(start_paused = true)]
async fn test_zero_ttl_removes_after_insert() {
    let (cache, evicted) = recording_cache::<&'static str, i32>(4);

    cache.add_with_ttl("k", 1, Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(1)).await;

    assert!(!cache.contains(&"k"));
    assert_eq!(*evicted.lock(), vec![("k", 1)]);
}

#[tokio::test(start_paused = true)]
async fn test_lru_eviction_before_timer_fires() {
    let (cache, evicted) = recording_cache::<&'static str, i32>(1);

    cache.add_with_ttl("a", 1, Duration::from_millis(50));
    assert!(cache.add("b", 2));
    assert_eq!(*evicted.lock(), vec![("a", 1)]);
    assert!(cache.is_pending(&"a"));

    tokio::time::sleep(Duration::from_millis(60)).await;

    // The timer found nothing to remove
    assert!(!cache.is_pending(&"a"));
    assert!(cache.contains(&"b"));
    assert_eq!(*evicted.lock(), vec![("a", 1)]);
}

// == LRU Ordering ==

#[tokio::test]
async fn test_lru_ordering_without_ttl() {
    let (cache, evicted) = recording_cache::<String, usize>(3);

    for i in 0..4 {
        cache.add(format!("key{}", i), i);
    }

    assert_eq!(cache.len(), 3);
    assert_eq!(*evicted.lock(), vec![("key0".to_string(), 0)]);
    assert_eq!(cache.keys(), vec!["key1", "key2", "key3"]);
}

#[tokio::test]
async fn test_add_with_ttl_updates_recency() {
    let cache = TtlCache::new(2).unwrap();

    cache.add("a", 1);
    cache.add("b", 2);
    cache.add_with_ttl("a", 3, Duration::from_secs(60));
    cache.add("c", 4);

    assert!(cache.contains(&"a"));
    assert!(!cache.contains(&"b"));
}

// == Concurrency ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_no_double_eviction_under_pressure() {
    let (cache, evicted) = recording_cache::<u32, u32>(16);

    let mut handles = Vec::new();
    for worker in 0..4u32 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..250u32 {
                let key = worker * 1000 + i;
                if i % 2 == 0 {
                    cache.add_with_ttl(key, key, Duration::from_millis(u64::from(i % 7)));
                } else {
                    cache.add(key, key);
                }
                assert!(cache.len() <= 16);
                if i % 25 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(cache.pending_len(), 0);

    // Every key was inserted once, so it may leave at most once
    let mut seen: HashMap<u32, usize> = HashMap::new();
    for (key, value) in evicted.lock().iter() {
        assert_eq!(key, value);
        *seen.entry(*key).or_default() += 1;
    }
    assert!(seen.values().all(|&count| count == 1));
    assert_eq!(seen.len() + cache.len(), 1000);
}
