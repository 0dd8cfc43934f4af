//! Cache staleness, debounce and revalidation through the public API.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use app_router::cache::{fetcher_fn, CacheError, CacheOptions, Ttl};
use app_router::config::CacheConfig;
use app_router::events::FrameworkEvent;
use app_router::DataCache;
use serde_json::json;
use tokio::time;
use tokio_util::sync::CancellationToken;

mod common;

#[tokio::test(start_paused = true)]
async fn test_entry_lifecycle_fresh_stale_expired() {
    let cache = DataCache::new(&CacheConfig::default());
    let mut events = cache.events().subscribe();
    cache.insert("k", json!(1), CacheOptions::new(Ttl::from_millis(1_000)));

    time::advance(Duration::from_millis(700)).await;
    assert!(!cache.get("k").unwrap().stale);

    time::advance(Duration::from_millis(100)).await;
    let stale = cache.get("k").unwrap();
    assert!(stale.stale);
    assert_eq!(stale.data, json!(1));

    time::advance(Duration::from_millis(300)).await;
    assert!(cache.get("k").is_none());
    assert!(!cache.contains_key("k"));

    let mut evicted = false;
    while let Ok(event) = events.try_recv() {
        evicted |= matches!(event, FrameworkEvent::CacheEvicted { ref key } if key == "k");
    }
    assert!(evicted);
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_stale_reads_refetches_each_key_once() {
    let cache = DataCache::new(&CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    for key in ["a", "b"] {
        cache
            .fetch(key, CacheOptions::new(Ttl::from_millis(1_000)), common::counting_fetcher(&calls))
            .await
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    time::advance(Duration::from_millis(800)).await;
    for _ in 0..5 {
        cache.get("a").unwrap();
        cache.get("b").unwrap();
        time::advance(Duration::from_millis(10)).await;
    }
    // Still inside the quiet period: nothing refetched yet.
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    time::sleep(Duration::from_millis(150)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 4);
    assert!(cache.pending_revalidations().is_empty());
    let refreshed = cache.get("a").unwrap();
    assert!(!refreshed.stale);
    assert!(refreshed.data["version"].as_u64().unwrap() >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_zero_ttl_serves_and_revalidates_on_every_read() {
    let cache = DataCache::new(&CacheConfig::default());
    let calls = Arc::new(AtomicUsize::new(0));
    cache.insert("now", json!("seed"), CacheOptions::new(Ttl::immediate()));
    cache.register_fetcher("now", common::counting_fetcher(&calls));

    time::advance(Duration::from_secs(3_600)).await;
    let entry = cache.get("now").unwrap();
    assert!(entry.stale);
    assert_eq!(entry.data, json!("seed"));

    time::sleep(Duration::from_millis(150)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get("now").unwrap().data["version"], json!(1));
}

#[tokio::test(start_paused = true)]
async fn test_infinite_ttl_only_leaves_by_invalidation() {
    let cache = DataCache::new(&CacheConfig::default());
    cache.insert("config", json!({}), CacheOptions::new(Ttl::Infinite).tag("static"));

    time::advance(Duration::from_secs(86_400)).await;
    assert!(!cache.get("config").unwrap().stale);
    assert_eq!(cache.prune_expired(), 0);

    assert_eq!(cache.invalidate_tag("static"), 1);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_failed_revalidation_keeps_serving_stale_data() {
    let cache = DataCache::new(&CacheConfig::default());
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    cache.insert("feed", json!(["old"]), CacheOptions::new(Ttl::from_millis(1_000)));
    cache.register_fetcher(
        "feed",
        fetcher_fn(move |_key| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err("upstream unavailable".into())
            }
        }),
    );

    let report = cache.revalidate(None).await;
    assert!(!report.skipped);
    assert_eq!(report.failures.len(), 1);
    assert!(matches!(
        &report.failures[0],
        CacheError::CacheRevalidationFailed { key, .. } if key == "feed"
    ));
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(cache.get("feed").unwrap().data, json!(["old"]));
}

#[tokio::test(start_paused = true)]
async fn test_deleted_key_is_not_recreated_by_refresh() {
    let cache = DataCache::new(&CacheConfig::default());
    let gate = Arc::new(tokio::sync::Notify::new());
    let release = Arc::clone(&gate);
    cache.insert("gone", json!(0), CacheOptions::default());
    cache.register_fetcher(
        "gone",
        fetcher_fn(move |_key| {
            let gate = Arc::clone(&gate);
            async move {
                gate.notified().await;
                Ok(json!(1))
            }
        }),
    );

    let pass = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.revalidate(None).await })
    };
    while !cache.is_revalidating() {
        tokio::task::yield_now().await;
    }

    cache.delete("gone");
    release.notify_one();
    let report = pass.await.unwrap();

    assert_eq!(report.refreshed, vec!["gone".to_string()]);
    assert!(!cache.contains_key("gone"));
}

#[tokio::test(start_paused = true)]
async fn test_sweeper_prunes_until_cancelled() {
    let cache = DataCache::new(&CacheConfig::default());
    let shutdown = CancellationToken::new();
    let sweeper = cache.spawn_sweeper(Duration::from_secs(1), shutdown.clone());

    cache.insert("short", json!(1), CacheOptions::new(Ttl::from_millis(500)));
    cache.insert("long", json!(2), CacheOptions::new(Ttl::from_millis(60_000)));

    time::sleep(Duration::from_millis(1_100)).await;
    assert_eq!(cache.keys(), vec!["long".to_string()]);

    shutdown.cancel();
    sweeper.await.unwrap();
}
