//! End-to-end request flows against the cache, the way a query frontend
//! drives it: fetch, query the backing store on a miss, merge, repeat.

mod common;

use promcache_cache::{Cacher, FetchOutcome, TimeRange};
use promcache_core::{fingerprint, CacheConfig, Error, QueryResult, Value};

use common::{init_tracing, range_series, sample, times};

fn cacher() -> Cacher {
    Cacher::new(CacheConfig {
        max_entries: 8,
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_dashboard_refresh_extends_cached_window() {
    init_tracing();
    let cacher = cacher();
    let key = fingerprint("rate(http_requests_total[5m])", 10);

    // First load.
    let outcome = cacher.fetch(&key, 100, 250).await;
    assert!(matches!(
        outcome,
        FetchOutcome::Miss {
            cause: Some(Error::KeyNotFound(_)),
            ..
        }
    ));
    cacher
        .merge(
            &key,
            100,
            250,
            10,
            QueryResult::matrix(vec![range_series("a", 100, 250, 10)]),
        )
        .unwrap();

    // Refresh slides the window right: only the tail is fetched.
    let outcome = cacher.fetch(&key, 150, 300).await;
    assert_eq!(outcome.fetch_range(), Some(TimeRange::new(250, 300)));
    match &outcome {
        FetchOutcome::Miss {
            cached: Some(cached),
            ..
        } => assert_eq!(times(&cached[0]), (150..=250).step_by(10).collect::<Vec<_>>()),
        other => panic!("expected partial hit, got {:?}", other),
    }
    let merged = cacher
        .merge(
            &key,
            250,
            300,
            10,
            QueryResult::matrix(vec![range_series("a", 250, 300, 10)]),
        )
        .unwrap();
    match merged {
        Value::Matrix(m) => assert_eq!(times(&m[0]), (100..=300).step_by(10).collect::<Vec<_>>()),
        other => panic!("expected matrix, got {:?}", other),
    }

    // Same refresh again is served from cache.
    let outcome = cacher.fetch(&key, 150, 300).await;
    match outcome {
        FetchOutcome::Hit(Value::Matrix(m)) => {
            assert_eq!(times(&m[0]), (150..=300).step_by(10).collect::<Vec<_>>())
        }
        other => panic!("expected hit, got {:?}", other),
    }

    let stats = cacher.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.partial_hits, 1);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.merges, 2);
}

#[tokio::test]
async fn test_zoom_out_supersedes_entry() {
    init_tracing();
    let cacher = cacher();
    let key = fingerprint("up", 10);
    assert!(cacher.fetch(&key, 100, 200).await.fetch_required());
    cacher
        .merge(&key, 100, 200, 10, QueryResult::matrix(vec![range_series("a", 100, 200, 10)]))
        .unwrap();

    let outcome = cacher.fetch(&key, 0, 400).await;
    assert_eq!(outcome.fetch_range(), Some(TimeRange::new(0, 400)));
    cacher
        .merge(&key, 0, 400, 10, QueryResult::matrix(vec![range_series("a", 0, 400, 10)]))
        .unwrap();

    let state = cacher.inspect(&key).unwrap();
    assert_eq!(state.window, TimeRange::new(0, 400));
    assert_eq!(state.payload[0].points.len(), 41);
}

#[tokio::test]
async fn test_instant_queries_hit_only_exact_timestamp() {
    init_tracing();
    let cacher = cacher();
    let key = fingerprint("up", 0);
    assert!(cacher.fetch(&key, 500, 500).await.fetch_required());
    cacher
        .merge(
            &key,
            500,
            500,
            0,
            QueryResult::vector(vec![sample("a", 500, 1.0), sample("b", 500, 0.0)]),
        )
        .unwrap();

    match cacher.fetch(&key, 500, 500).await {
        FetchOutcome::Hit(Value::Vector(v)) => assert_eq!(v.len(), 2),
        other => panic!("expected instant hit, got {:?}", other),
    }

    let outcome = cacher.fetch(&key, 515, 515).await;
    assert_eq!(outcome.fetch_range(), Some(TimeRange::new(515, 515)));
    cacher
        .merge(
            &key,
            515,
            515,
            0,
            QueryResult::vector(vec![sample("a", 515, 1.0), sample("b", 515, 1.0)]),
        )
        .unwrap();

    // Both timestamps are now answerable.
    assert!(cacher.fetch(&key, 500, 500).await.is_hit());
    assert!(cacher.fetch(&key, 515, 515).await.is_hit());
}

#[tokio::test]
async fn test_distinct_steps_do_not_share_entries() {
    init_tracing();
    let cacher = cacher();
    let coarse = fingerprint("up", 60);
    let fine = fingerprint("up", 15);
    assert_ne!(coarse, fine);

    cacher.fetch(&coarse, 0, 600).await;
    cacher
        .merge(&coarse, 0, 600, 60, QueryResult::matrix(vec![range_series("a", 0, 600, 60)]))
        .unwrap();

    assert!(cacher.fetch(&fine, 0, 600).await.fetch_required());
    assert!(cacher.fetch(&coarse, 0, 600).await.is_hit());
}

#[tokio::test]
async fn test_failed_load_is_abandoned_and_retried() {
    init_tracing();
    let cacher = cacher();
    let key = fingerprint("up", 10);
    assert!(cacher.fetch(&key, 0, 100).await.fetch_required());

    // Backing store failed: release the slot so the next request retries.
    assert!(cacher.abandon(&key));
    assert!(!cacher.contains(&key));
    assert!(cacher.fetch(&key, 0, 100).await.fetch_required());
}
