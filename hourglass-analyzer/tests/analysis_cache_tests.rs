//! Integration tests for incremental analysis through the cache
//!
//! Drives `AnalysisCache::ensure` against a scripted upstream and checks
//! upstream call counts, prefix stability, rollback and concurrency.

mod helpers;

use helpers::{key, review_id, test_cache, ScriptedSource};
use hourglass_analyzer::error::{AnalysisError, FetchError};
use hourglass_analyzer::services::Lookup;
use hourglass_common::api::NoteCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

#[tokio::test]
async fn test_repeat_request_is_idempotent() {
    let source = Arc::new(ScriptedSource::new(1000));
    let cache = test_cache(source.clone());

    let first = cache.ensure(key("620"), 250).await.unwrap();
    assert_eq!(first.view().len(), 250);
    assert_eq!(source.calls(), 3);

    let second = cache.ensure(key("620"), 250).await.unwrap();
    assert!(second.cache_hit);
    assert_eq!(source.calls(), 3, "second request must not reach upstream");
    assert_eq!(second.view(), first.view());
}

#[tokio::test]
async fn test_shortfall_is_remembered() {
    let source = Arc::new(ScriptedSource::new(22));
    let cache = test_cache(source.clone());

    let result = cache.ensure(key("620"), 1000).await.unwrap();
    assert_eq!(result.record.reviews_analyzed(), 22);
    assert!(result.record.source_exhausted);
    assert_eq!(result.record.total_upstream, Some(22));
    assert!(result.notes.iter().any(|n| n.code == NoteCode::Shortfall));
    assert_eq!(source.calls(), 1);

    let larger = cache.ensure(key("620"), 2000).await.unwrap();
    assert_eq!(larger.view().len(), 22);
    assert!(larger.cache_hit);
    assert!(larger.notes.iter().any(|n| n.code == NoteCode::Shortfall));
    assert_eq!(source.calls(), 1, "exhausted source must not be asked again");
}

#[tokio::test]
async fn test_extension_fetches_only_the_increment() {
    let source = Arc::new(ScriptedSource::new(1000));
    let cache = test_cache(source.clone());

    let small = cache.ensure(key("620"), 150).await.unwrap();
    assert_eq!(source.calls(), 2); // 100 + 50

    let large = cache.ensure(key("620"), 420).await.unwrap();
    assert_eq!(large.fetched_now, 270);
    assert_eq!(source.calls(), 5); // 100 + 100 + 70

    // Prefix stability: the first 150 reviews are unchanged
    assert_eq!(&large.record.reviews[..150], small.view());

    let ids: Vec<String> = large.view().iter().map(|r| r.review.id.clone()).collect();
    let expected: Vec<String> = (0..420).map(review_id).collect();
    assert_eq!(ids, expected);
}

#[tokio::test]
async fn test_smaller_view_aggregates_prefix_only() {
    let source = Arc::new(ScriptedSource::new(1000));
    let cache = test_cache(source.clone());

    cache.ensure(key("620"), 400).await.unwrap();
    let view = cache.ensure(key("620"), 40).await.unwrap();

    assert_eq!(view.view().len(), 40);
    let aggregation = view.aggregation();
    assert_eq!(aggregation.scores.length.found, 10);
    assert_eq!(aggregation.scores.grind.found, 10);
    assert_eq!(aggregation.scores.value.found, 10);
    assert_eq!(aggregation.total_themed, 30);
    assert_eq!(view.record.aggregation.total_themed, 300);
}

#[tokio::test]
async fn test_concurrent_extension_fetches_once() {
    let source = Arc::new(ScriptedSource::new(5000).with_delay(Duration::from_millis(2)));
    let cache = test_cache(source.clone());

    cache.ensure(key("620"), 100).await.unwrap();
    assert_eq!(source.calls(), 1);

    let mut join_set = JoinSet::new();
    for _ in 0..8 {
        let cache = Arc::clone(&cache);
        join_set.spawn(async move { cache.ensure(key("620"), 2000).await });
    }

    let mut fetchers = 0;
    while let Some(joined) = join_set.join_next().await {
        let result = joined.unwrap().unwrap();
        assert_eq!(result.view().len(), 2000);
        if !result.cache_hit {
            fetchers += 1;
        }
    }

    assert_eq!(fetchers, 1, "exactly one request performs the extension");
    assert_eq!(source.calls(), 1 + 19);
}

#[tokio::test]
async fn test_concurrent_distinct_keys_do_not_block() {
    let source = Arc::new(ScriptedSource::new(300).with_delay(Duration::from_millis(2)));
    let cache = test_cache(source.clone());

    let mut join_set = JoinSet::new();
    for subject in ["10", "20", "30"] {
        let cache = Arc::clone(&cache);
        join_set.spawn(async move { cache.ensure(key(subject), 300).await });
    }
    while let Some(joined) = join_set.join_next().await {
        assert_eq!(joined.unwrap().unwrap().view().len(), 300);
    }

    assert_eq!(source.calls(), 9);
    assert_eq!(cache.len().await, 3);
}

#[tokio::test]
async fn test_extension_failure_rolls_back() {
    let source = Arc::new(ScriptedSource::new(1000));
    let cache = test_cache(source.clone());

    cache.ensure(key("620"), 100).await.unwrap();
    source.fail_from(100, FetchError::Transport("connection reset".to_string()));

    match cache.ensure(key("620"), 300).await {
        Err(AnalysisError::ExtensionFailed { source: err, fallback }) => {
            assert!(matches!(err, FetchError::FetchExhausted { page: 0, attempts: 3, .. }));
            assert_eq!(fallback.reviews_analyzed(), 100);
        }
        other => panic!("expected ExtensionFailed, got {:?}", other.map(|r| r.requested)),
    }

    // Previous record is still served
    match cache.get(&key("620")).await {
        Lookup::Ready(record) => {
            assert_eq!(record.reviews_analyzed(), 100);
            assert_eq!(record.next_cursor, "c100");
        }
        other => panic!("expected Ready, got {:?}", other),
    }

    // Recovery resumes from the stored cursor
    source.heal();
    let recovered = cache.ensure(key("620"), 300).await.unwrap();
    assert_eq!(recovered.view().len(), 300);
    assert_eq!(recovered.record.reviews[100].review.id, review_id(100));
}

#[tokio::test]
async fn test_populate_failure_leaves_key_absent() {
    let source = Arc::new(ScriptedSource::new(1000));
    source.fail_from(0, FetchError::UpstreamUnavailable("unknown app".to_string()));
    let cache = test_cache(source.clone());

    let result = cache.ensure(key("620"), 100).await;
    assert!(matches!(
        result,
        Err(AnalysisError::PopulateFailed {
            source: FetchError::UpstreamUnavailable(_),
            partial: None,
        })
    ));
    assert_eq!(source.calls(), 1, "permanent failures are not retried");
    assert!(matches!(cache.get(&key("620")).await, Lookup::Missing));
    assert_eq!(cache.len().await, 0);
}

#[tokio::test]
async fn test_unavailable_after_some_pages_commits_nothing() {
    let source = Arc::new(ScriptedSource::new(1000));
    source.fail_from(100, FetchError::UpstreamUnavailable("malformed".to_string()));
    let cache = test_cache(source.clone());

    let result = cache.ensure(key("620"), 500).await;
    assert!(matches!(
        result,
        Err(AnalysisError::PopulateFailed {
            source: FetchError::UpstreamUnavailable(_),
            partial: None,
        })
    ));
    assert_eq!(source.calls(), 2);
    assert!(matches!(cache.get(&key("620")).await, Lookup::Missing));
    assert_eq!(cache.len().await, 0);

    // Next attempt starts over from the first page
    source.heal();
    let fresh = cache.ensure(key("620"), 500).await.unwrap();
    assert!(!fresh.cache_hit);
    assert_eq!(fresh.fetched_now, 500);
    assert_eq!(fresh.record.reviews[0].review.id, review_id(0));
}

#[tokio::test]
async fn test_exhausted_populate_fails_but_keeps_pages() {
    let source = Arc::new(ScriptedSource::new(1000));
    source.fail_from(200, FetchError::UpstreamThrottled { status: 503 });
    let cache = test_cache(source.clone());

    match cache.ensure(key("620"), 500).await {
        Err(AnalysisError::PopulateFailed {
            source: err,
            partial: Some(record),
        }) => {
            assert!(matches!(err, FetchError::FetchExhausted { page: 2, attempts: 3, .. }));
            assert_eq!(record.reviews_analyzed(), 200);
            assert!(!record.source_exhausted);
            assert_eq!(record.next_cursor, "c200");
        }
        other => panic!("expected PopulateFailed with pages, got {:?}", other.map(|r| r.requested)),
    }

    // The fetched pages stay committed and queryable
    match cache.get(&key("620")).await {
        Lookup::Ready(record) => assert_eq!(record.reviews_analyzed(), 200),
        other => panic!("expected Ready, got {:?}", other),
    }

    // A later request resumes from the stored cursor
    source.heal();
    let resumed = cache.ensure(key("620"), 500).await.unwrap();
    assert_eq!(resumed.fetched_now, 300);
    assert_eq!(resumed.view().len(), 500);
    assert!(resumed.notes.is_empty());
    assert_eq!(resumed.record.reviews[200].review.id, review_id(200));
}

#[tokio::test]
async fn test_keys_are_isolated_by_filter_and_language() {
    use hourglass_common::{FilterMode, ScopeKey};

    let source = Arc::new(ScriptedSource::new(100));
    let cache = test_cache(source.clone());

    cache.ensure(key("620"), 50).await.unwrap();
    cache
        .ensure(ScopeKey::new("620", FilterMode::All, "english"), 50)
        .await
        .unwrap();
    cache
        .ensure(ScopeKey::new("620", FilterMode::Recent, "german"), 50)
        .await
        .unwrap();

    assert_eq!(source.calls(), 3);
    assert_eq!(cache.len().await, 3);
}
