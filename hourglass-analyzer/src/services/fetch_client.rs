//! Paginated, retrying review fetcher
//!
//! Walks the upstream cursor chain for one scope key until the target
//! count is reached or the source runs dry. Each page is retried on
//! transient failures per [`RetryPolicy`]; a page that exhausts its budget
//! ends pagination with [`FetchError::FetchExhausted`] while every page
//! obtained before it is still returned.

use crate::error::FetchError;
use crate::services::review_source::{PageRequest, ReviewSource};
use crate::utils::{retry_transient, RetryError, RetryPolicy};
use hourglass_common::{Review, ScopeKey};
use std::collections::HashSet;
use std::sync::Arc;

/// Consecutive pages yielding only already-known reviews before giving up
const MAX_STALE_PAGES: usize = 3;

/// Result of one pagination run
#[derive(Debug)]
pub struct FetchOutcome {
    /// New reviews in upstream order, de-duplicated against known IDs
    pub reviews: Vec<Review>,
    /// Cursor to request next; advanced only past fully consumed pages
    pub next_cursor: String,
    pub total_hint: Option<u64>,
    /// Upstream has nothing beyond what has now been fetched
    pub source_exhausted: bool,
    pub pages_fetched: usize,
    /// Set when pagination stopped on a failure
    pub error: Option<FetchError>,
}

/// Fetch client over any [`ReviewSource`]
pub struct FetchClient {
    source: Arc<dyn ReviewSource>,
    page_size: u32,
    retry_policy: RetryPolicy,
}

impl FetchClient {
    pub fn new(source: Arc<dyn ReviewSource>, page_size: u32, retry_policy: RetryPolicy) -> Self {
        Self {
            source,
            page_size: page_size.clamp(1, 100),
            retry_policy,
        }
    }

    /// Fetch up to `target` reviews not already in `known_ids`, starting at `start_cursor`
    ///
    /// Never requests more than the remaining count in a page, so the
    /// returned cursor never skips reviews that were not kept.
    pub async fn fetch(
        &self,
        key: &ScopeKey,
        target: usize,
        start_cursor: &str,
        known_ids: &HashSet<String>,
    ) -> FetchOutcome {
        let mut outcome = FetchOutcome {
            reviews: Vec::with_capacity(target.min(5000)),
            next_cursor: start_cursor.to_string(),
            total_hint: None,
            source_exhausted: false,
            pages_fetched: 0,
            error: None,
        };
        let mut seen: HashSet<String> = HashSet::new();
        let mut stale_pages = 0;

        while outcome.reviews.len() < target {
            let remaining = target - outcome.reviews.len();
            let request = PageRequest {
                subject_id: key.subject_id.clone(),
                cursor: outcome.next_cursor.clone(),
                page_size: self.page_size.min(remaining as u32),
                filter: key.filter,
                language: key.language.clone(),
            };
            let page_index = outcome.pages_fetched;

            let page = match retry_transient("fetch_review_page", &self.retry_policy, || {
                self.source.fetch_page(&request)
            })
            .await
            {
                Ok(page) => page,
                Err(RetryError::Permanent(err)) => {
                    outcome.error = Some(err);
                    break;
                }
                Err(RetryError::Exhausted {
                    attempts,
                    last_error,
                }) => {
                    outcome.error = Some(FetchError::FetchExhausted {
                        page: page_index,
                        attempts,
                        last_error: last_error.to_string(),
                    });
                    break;
                }
            };

            outcome.pages_fetched += 1;
            if page.total_hint.is_some() {
                outcome.total_hint = page.total_hint;
            }

            let received = page.reviews.len();
            if received > request.page_size as usize {
                tracing::debug!(
                    received,
                    requested = request.page_size,
                    "Upstream returned more reviews than requested; keeping the requested count"
                );
            }

            let mut added = 0;
            for review in page.reviews.into_iter().take(remaining) {
                if known_ids.contains(&review.id) || !seen.insert(review.id.clone()) {
                    continue;
                }
                outcome.reviews.push(review);
                added += 1;
            }

            tracing::debug!(
                scope = %key,
                page = page_index,
                received,
                added,
                collected = outcome.reviews.len(),
                target,
                "Consumed review page"
            );

            if received == 0 {
                outcome.source_exhausted = true;
                break;
            }

            match page.next_cursor {
                Some(cursor) => outcome.next_cursor = cursor,
                None => {
                    outcome.source_exhausted = true;
                    break;
                }
            }

            if let Some(total) = outcome.total_hint {
                if (known_ids.len() + outcome.reviews.len()) as u64 >= total {
                    outcome.source_exhausted = true;
                    break;
                }
            }

            if added == 0 {
                stale_pages += 1;
                if stale_pages >= MAX_STALE_PAGES {
                    tracing::warn!(
                        scope = %key,
                        stale_pages,
                        "Upstream keeps returning known reviews; treating source as exhausted"
                    );
                    outcome.source_exhausted = true;
                    break;
                }
            } else {
                stale_pages = 0;
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::review_source::{ReviewPage, INITIAL_CURSOR};
    use async_trait::async_trait;
    use chrono::Utc;
    use hourglass_common::FilterMode;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn review(id: usize) -> Review {
        Review {
            id: format!("r{}", id),
            text: format!("review {}", id),
            playtime_hours: id as f64,
            voted_up: true,
            posted_at: Utc::now(),
            updated_at: Utc::now(),
            language: "english".to_string(),
        }
    }

    /// Serves `total` reviews by offset cursor, with an optional error script
    struct OffsetSource {
        total: usize,
        failures: Mutex<VecDeque<Option<FetchError>>>,
        requests: Mutex<Vec<PageRequest>>,
    }

    impl OffsetSource {
        fn new(total: usize) -> Self {
            Self {
                total,
                failures: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn with_script(total: usize, script: Vec<Option<FetchError>>) -> Self {
            let source = Self::new(total);
            *source.failures.lock().unwrap() = script.into();
            source
        }

        fn requests(&self) -> Vec<PageRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReviewSource for OffsetSource {
        async fn fetch_page(&self, request: &PageRequest) -> Result<ReviewPage, FetchError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(Some(err)) = self.failures.lock().unwrap().pop_front() {
                return Err(err);
            }

            let start: usize = if request.cursor == INITIAL_CURSOR {
                0
            } else {
                request.cursor.trim_start_matches('c').parse().unwrap()
            };
            let end = (start + request.page_size as usize).min(self.total);
            Ok(ReviewPage {
                reviews: (start..end).map(review).collect(),
                next_cursor: Some(format!("c{}", end)),
                total_hint: (start == 0).then_some(self.total as u64),
            })
        }
    }

    fn key() -> ScopeKey {
        ScopeKey::new("620", FilterMode::Recent, "english")
    }

    fn client(source: Arc<OffsetSource>, retries: u32) -> FetchClient {
        FetchClient::new(source, 100, RetryPolicy::immediate(retries))
    }

    #[tokio::test]
    async fn test_fetch_stops_at_target() {
        let source = Arc::new(OffsetSource::new(1000));
        let outcome = client(source.clone(), 0)
            .fetch(&key(), 250, INITIAL_CURSOR, &HashSet::new())
            .await;

        assert_eq!(outcome.reviews.len(), 250);
        assert_eq!(outcome.pages_fetched, 3);
        assert_eq!(outcome.next_cursor, "c250");
        assert!(!outcome.source_exhausted);
        assert!(outcome.error.is_none());

        let sizes: Vec<u32> = source.requests().iter().map(|r| r.page_size).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[tokio::test]
    async fn test_fetch_reports_shortfall() {
        let source = Arc::new(OffsetSource::new(22));
        let outcome = client(source.clone(), 0)
            .fetch(&key(), 1000, INITIAL_CURSOR, &HashSet::new())
            .await;

        assert_eq!(outcome.reviews.len(), 22);
        assert!(outcome.source_exhausted);
        assert_eq!(outcome.total_hint, Some(22));
        assert_eq!(source.requests().len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_resumes_from_cursor() {
        let source = Arc::new(OffsetSource::new(1000));
        let known: HashSet<String> = (0..100).map(|i| format!("r{}", i)).collect();
        let outcome = client(source.clone(), 0)
            .fetch(&key(), 100, "c100", &known)
            .await;

        assert_eq!(outcome.reviews.first().map(|r| r.id.as_str()), Some("r100"));
        assert_eq!(outcome.reviews.len(), 100);
        assert_eq!(source.requests()[0].cursor, "c100");
    }

    #[tokio::test]
    async fn test_fetch_skips_known_ids() {
        let source = Arc::new(OffsetSource::new(1000));
        let known: HashSet<String> = (0..50).map(|i| format!("r{}", i)).collect();
        let outcome = client(source, 0)
            .fetch(&key(), 100, INITIAL_CURSOR, &known)
            .await;

        assert!(outcome.reviews.iter().all(|r| !known.contains(&r.id)));
        assert_eq!(outcome.reviews.len(), 100);
        assert_eq!(outcome.reviews[0].id, "r50");
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let script = vec![
            Some(FetchError::UpstreamThrottled { status: 503 }),
            Some(FetchError::UpstreamThrottled { status: 429 }),
        ];
        let source = Arc::new(OffsetSource::with_script(1000, script));
        let outcome = client(source.clone(), 3)
            .fetch(&key(), 100, INITIAL_CURSOR, &HashSet::new())
            .await;

        assert!(outcome.error.is_none());
        assert_eq!(outcome.reviews.len(), 100);
        assert_eq!(source.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_keeps_earlier_pages() {
        // Page 0 succeeds, page 1 fails on every attempt (1 + 2 retries)
        let script = vec![
            None,
            Some(FetchError::Transport("reset".into())),
            Some(FetchError::Transport("reset".into())),
            Some(FetchError::Transport("reset".into())),
        ];
        let source = Arc::new(OffsetSource::with_script(1000, script));
        let outcome = client(source, 2)
            .fetch(&key(), 300, INITIAL_CURSOR, &HashSet::new())
            .await;

        assert_eq!(outcome.reviews.len(), 100);
        assert_eq!(outcome.next_cursor, "c100");
        match outcome.error {
            Some(FetchError::FetchExhausted { page, attempts, .. }) => {
                assert_eq!(page, 1);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected FetchExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_permanent_failure_is_not_retried() {
        let script = vec![Some(FetchError::UpstreamUnavailable("unknown app".into()))];
        let source = Arc::new(OffsetSource::with_script(1000, script));
        let outcome = client(source.clone(), 5)
            .fetch(&key(), 100, INITIAL_CURSOR, &HashSet::new())
            .await;

        assert!(outcome.reviews.is_empty());
        assert!(matches!(outcome.error, Some(FetchError::UpstreamUnavailable(_))));
        assert_eq!(source.requests().len(), 1);
    }
}
