//! Shared test helpers: a scripted upstream and app/cache builders

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hourglass_analyzer::error::FetchError;
use hourglass_analyzer::services::{
    AnalysisCache, FetchClient, PageRequest, ReviewPage, ReviewSource, INITIAL_CURSOR,
};
use hourglass_analyzer::utils::RetryPolicy;
use hourglass_analyzer::AppState;
use hourglass_common::config::{CacheConfig, TomlConfig};
use hourglass_common::{FilterMode, Review, ScopeKey};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Review text templates, cycled by index
///
/// 0: length/positive, 1: grind/negative, 2: unthemed, 3: value/positive
const TEMPLATES: [&str; 4] = [
    "Took me about {n} hours to finish and it was great.",
    "The grind is tedious and boring.",
    "Nice art style.",
    "Worth the time, good replayability.",
];

pub fn review_id(index: usize) -> String {
    format!("{}", 10_000 + index)
}

pub fn generated_review(index: usize) -> Review {
    let text = TEMPLATES[index % TEMPLATES.len()].replace("{n}", &(index % 60).to_string());
    Review {
        id: review_id(index),
        text,
        playtime_hours: (index % 120) as f64 + 0.5,
        voted_up: index % 4 != 1,
        posted_at: Utc.timestamp_opt(1_700_000_000 + index as i64, 0).unwrap(),
        updated_at: Utc.timestamp_opt(1_700_000_000 + index as i64, 0).unwrap(),
        language: "english".to_string(),
    }
}

/// Upstream serving `total` generated reviews by offset cursor (`*`, `c100`, ...)
pub struct ScriptedSource {
    total: usize,
    calls: AtomicUsize,
    delay: Option<Duration>,
    /// Every request starting at or past this offset fails with this error
    failure: Mutex<Option<(usize, FetchError)>>,
}

impl ScriptedSource {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            calls: AtomicUsize::new(0),
            delay: None,
            failure: Mutex::new(None),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fail_from(&self, offset: usize, error: FetchError) {
        *self.failure.lock().unwrap() = Some((offset, error));
    }

    pub fn heal(&self) {
        *self.failure.lock().unwrap() = None;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReviewSource for ScriptedSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<ReviewPage, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let start: usize = if request.cursor == INITIAL_CURSOR {
            0
        } else {
            request
                .cursor
                .trim_start_matches('c')
                .parse()
                .map_err(|_| FetchError::UpstreamUnavailable("bad cursor".to_string()))?
        };

        if let Some((offset, error)) = self.failure.lock().unwrap().as_ref() {
            if start >= *offset {
                return Err(error.clone());
            }
        }

        let end = (start + request.page_size as usize).min(self.total);
        Ok(ReviewPage {
            reviews: (start..end).map(generated_review).collect(),
            next_cursor: Some(format!("c{}", end)),
            total_hint: (start == 0).then_some(self.total as u64),
        })
    }
}

pub fn key(subject: &str) -> ScopeKey {
    ScopeKey::new(subject, FilterMode::Recent, "english")
}

pub fn test_cache(source: Arc<ScriptedSource>) -> Arc<AnalysisCache> {
    let fetcher = FetchClient::new(source, 100, RetryPolicy::immediate(2));
    Arc::new(AnalysisCache::new(fetcher, &CacheConfig::default()))
}

pub fn test_state(source: Arc<ScriptedSource>) -> AppState {
    AppState::new(test_cache(source), &TomlConfig::default())
}

pub fn test_app(source: Arc<ScriptedSource>) -> axum::Router {
    hourglass_analyzer::build_router(test_state(source))
}
