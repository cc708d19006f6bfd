//! Upstream review source
//!
//! [`ReviewSource`] is the boundary to the third-party review API: one call
//! per page, cursor in, reviews and next cursor out. [`SteamReviewSource`]
//! implements it against Steam's `appreviews` endpoint.
//!
//! Upstream JSON is decoded into strict structs here and converted to
//! [`Review`] immediately; nothing past this module sees raw payloads.

use crate::error::FetchError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use hourglass_common::config::UpstreamConfig;
use hourglass_common::{FilterMode, Review};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::num::NonZeroU32;
use std::time::Duration;

/// Cursor value that starts pagination from the beginning
pub const INITIAL_CURSOR: &str = "*";

/// One page request
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub subject_id: String,
    pub cursor: String,
    pub page_size: u32,
    pub filter: FilterMode,
    pub language: String,
}

/// One page of decoded reviews
#[derive(Debug, Clone, Default)]
pub struct ReviewPage {
    pub reviews: Vec<Review>,
    /// Continuation cursor; `None` marks end of data
    pub next_cursor: Option<String>,
    /// Upstream-reported total for this filter/language, when present
    pub total_hint: Option<u64>,
}

/// Paged upstream review source
#[async_trait]
pub trait ReviewSource: Send + Sync {
    /// Fetch a single page. Implementations do not retry.
    async fn fetch_page(&self, request: &PageRequest) -> Result<ReviewPage, FetchError>;
}

// ============================================================================
// Steam wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct SteamReviewsResponse {
    success: i64,
    #[serde(default)]
    query_summary: Option<SteamQuerySummary>,
    #[serde(default)]
    reviews: Vec<SteamReview>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SteamQuerySummary {
    /// Only reported on the first page
    #[serde(default)]
    total_reviews: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct SteamReview {
    recommendationid: String,
    #[serde(default)]
    author: SteamAuthor,
    #[serde(default)]
    language: String,
    #[serde(default)]
    review: String,
    #[serde(default)]
    timestamp_created: i64,
    #[serde(default)]
    timestamp_updated: i64,
    #[serde(default)]
    voted_up: bool,
}

#[derive(Debug, Deserialize, Default)]
struct SteamAuthor {
    /// Minutes
    #[serde(default)]
    playtime_forever: u64,
    /// Minutes at the time the review was written
    #[serde(default)]
    playtime_at_review: Option<u64>,
}

/// Convert upstream minutes to hours with one decimal
fn minutes_to_hours(minutes: u64) -> f64 {
    (minutes as f64 / 60.0 * 10.0).round() / 10.0
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default()
}

impl From<SteamReview> for Review {
    fn from(raw: SteamReview) -> Self {
        let minutes = raw
            .author
            .playtime_at_review
            .filter(|m| *m > 0)
            .unwrap_or(raw.author.playtime_forever);

        Review {
            id: raw.recommendationid,
            text: raw.review,
            playtime_hours: minutes_to_hours(minutes),
            voted_up: raw.voted_up,
            posted_at: timestamp(raw.timestamp_created),
            updated_at: timestamp(raw.timestamp_updated),
            language: raw.language,
        }
    }
}

/// Decode a Steam `appreviews` body into a [`ReviewPage`]
fn decode_page(body: &str, request_cursor: &str) -> Result<ReviewPage, FetchError> {
    let payload: SteamReviewsResponse = serde_json::from_str(body)
        .map_err(|e| FetchError::UpstreamUnavailable(format!("Malformed response: {}", e)))?;

    if payload.success != 1 {
        return Err(FetchError::UpstreamUnavailable(format!(
            "Upstream reported success={} (unknown subject?)",
            payload.success
        )));
    }

    // A repeated or missing cursor means there is nothing further
    let next_cursor = payload
        .cursor
        .filter(|c| !c.is_empty() && c != request_cursor);

    Ok(ReviewPage {
        reviews: payload.reviews.into_iter().map(Review::from).collect(),
        next_cursor,
        total_hint: payload.query_summary.and_then(|s| s.total_reviews),
    })
}

// ============================================================================
// Steam client
// ============================================================================

/// Steam `appreviews` client
///
/// Page requests share one token-bucket rate limiter so concurrent analyses
/// for different subjects still respect the upstream's pacing.
pub struct SteamReviewSource {
    http_client: Client,
    base_url: String,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl SteamReviewSource {
    pub fn new(config: &UpstreamConfig) -> hourglass_common::Result<Self> {
        let http_client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| hourglass_common::Error::Internal(format!("HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            hourglass_common::Error::Config("requests_per_second must be non-zero".to_string())
        })?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            rate_limiter: RateLimiter::direct(Quota::per_second(per_second)),
        })
    }
}

#[async_trait]
impl ReviewSource for SteamReviewSource {
    async fn fetch_page(&self, request: &PageRequest) -> Result<ReviewPage, FetchError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}/appreviews/{}", self.base_url, request.subject_id);
        let page_size = request.page_size.to_string();

        tracing::debug!(
            subject = %request.subject_id,
            cursor = %request.cursor,
            page_size = request.page_size,
            filter = %request.filter,
            "Requesting review page"
        );

        let response = self
            .http_client
            .get(&url)
            .query(&[
                ("json", "1"),
                ("cursor", request.cursor.as_str()),
                ("num_per_page", page_size.as_str()),
                ("filter", request.filter.as_str()),
                ("language", request.language.as_str()),
                ("purchase_type", "all"),
            ])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(FetchError::UpstreamThrottled {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(FetchError::UpstreamUnavailable(format!(
                "HTTP {}: {}",
                status.as_u16(),
                error_text.chars().take(200).collect::<String>()
            )));
        }

        let body = response.text().await?;
        decode_page(&body, &request.cursor)
    }
}
