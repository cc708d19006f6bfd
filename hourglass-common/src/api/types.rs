//! Request/response types for the analyze, review feed and export operations

use crate::models::{
    AnnotatedReview, FilterMode, PlaytimeDistribution, SentimentLabel, ThemeScore, ThemeTag,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Smallest review count an analysis may request
pub const MIN_REVIEW_COUNT: usize = 1;
/// Largest review count an analysis may request
pub const MAX_REVIEW_COUNT: usize = 5000;
/// Review count used when the caller does not name one
pub const DEFAULT_REVIEW_COUNT: usize = 1000;

/// Feed page size used when the caller does not name one
pub const DEFAULT_PAGE_LIMIT: usize = 20;
/// Largest feed page a caller may request
pub const MAX_PAGE_LIMIT: usize = 200;

/// Clamp a requested review count into [MIN_REVIEW_COUNT, MAX_REVIEW_COUNT]
pub fn clamp_review_count(requested: Option<i64>) -> usize {
    match requested {
        None => DEFAULT_REVIEW_COUNT,
        Some(n) if n < MIN_REVIEW_COUNT as i64 => MIN_REVIEW_COUNT,
        Some(n) if n > MAX_REVIEW_COUNT as i64 => MAX_REVIEW_COUNT,
        Some(n) => n as usize,
    }
}

/// Clamp a requested feed page size into [1, MAX_PAGE_LIMIT]
pub fn clamp_page_limit(requested: Option<i64>) -> usize {
    match requested {
        None => DEFAULT_PAGE_LIMIT,
        Some(n) => n.clamp(1, MAX_PAGE_LIMIT as i64) as usize,
    }
}

/// Accept subject identifiers sent either as JSON strings or numbers
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s.trim().to_string(),
        Raw::Number(n) => n.to_string(),
    })
}

/// Read a count sent as a number or numeric string
///
/// Anything unreadable counts as absent so the caller's default applies.
fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<serde_json::Value>::deserialize(deserializer)? {
        Some(serde_json::Value::Number(n)) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Some(serde_json::Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

// ========================================
// Analyze
// ========================================

/// POST /analyze request body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnalyzeRequest {
    /// Subject (Steam app) identifier
    #[serde(deserialize_with = "string_or_number")]
    pub app_id: String,
    /// Requested review count (clamped to 1..=5000, default 1000)
    #[serde(default, deserialize_with = "lenient_count")]
    pub review_count: Option<i64>,
    /// recent | updated | all (unknown values fall back to recent)
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

/// Per-theme scores in reporting order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThematicScores {
    pub length: ThemeScore,
    pub grind: ThemeScore,
    pub value: ThemeScore,
}

impl ThematicScores {
    pub fn get(&self, tag: ThemeTag) -> &ThemeScore {
        match tag {
            ThemeTag::Length => &self.length,
            ThemeTag::Grind => &self.grind,
            ThemeTag::Value => &self.value,
        }
    }
}

/// Informational note codes attached to a successful analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoteCode {
    /// Upstream has fewer reviews than requested
    Shortfall,
    /// Fetching stopped early on a persistent upstream failure
    Incomplete,
}

/// Informational note accompanying a successful result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisNote {
    pub code: NoteCode,
    pub message: String,
}

/// Sentiment thresholds reported to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentThresholds {
    pub positive_compound_gte: f64,
    pub negative_compound_lte: f64,
}

/// Description of the sentiment method, for client-side disclaimers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentMethod {
    pub model: String,
    pub scope: String,
    pub thresholds: SentimentThresholds,
    pub known_limitations: Vec<String>,
}

/// Whether the result came from cache without any upstream call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheInfo {
    pub hit: bool,
    pub age_seconds: u64,
}

/// POST /analyze response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub status: String,
    pub app_id: String,
    pub review_count_requested: usize,
    pub review_filter: FilterMode,
    pub language: String,
    /// Reviews actually analyzed for this request
    pub total_reviews_collected: usize,
    pub total_themed_reviews: usize,
    pub thematic_scores: ThematicScores,
    pub playtime_distribution: PlaytimeDistribution,
    /// Upstream-reported total for this filter/language, if known
    pub total_reviews_upstream: Option<u64>,
    /// False once upstream has been exhausted for this scope
    pub can_fetch_more: bool,
    pub notes: Vec<AnalysisNote>,
    pub sentiment_method: SentimentMethod,
    pub cache: CacheInfo,
}

// ========================================
// Review feed
// ========================================

/// GET /reviews query parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReviewsQuery {
    pub app_id: String,
    #[serde(default)]
    pub offset: Option<i64>,
    #[serde(default)]
    pub limit: Option<i64>,
    /// Review count of the analysis the caller ran
    #[serde(default)]
    pub total_count: Option<i64>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Only reviews with at least one theme (default true)
    #[serde(default)]
    pub themed_only: Option<bool>,
    /// Serve from all reviews when no themed review exists (default false)
    #[serde(default)]
    pub fallback_if_none: Option<bool>,
}

/// Which review set a feed page was drawn from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedScope {
    Themed,
    All,
    /// Themed set was empty and the caller opted into the fallback
    AllFallback,
}

/// One review as served to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRow {
    pub review_id: String,
    pub review_text: String,
    pub playtime_hours: f64,
    pub sentiment_label: SentimentLabel,
    pub sentiment_compound: f64,
    pub theme_tags: Vec<ThemeTag>,
    pub voted_up: bool,
    pub posted_at: DateTime<Utc>,
}

impl From<&AnnotatedReview> for ReviewRow {
    fn from(annotated: &AnnotatedReview) -> Self {
        Self {
            review_id: annotated.review.id.clone(),
            review_text: annotated.review.text.clone(),
            playtime_hours: annotated.review.playtime_hours,
            sentiment_label: annotated.sentiment,
            sentiment_compound: annotated.compound,
            theme_tags: annotated.tags.iter().copied().collect(),
            voted_up: annotated.review.voted_up,
            posted_at: annotated.review.posted_at,
        }
    }
}

/// GET /reviews response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewsPage {
    pub reviews: Vec<ReviewRow>,
    /// Size of the review set the page was drawn from
    pub total_available: usize,
    pub offset: usize,
    pub limit: usize,
    pub scope: FeedScope,
}

// ========================================
// Export
// ========================================

/// GET /export query parameters
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExportQuery {
    pub app_id: String,
    #[serde(default)]
    pub total_count: Option<i64>,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    /// Only reviews with at least one theme (default true)
    #[serde(default)]
    pub themed_only: Option<bool>,
}
