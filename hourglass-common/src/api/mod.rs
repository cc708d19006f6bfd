//! Shared HTTP API types
//!
//! Pure data: request/response shapes and input normalization. The
//! analyzer wraps these with its axum handlers.

pub mod types;

pub use types::{
    clamp_page_limit, clamp_review_count, AnalysisNote, AnalyzeRequest, AnalyzeResponse,
    CacheInfo, ExportQuery, FeedScope, NoteCode, ReviewRow, ReviewsPage, ReviewsQuery,
    SentimentMethod, SentimentThresholds, ThematicScores,
};
