//! # Hourglass Common Library
//!
//! Shared code for the Hourglass review analysis service:
//! - Domain types (reviews, theme tags, sentiment labels, scope keys)
//! - API request/response types
//! - Bootstrap configuration loading
//! - Common error type

pub mod api;
pub mod config;
pub mod error;
pub mod models;

pub use error::{Error, Result};
pub use models::{
    AnnotatedReview, FilterMode, PlaytimeDistribution, Review, ScopeKey, SentimentLabel,
    SentimentScope, ThemeScore, ThemeTag,
};
