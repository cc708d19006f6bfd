//! Error types for hourglass-analyzer
//!
//! Three layers:
//! - [`FetchError`]: upstream review source failures
//! - [`AnalysisError`]: analysis cache failures (carry last-known-good state)
//! - [`ApiError`]: HTTP-facing errors with status mapping

use crate::services::analysis_cache::AnalysisRecord;
use crate::utils::Transient;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hourglass_common::api::AnalyzeResponse;
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

/// Upstream review source errors
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// 429/503-class response; retried internally
    #[error("Upstream throttled (HTTP {status})")]
    UpstreamThrottled { status: u16 },

    /// Connection, timeout or body transfer failure; retried internally
    #[error("Upstream transport error: {0}")]
    Transport(String),

    /// Malformed response, unknown subject or other non-retriable failure
    #[error("Upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Transient failures persisted past the per-page retry budget
    #[error("Retry budget exhausted on page {page} after {attempts} attempts: {last_error}")]
    FetchExhausted {
        page: usize,
        attempts: u32,
        last_error: String,
    },
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            FetchError::UpstreamThrottled { .. } | FetchError::Transport(_)
        )
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::UpstreamUnavailable(format!("Malformed response: {}", err))
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

/// Analysis cache errors
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// First population ended in an error
    ///
    /// `partial` holds the pages committed before a `FetchExhausted`;
    /// every other failure leaves the key absent.
    #[error("Analysis failed: {source}")]
    PopulateFailed {
        source: FetchError,
        partial: Option<Arc<AnalysisRecord>>,
    },

    /// Extension failed; the previous record is untouched and still served
    #[error("Extending analysis failed, previous result kept: {source}")]
    ExtensionFailed {
        source: FetchError,
        fallback: Arc<AnalysisRecord>,
    },
}

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upstream review source failed (502); may carry the last-known-good result
    #[error("Upstream failure: {message}")]
    UpstreamFailure {
        message: String,
        fallback: Option<Box<AnalyzeResponse>>,
    },

    /// Request exceeded its time ceiling (504)
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, fallback) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg, None),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg, None),
            ApiError::UpstreamFailure { message, fallback } => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_FAILURE", message, fallback)
            }
            ApiError::Timeout(msg) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT", msg, None),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg,
                None,
            ),
        };

        let mut body = json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        });
        if let Some(fallback) = fallback {
            body["fallback"] = json!(fallback);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
