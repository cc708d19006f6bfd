//! HTTP API handlers for hourglass-analyzer

pub mod analyze;
pub mod export;
pub mod health;
pub mod reviews;

pub use analyze::analyze_routes;
pub use export::export_routes;
pub use health::health_routes;
pub use reviews::review_routes;

use crate::error::ApiError;
use crate::services::{AnalysisRecord, Lookup};
use crate::AppState;
use hourglass_common::models::normalize_language;
use hourglass_common::{FilterMode, ScopeKey};
use std::future::Future;
use std::sync::Arc;

/// Longest subject identifier accepted
const MAX_SUBJECT_ID_LEN: usize = 32;

/// Validate a caller-supplied subject identifier
pub fn validate_subject_id(raw: &str) -> Result<String, ApiError> {
    let id = raw.trim();
    if id.is_empty() {
        return Err(ApiError::BadRequest("Missing 'app_id'".to_string()));
    }
    if id.len() > MAX_SUBJECT_ID_LEN
        || !id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ApiError::BadRequest(format!("Invalid 'app_id': {:?}", id)));
    }
    Ok(id.to_string())
}

/// Build the scope key from raw request fields
pub fn scope_key(
    app_id: &str,
    filter: Option<&str>,
    language: Option<&str>,
) -> Result<ScopeKey, ApiError> {
    Ok(ScopeKey::new(
        validate_subject_id(app_id)?,
        FilterMode::parse_lenient(filter),
        normalize_language(language),
    ))
}

/// Committed record for a read-side request, or the matching 404
pub async fn committed_record(
    state: &AppState,
    key: &ScopeKey,
) -> Result<Arc<AnalysisRecord>, ApiError> {
    match state.cache.get(key).await {
        Lookup::Ready(record) => Ok(record),
        Lookup::Missing => Err(ApiError::NotFound(format!(
            "No analysis for {}; run /analyze first",
            key
        ))),
        Lookup::Expired => Err(ApiError::NotFound(format!(
            "Analysis for {} expired; run /analyze again",
            key
        ))),
    }
}

/// Run a read-side operation under the query timeout
pub async fn with_query_timeout<T, F>(state: &AppState, operation: F) -> Result<T, ApiError>
where
    F: Future<Output = Result<T, ApiError>>,
{
    tokio::time::timeout(state.query_timeout, operation)
        .await
        .map_err(|_| {
            ApiError::Timeout(format!(
                "Query exceeded {} ms",
                state.query_timeout.as_millis()
            ))
        })?
}
