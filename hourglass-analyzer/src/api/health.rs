//! Health check endpoint
//!
//! Liveness plus cache occupancy, so a stuck upstream shows up as
//! analyses piling up in flight.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Module name ("hourglass-analyzer")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Scope keys with a committed analysis
    pub cached_analyses: usize,
    /// Annotated reviews held across all analyses
    pub reviews_held: usize,
    /// Populate or extend operations still running, including ones whose
    /// request already timed out
    pub analyses_in_flight: usize,
    /// Last error message if any (for diagnostics)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let last_error = state.last_error.read().await.clone();
    let cache = state.cache.stats().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "hourglass-analyzer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        cached_analyses: cache.analyses,
        reviews_held: cache.reviews_held,
        analyses_in_flight: cache.in_flight,
        last_error,
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
