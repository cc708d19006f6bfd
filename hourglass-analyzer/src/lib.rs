//! hourglass-analyzer library interface
//!
//! Exposes the analysis pipeline and HTTP router for the binary and for
//! integration testing.

pub mod api;
pub mod error;
pub mod services;
pub mod utils;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use hourglass_common::config::TomlConfig;
use services::AnalysisCache;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// The only mutable shared resource; all writes go through `ensure`
    pub cache: Arc<AnalysisCache>,
    /// Ceiling for analyze requests; the analysis itself keeps running past it
    pub analyze_timeout: Duration,
    /// Ceiling for feed and export requests
    pub query_timeout: Duration,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(cache: Arc<AnalysisCache>, config: &TomlConfig) -> Self {
        Self {
            cache,
            analyze_timeout: Duration::from_secs(config.timeouts.analyze_secs),
            query_timeout: Duration::from_millis(config.timeouts.query_ms),
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Remember an error for `/health`
    pub async fn record_error(&self, message: impl Into<String>) {
        *self.last_error.write().await = Some(message.into());
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::analyze_routes())
        .merge(api::review_routes())
        .merge(api::export_routes())
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
