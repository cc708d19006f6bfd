//! GET /reviews
//!
//! Paginated themed-review feed over a committed analysis. Never fetches.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    routing::get,
    Json, Router,
};
use hourglass_common::api::{clamp_page_limit, ReviewsPage, ReviewsQuery};

use crate::{
    api::{committed_record, scope_key, with_query_timeout},
    error::{ApiError, ApiResult},
    services::query_service::{page, FeedRequest},
    AppState,
};

/// GET /reviews
pub async fn list_reviews(
    State(state): State<AppState>,
    query: Result<Query<ReviewsQuery>, QueryRejection>,
) -> ApiResult<Json<ReviewsPage>> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let key = scope_key(&query.app_id, query.filter.as_deref(), query.language.as_deref())?;
    let request = FeedRequest {
        offset: query.offset.unwrap_or(0).max(0) as usize,
        limit: clamp_page_limit(query.limit),
        total_count: query.total_count.map(|n| n.max(0) as usize),
        themed_only: query.themed_only.unwrap_or(true),
        fallback_if_none: query.fallback_if_none.unwrap_or(false),
    };

    let result = with_query_timeout(&state, async {
        let record = committed_record(&state, &key).await?;
        Ok::<_, ApiError>(page(&record, &request))
    })
    .await?;

    tracing::debug!(
        scope = %key,
        offset = request.offset,
        returned = result.reviews.len(),
        total_available = result.total_available,
        "Served review page"
    );

    Ok(Json(result))
}

/// Build review feed routes
pub fn review_routes() -> Router<AppState> {
    Router::new().route("/reviews", get(list_reviews))
}
