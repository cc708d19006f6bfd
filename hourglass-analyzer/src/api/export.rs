//! GET /export
//!
//! CSV download of a committed analysis. Never fetches.

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::IntoResponse,
    routing::get,
    Router,
};
use hourglass_common::api::{clamp_review_count, ExportQuery};

use crate::{
    api::{committed_record, scope_key, with_query_timeout},
    error::{ApiError, ApiResult},
    services::export_service::{export_csv, export_file_name, ExportRequest},
    AppState,
};

const ROW_COUNT_HEADER: HeaderName = HeaderName::from_static("x-row-count");
const ROWS_REQUESTED_HEADER: HeaderName = HeaderName::from_static("x-rows-requested");

fn header_value(value: impl ToString) -> ApiResult<HeaderValue> {
    HeaderValue::from_str(&value.to_string())
        .map_err(|e| ApiError::Internal(format!("Invalid header value: {}", e)))
}

/// GET /export
pub async fn export_reviews(
    State(state): State<AppState>,
    query: Result<Query<ExportQuery>, QueryRejection>,
) -> ApiResult<impl IntoResponse> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let key = scope_key(&query.app_id, query.filter.as_deref(), query.language.as_deref())?;
    let request = ExportRequest {
        total_count: clamp_review_count(query.total_count),
        themed_only: query.themed_only.unwrap_or(true),
    };

    let export = with_query_timeout(&state, async {
        let record = committed_record(&state, &key).await?;
        Ok::<_, ApiError>(export_csv(&record, &request))
    })
    .await?;

    tracing::info!(
        scope = %key,
        rows = export.rows,
        requested = export.requested,
        shortfall = export.shortfall,
        "CSV export"
    );

    let file_name = export_file_name(&key, request.total_count, request.themed_only);

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/csv; charset=utf-8"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        header_value(format!("attachment; filename=\"{}\"", file_name))?,
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(
        header::ACCESS_CONTROL_EXPOSE_HEADERS,
        HeaderValue::from_static("Content-Disposition, X-Row-Count, X-Rows-Requested"),
    );
    headers.insert(ROW_COUNT_HEADER, header_value(export.rows)?);
    headers.insert(ROWS_REQUESTED_HEADER, header_value(export.requested)?);

    Ok((headers, export.body))
}

/// Build export routes
pub fn export_routes() -> Router<AppState> {
    Router::new().route("/export", get(export_reviews))
}
