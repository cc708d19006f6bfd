//! POST /analyze
//!
//! Runs (or reuses) an analysis for a scope key and reports theme scores
//! and the playtime distribution over the first `review_count` reviews.
//!
//! The analysis runs in its own task: a request that times out or
//! disconnects does not cancel it, and its result is still committed.

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::post,
    Json, Router,
};
use hourglass_common::api::{
    clamp_review_count, AnalyzeRequest, AnalyzeResponse, CacheInfo, SentimentMethod,
    SentimentThresholds,
};

use crate::{
    api::scope_key,
    error::{AnalysisError, ApiError, ApiResult},
    services::{
        sentiment_scorer::{NEGATIVE_THRESHOLD, POSITIVE_THRESHOLD},
        AnalysisResult,
    },
    AppState,
};

/// Description of how sentiment labels were derived
pub fn sentiment_method() -> SentimentMethod {
    SentimentMethod {
        model: "VADER (Valence Aware Dictionary and sEntiment Reasoner)".to_string(),
        scope: "Sentiment is computed on time-relevant sentences when possible; otherwise the full review is used.".to_string(),
        thresholds: SentimentThresholds {
            positive_compound_gte: POSITIVE_THRESHOLD,
            negative_compound_lte: NEGATIVE_THRESHOLD,
        },
        known_limitations: vec![
            "May misread sarcasm, memes, or mixed opinions.".to_string(),
            "May not detect domain-specific meanings (e.g., grind as positive for some genres).".to_string(),
            "Sentence extraction is keyword-based, so context can be missed.".to_string(),
        ],
    }
}

/// Response body for one analysis result
pub fn analyze_response(result: &AnalysisResult) -> AnalyzeResponse {
    let record = &result.record;
    let aggregation = result.aggregation();

    AnalyzeResponse {
        status: "success".to_string(),
        app_id: record.key.subject_id.clone(),
        review_count_requested: result.requested,
        review_filter: record.key.filter,
        language: record.key.language.clone(),
        total_reviews_collected: result.view().len(),
        total_themed_reviews: aggregation.total_themed,
        thematic_scores: aggregation.scores.clone(),
        playtime_distribution: aggregation.playtime.clone(),
        total_reviews_upstream: record.total_upstream,
        can_fetch_more: !record.source_exhausted,
        notes: result.notes.clone(),
        sentiment_method: sentiment_method(),
        cache: CacheInfo {
            hit: result.cache_hit,
            age_seconds: record.age().as_secs(),
        },
    }
}

/// POST /analyze
pub async fn analyze(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> ApiResult<Json<AnalyzeResponse>> {
    let Json(request) = payload
        .map_err(|e| ApiError::BadRequest(format!("Error parsing JSON body: {}", e.body_text())))?;

    let key = scope_key(
        &request.app_id,
        request.filter.as_deref(),
        request.language.as_deref(),
    )?;
    let requested = clamp_review_count(request.review_count);

    tracing::info!(scope = %key, requested, "Analyze request");

    let cache = state.cache.clone();
    let task_key = key.clone();
    let task = tokio::spawn(async move { cache.ensure(task_key, requested).await });

    let outcome = match tokio::time::timeout(state.analyze_timeout, task).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(join_error)) => {
            let message = format!("Analysis task failed: {}", join_error);
            state.record_error(message.clone()).await;
            return Err(ApiError::Internal(message));
        }
        Err(_) => {
            let message = format!(
                "Analysis for {} still running after {} s; it will be cached when done",
                key,
                state.analyze_timeout.as_secs()
            );
            tracing::warn!(scope = %key, "{}", message);
            state.record_error(message.clone()).await;
            return Err(ApiError::Timeout(message));
        }
    };

    match outcome {
        Ok(result) => {
            tracing::info!(
                scope = %key,
                collected = result.view().len(),
                fetched_now = result.fetched_now,
                cache_hit = result.cache_hit,
                "Analyze complete"
            );
            Ok(Json(analyze_response(&result)))
        }
        Err(AnalysisError::PopulateFailed { source, partial }) => {
            let message = match &partial {
                Some(record) => format!(
                    "Fetching reviews for {} stopped after {}: {}; fetched reviews kept",
                    key,
                    record.reviews_analyzed(),
                    source
                ),
                None => format!("Failed to fetch reviews for {}: {}", key, source),
            };
            state.record_error(message.clone()).await;
            let fallback = partial.map(|record| {
                Box::new(analyze_response(&AnalysisResult::interrupted(
                    record, requested, &source,
                )))
            });
            Err(ApiError::UpstreamFailure { message, fallback })
        }
        Err(AnalysisError::ExtensionFailed { source, fallback }) => {
            let message = format!(
                "Failed to extend analysis for {}: {}; previous result kept",
                key, source
            );
            state.record_error(message.clone()).await;
            let fallback = analyze_response(&AnalysisResult::cached(fallback, requested));
            Err(ApiError::UpstreamFailure {
                message,
                fallback: Some(Box::new(fallback)),
            })
        }
    }
}

/// Build analyze routes
pub fn analyze_routes() -> Router<AppState> {
    Router::new().route("/analyze", post(analyze))
}
