//! Paginated review feed over a committed analysis
//!
//! Pure reads: nothing here fetches or mutates the cache.

use crate::services::analysis_cache::AnalysisRecord;
use hourglass_common::api::{FeedScope, ReviewRow, ReviewsPage};
use hourglass_common::AnnotatedReview;

/// Normalized feed request
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRequest {
    pub offset: usize,
    /// Already clamped to 1..=200
    pub limit: usize,
    /// Bound the view to the first `total_count` reviews of the record
    pub total_count: Option<usize>,
    pub themed_only: bool,
    pub fallback_if_none: bool,
}

impl Default for FeedRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: hourglass_common::api::types::DEFAULT_PAGE_LIMIT,
            total_count: None,
            themed_only: true,
            fallback_if_none: false,
        }
    }
}

/// Reviews a feed or export draws from, with the scope actually used
pub fn select_reviews<'a>(
    record: &'a AnalysisRecord,
    total_count: Option<usize>,
    themed_only: bool,
    fallback_if_none: bool,
) -> (Vec<&'a AnnotatedReview>, FeedScope) {
    let view = record.view(total_count.unwrap_or(usize::MAX));

    if !themed_only {
        return (view.iter().collect(), FeedScope::All);
    }

    let themed: Vec<&AnnotatedReview> = view.iter().filter(|r| r.is_themed()).collect();
    if themed.is_empty() && fallback_if_none {
        return (view.iter().collect(), FeedScope::AllFallback);
    }
    (themed, FeedScope::Themed)
}

/// One page of the feed, in fetch order
pub fn page(record: &AnalysisRecord, request: &FeedRequest) -> ReviewsPage {
    let (reviews, scope) = select_reviews(
        record,
        request.total_count,
        request.themed_only,
        request.fallback_if_none,
    );

    let total_available = reviews.len();
    let rows = reviews
        .into_iter()
        .skip(request.offset)
        .take(request.limit)
        .map(ReviewRow::from)
        .collect();

    ReviewsPage {
        reviews: rows,
        total_available,
        offset: request.offset,
        limit: request.limit,
        scope,
    }
}
