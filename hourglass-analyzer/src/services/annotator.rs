//! Review annotation: theme tags plus theme-scoped sentiment

use crate::services::sentiment_scorer::score_review;
use crate::services::theme_classifier::classify;
use hourglass_common::{AnnotatedReview, Review};

/// Classify and score one review
pub fn annotate(review: Review) -> AnnotatedReview {
    let tags = classify(&review.text);
    let sentiment = score_review(&review.text, &tags);

    AnnotatedReview {
        review,
        tags,
        sentiment: sentiment.label,
        compound: (sentiment.compound * 10_000.0).round() / 10_000.0,
        sentiment_scope: sentiment.scope,
    }
}

/// Annotate a batch, preserving order
pub fn annotate_all(reviews: Vec<Review>) -> Vec<AnnotatedReview> {
    reviews.into_iter().map(annotate).collect()
}
