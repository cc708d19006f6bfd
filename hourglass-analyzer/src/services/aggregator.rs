//! Aggregation engine
//!
//! Rolls an annotated review set into per-theme sentiment scores and a
//! playtime distribution. Always recomputed from scratch over the whole
//! set; nothing is merged incrementally.

use hourglass_common::api::ThematicScores;
use hourglass_common::models::PLAYTIME_BUCKET_LABELS;
use hourglass_common::{AnnotatedReview, PlaytimeDistribution, SentimentLabel, ThemeScore, ThemeTag};

/// Lower bounds (hours, inclusive) of the playtime buckets after the first
const BUCKET_LOWER_BOUNDS: [f64; 6] = [1.0, 5.0, 10.0, 20.0, 50.0, 100.0];

const HIGH_DEDICATION: &str =
    "Players show high dedication, with the middle 50% spending over 10 hours.";
const HIGHLY_VARIABLE: &str = "Highly variable experience; many play briefly, but a significant core invests substantial time.";
const MODERATE: &str = "The majority of players spend moderate time in the game.";
const NOT_ENOUGH_DATA: &str = "Not enough data with recorded playtime to analyse distribution.";

/// Everything derived from one review set
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub scores: ThematicScores,
    pub playtime: PlaytimeDistribution,
    /// Reviews carrying at least one theme
    pub total_themed: usize,
}

pub fn aggregate(reviews: &[AnnotatedReview]) -> Aggregation {
    Aggregation {
        scores: ThematicScores {
            length: theme_score(reviews, ThemeTag::Length),
            grind: theme_score(reviews, ThemeTag::Grind),
            value: theme_score(reviews, ThemeTag::Value),
        },
        playtime: playtime_distribution(reviews),
        total_themed: reviews.iter().filter(|r| r.is_themed()).count(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn percent(count: usize, found: usize) -> f64 {
    if found == 0 {
        return 0.0;
    }
    round2(count as f64 / found as f64 * 100.0)
}

/// Sentiment breakdown over the reviews carrying `tag`
pub fn theme_score(reviews: &[AnnotatedReview], tag: ThemeTag) -> ThemeScore {
    let (mut positive, mut negative, mut neutral) = (0, 0, 0);
    for review in reviews.iter().filter(|r| r.has_tag(tag)) {
        match review.sentiment {
            SentimentLabel::Positive => positive += 1,
            SentimentLabel::Negative => negative += 1,
            SentimentLabel::Neutral => neutral += 1,
        }
    }
    let found = positive + negative + neutral;

    ThemeScore {
        found,
        positive_count: positive,
        negative_count: negative,
        neutral_count: neutral,
        positive_percent: percent(positive, found),
        negative_percent: percent(negative, found),
        applicable: found > 0,
    }
}

/// Linearly interpolated percentile of an ascending, non-empty slice
///
/// `rank = p / 100 * (n - 1)`, interpolating between the closest ranks.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let rank = (p / 100.0).clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * weight)
}

/// Histogram bucket index for a playtime in hours
pub fn bucket_index(hours: f64) -> usize {
    BUCKET_LOWER_BOUNDS
        .iter()
        .take_while(|&&bound| hours >= bound)
        .count()
}

fn interpretation(median: f64, p75: f64) -> &'static str {
    if p75 > 50.0 && median > 10.0 {
        HIGH_DEDICATION
    } else if p75 > 10.0 && median < 5.0 {
        HIGHLY_VARIABLE
    } else {
        MODERATE
    }
}

/// Playtime histogram and percentiles over every review, themed or not
pub fn playtime_distribution(reviews: &[AnnotatedReview]) -> PlaytimeDistribution {
    let mut hours: Vec<f64> = reviews
        .iter()
        .map(|r| r.review.playtime_hours.max(0.0))
        .collect();
    hours.sort_by(f64::total_cmp);

    let mut histogram_buckets = [0usize; 7];
    for &h in &hours {
        histogram_buckets[bucket_index(h)] += 1;
    }

    let median = percentile(&hours, 50.0).map(round2);
    let p25 = percentile(&hours, 25.0).map(round2);
    let p75 = percentile(&hours, 75.0).map(round2);

    let interpretation = match (median, p75) {
        (Some(median), Some(p75)) => interpretation(median, p75),
        _ => NOT_ENOUGH_DATA,
    };

    PlaytimeDistribution {
        median_hours: median,
        percentile_25th: p25,
        percentile_75th: p75,
        interpretation: interpretation.to_string(),
        histogram_buckets,
        histogram_bins_hours: PLAYTIME_BUCKET_LABELS.map(str::to_string),
    }
}
