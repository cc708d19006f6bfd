//! Theme-scoped sentiment scoring
//!
//! Two pure stages:
//! 1. [`extract_relevant_sentences`] keeps the sentences that mention one of
//!    the review's themes (possibly none)
//! 2. [`score_text`] runs VADER over whatever [`scope_text`] settled on:
//!    the relevant sentences, or the full review as fallback

use crate::services::theme_classifier::matches_themes;
use hourglass_common::{SentimentLabel, SentimentScope, ThemeTag};
use once_cell::sync::Lazy;
use std::collections::BTreeSet;
use vader_sentiment::SentimentIntensityAnalyzer;

/// Compound score at or above which a text is positive
pub const POSITIVE_THRESHOLD: f64 = 0.2;
/// Compound score at or below which a text is negative
pub const NEGATIVE_THRESHOLD: f64 = -0.2;

/// VADER lexicon and rules, loaded once per process
static ANALYZER: Lazy<SentimentIntensityAnalyzer<'static>> =
    Lazy::new(|| SentimentIntensityAnalyzer::new());

/// Sentiment of one review
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentimentResult {
    pub label: SentimentLabel,
    pub compound: f64,
    pub scope: SentimentScope,
}

/// Text selected for scoring; never empty unless the review itself is
#[derive(Debug, Clone, PartialEq)]
pub struct ScopedText {
    pub text: String,
    pub scope: SentimentScope,
}

/// Split text into sentences on `.`, `!`, `?` and newlines
///
/// Terminators stay attached to their sentence; runs like `?!` are kept
/// together. Abbreviations are not special-cased.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '\n' || c == '\r' {
            push_sentence(&mut sentences, &mut current);
            continue;
        }
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            while let Some(&next) = chars.peek() {
                if !matches!(next, '.' | '!' | '?') {
                    break;
                }
                current.push(next);
                chars.next();
            }
            push_sentence(&mut sentences, &mut current);
        }
    }
    push_sentence(&mut sentences, &mut current);

    sentences
}

fn push_sentence(sentences: &mut Vec<String>, current: &mut String) {
    let trimmed = current.trim();
    if trimmed.chars().any(|c| c.is_alphanumeric()) {
        sentences.push(trimmed.to_string());
    }
    current.clear();
}

/// Sentences mentioning at least one of `tags`, joined by a single space
///
/// Empty when no tag is given or no sentence matches.
pub fn extract_relevant_sentences(text: &str, tags: &BTreeSet<ThemeTag>) -> String {
    if tags.is_empty() {
        return String::new();
    }

    split_sentences(text)
        .into_iter()
        .filter(|sentence| matches_themes(sentence, tags))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Choose the text to score: relevant sentences, else the full review
pub fn scope_text(text: &str, tags: &BTreeSet<ThemeTag>) -> ScopedText {
    let relevant = extract_relevant_sentences(text, tags);
    if relevant.is_empty() {
        if !tags.is_empty() {
            tracing::debug!(
                tags = ?tags,
                "SentimentFallback: no theme-relevant sentence isolated, scoring full text"
            );
        }
        return ScopedText {
            text: text.to_string(),
            scope: SentimentScope::FullText,
        };
    }

    ScopedText {
        text: relevant,
        scope: SentimentScope::ThemeSentences,
    }
}

pub fn label_for(compound: f64) -> SentimentLabel {
    if compound >= POSITIVE_THRESHOLD {
        SentimentLabel::Positive
    } else if compound <= NEGATIVE_THRESHOLD {
        SentimentLabel::Negative
    } else {
        SentimentLabel::Neutral
    }
}

/// Score a review against its theme tags
pub fn score_review(text: &str, tags: &BTreeSet<ThemeTag>) -> SentimentResult {
    let scoped = scope_text(text, tags);
    let compound = score_text(&scoped.text);
    SentimentResult {
        label: label_for(compound),
        compound,
        scope: scoped.scope,
    }
}

/// VADER compound score of `text` in [-1, 1]; 0.0 for blank text
pub fn score_text(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }

    ANALYZER
        .polarity_scores(text)
        .get("compound")
        .copied()
        .unwrap_or(0.0)
}
