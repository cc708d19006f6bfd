//! Domain model shared between the analyzer and its API consumers
//!
//! Reviews are immutable once fetched. Everything derived from them
//! (theme tags, sentiment, aggregates) lives alongside, never inside.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Default language when a request does not name one
pub const DEFAULT_LANGUAGE: &str = "english";

/// Upstream review ordering/filter mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Most recently posted first
    #[default]
    Recent,
    /// Most recently updated first
    Updated,
    /// Upstream "helpfulness" ordering
    All,
}

impl FilterMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterMode::Recent => "recent",
            FilterMode::Updated => "updated",
            FilterMode::All => "all",
        }
    }

    /// Parse a caller-supplied filter, falling back to `recent` for
    /// missing or unknown values
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("updated") => FilterMode::Updated,
            Some("all") => FilterMode::All,
            _ => FilterMode::Recent,
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalize a caller-supplied language (trimmed, lowercase, default `english`)
pub fn normalize_language(raw: Option<&str>) -> String {
    match raw.map(|s| s.trim().to_lowercase()) {
        Some(lang) if !lang.is_empty() => lang,
        _ => DEFAULT_LANGUAGE.to_string(),
    }
}

/// Identifies one cacheable analysis: (subject, filter mode, language)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub subject_id: String,
    pub filter: FilterMode,
    pub language: String,
}

impl ScopeKey {
    pub fn new(subject_id: impl Into<String>, filter: FilterMode, language: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into().trim().to_string(),
            filter,
            language: language.into(),
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.subject_id, self.filter, self.language)
    }
}

/// Time-related review theme
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeTag {
    Length,
    Grind,
    Value,
}

impl ThemeTag {
    /// All themes, in reporting order
    pub const ALL: [ThemeTag; 3] = [ThemeTag::Length, ThemeTag::Grind, ThemeTag::Value];

    pub fn as_str(&self) -> &'static str {
        match self {
            ThemeTag::Length => "length",
            ThemeTag::Grind => "grind",
            ThemeTag::Value => "value",
        }
    }
}

impl fmt::Display for ThemeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sentiment label derived from a compound score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Negative => "Negative",
            SentimentLabel::Neutral => "Neutral",
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which text the sentiment was computed over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentScope {
    /// Only the theme-relevant sentences
    ThemeSentences,
    /// The whole review (no relevant sentence could be isolated)
    FullText,
}

/// One user-submitted review as fetched from upstream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Stable upstream identifier
    pub id: String,
    /// Raw review text
    pub text: String,
    /// Author playtime in hours (one decimal)
    pub playtime_hours: f64,
    /// Whether the author recommends the subject
    pub voted_up: bool,
    pub posted_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub language: String,
}

/// A review together with everything derived from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedReview {
    pub review: Review,
    /// Matched themes (set semantics, enumeration order)
    pub tags: BTreeSet<ThemeTag>,
    pub sentiment: SentimentLabel,
    /// Compound score in [-1, 1], rounded to 4 decimals
    pub compound: f64,
    pub sentiment_scope: SentimentScope,
}

impl AnnotatedReview {
    /// A themed review carries at least one theme tag
    pub fn is_themed(&self) -> bool {
        !self.tags.is_empty()
    }

    pub fn has_tag(&self, tag: ThemeTag) -> bool {
        self.tags.contains(&tag)
    }
}

/// Per-theme aggregate over one analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThemeScore {
    /// Number of reviews carrying the theme
    pub found: usize,
    pub positive_count: usize,
    pub negative_count: usize,
    pub neutral_count: usize,
    /// Share of `found` labelled positive (0 when `found` is 0)
    pub positive_percent: f64,
    /// Share of `found` labelled negative (0 when `found` is 0)
    pub negative_percent: f64,
    /// False when `found` is 0; percentages are then meaningless
    pub applicable: bool,
}

/// Histogram bucket labels, in order
pub const PLAYTIME_BUCKET_LABELS: [&str; 7] = ["<1", "1–5", "5–10", "10–20", "20–50", "50–100", "100+"];

/// Playtime histogram and percentiles over the whole review set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaytimeDistribution {
    /// Median hours, absent for an empty review set
    pub median_hours: Option<f64>,
    pub percentile_25th: Option<f64>,
    pub percentile_75th: Option<f64>,
    pub interpretation: String,
    pub histogram_buckets: [usize; 7],
    pub histogram_bins_hours: [String; 7],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_mode_lenient_parse() {
        assert_eq!(FilterMode::parse_lenient(Some("UPDATED")), FilterMode::Updated);
        assert_eq!(FilterMode::parse_lenient(Some(" all ")), FilterMode::All);
        assert_eq!(FilterMode::parse_lenient(Some("funny")), FilterMode::Recent);
        assert_eq!(FilterMode::parse_lenient(None), FilterMode::Recent);
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language(Some(" German ")), "german");
        assert_eq!(normalize_language(Some("   ")), DEFAULT_LANGUAGE);
        assert_eq!(normalize_language(None), DEFAULT_LANGUAGE);
    }

    #[test]
    fn test_scope_key_display() {
        let key = ScopeKey::new(" 620 ", FilterMode::Updated, "english");
        assert_eq!(key.subject_id, "620");
        assert_eq!(key.to_string(), "620_updated_english");
    }

    #[test]
    fn test_theme_tag_serializes_lowercase() {
        let json = serde_json::to_string(&ThemeTag::ALL).unwrap();
        assert_eq!(json, r#"["length","grind","value"]"#);
    }

    #[test]
    fn test_sentiment_label_serializes_capitalized() {
        let json = serde_json::to_string(&SentimentLabel::Negative).unwrap();
        assert_eq!(json, r#""Negative""#);
    }
}
