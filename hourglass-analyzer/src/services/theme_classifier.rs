//! Theme classifier
//!
//! Tags review text with the time-related themes it mentions. Each theme
//! is a fixed keyword dictionary compiled once into a single
//! case-insensitive alternation.
//!
//! Matching rules:
//! - Single words match on word boundaries ("short" does not hit "shorts")
//! - Phrases and hyphenated terms match as exact substrings, keeping their
//!   internal spacing and hyphenation

use hourglass_common::ThemeTag;
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};
use std::collections::BTreeSet;

const LENGTH_KEYWORDS: &[&str] = &[
    "hour", "hours", "length", "lengths", "lengthy", "short", "long",
    "time sink", "time investment", "time commitment",
    "seconds", "minute", "minutes", "hourly",
    "per day", "days", "weekly", "month", "months",
    "quarterly", "year", "years", "yearly", "annual",
    "session", "sessions", "playtime", "play time", "player time",
    "limited time",
    "runtime", "run time",
    "playthrough", "play-through",
    "game length", "story length",
    "beat in", "beaten in", "finished in", "finish in",
    "hours in",
];

const GRIND_KEYWORDS: &[&str] = &[
    "grind", "grindy", "farming", "repetitive", "repetition",
    "burnout", "dailies", "daily", "chore", "time waste",
    "waste of time", "time waster", "time-waster",
    "time wasting", "time-wasting",
    "time-consuming", "time consuming",
    "busywork", "padding", "filler",
    "tedious", "tedium", "tedius",
    "grindfest", "grind fest", "mindless grind",
    "time gate", "time gated", "time-gated",
    "timegate", "timegated",
];

const VALUE_KEYWORDS: &[&str] = &[
    // time-relational value
    "replayable", "replayability", "content updates",
    "longevity", "shelf life",
    "lifespan", "life span", "roadmap", "road map", "season", "seasons", "seasonal",
    // explicit time/price conjunctions
    "too short for the price",
    "worth the time", "not worth the time",
    "time well spent",
    "good use of time",
    "waste of time and money",
    "hours of content", "hours of gameplay",
    "per hour", "per-hour",
    // respect for player time
    "respect my time", "respects my time", "respect your time", "respects your time",
    "respect the player's time", "respect the players' time", "respects the player's time",
    "respecting my time", "respecting your time",
    "waste my time", "wastes my time", "waste your time", "wastes your time",
    "waste of time", "total waste of time", "complete waste of time",
];

/// Keyword dictionary for a theme
pub fn keywords_for(tag: ThemeTag) -> &'static [&'static str] {
    match tag {
        ThemeTag::Length => LENGTH_KEYWORDS,
        ThemeTag::Grind => GRIND_KEYWORDS,
        ThemeTag::Value => VALUE_KEYWORDS,
    }
}

/// Compile a keyword list into one case-insensitive alternation
///
/// Returns `None` when the list holds no usable keyword.
pub fn compile_keyword_pattern(keywords: &[&str]) -> Result<Option<Regex>, regex::Error> {
    let parts: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| {
            if k.contains(' ') || k.contains('-') {
                regex::escape(k)
            } else {
                format!(r"\b{}\b", regex::escape(k))
            }
        })
        .collect();

    if parts.is_empty() {
        return Ok(None);
    }

    RegexBuilder::new(&parts.join("|"))
        .case_insensitive(true)
        .build()
        .map(Some)
}

/// Compiled pattern per theme, in [`ThemeTag::ALL`] order
static THEME_PATTERNS: Lazy<Vec<(ThemeTag, Regex)>> = Lazy::new(|| {
    ThemeTag::ALL
        .iter()
        .filter_map(|&tag| match compile_keyword_pattern(keywords_for(tag)) {
            Ok(Some(pattern)) => Some((tag, pattern)),
            Ok(None) => None,
            Err(e) => {
                tracing::error!(theme = %tag, error = %e, "Theme pattern failed to compile");
                None
            }
        })
        .collect()
});

/// Themes mentioned anywhere in `text`
pub fn classify(text: &str) -> BTreeSet<ThemeTag> {
    if text.trim().is_empty() {
        return BTreeSet::new();
    }

    THEME_PATTERNS
        .iter()
        .filter(|(_, pattern)| pattern.is_match(text))
        .map(|(tag, _)| *tag)
        .collect()
}

/// Whether `text` mentions at least one of `tags`
pub fn matches_themes(text: &str, tags: &BTreeSet<ThemeTag>) -> bool {
    if text.trim().is_empty() {
        return false;
    }

    THEME_PATTERNS
        .iter()
        .any(|(tag, pattern)| tags.contains(tag) && pattern.is_match(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(list: &[ThemeTag]) -> BTreeSet<ThemeTag> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_single_word_uses_word_boundary() {
        assert_eq!(classify("this game is way too short"), tags(&[ThemeTag::Length]));
        assert!(classify("shorts are comfortable").is_empty());
    }

    #[test]
    fn test_hyphenated_phrase_matches_exactly() {
        assert_eq!(classify("time-gated progression"), tags(&[ThemeTag::Grind]));
        assert_eq!(classify("Time Gated events"), tags(&[ThemeTag::Grind]));
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        assert_eq!(classify("SO GRINDY"), tags(&[ThemeTag::Grind]));
    }

    #[test]
    fn test_multiple_themes() {
        let found = classify("Forty hours in and the grind is real, but great replayability.");
        assert_eq!(
            found,
            tags(&[ThemeTag::Length, ThemeTag::Grind, ThemeTag::Value])
        );
    }

    #[test]
    fn test_phrase_spans_themes() {
        // "waste of time" is both a grind and a value phrase
        let found = classify("a complete waste of time");
        assert!(found.contains(&ThemeTag::Grind));
        assert!(found.contains(&ThemeTag::Value));
    }

    #[test]
    fn test_empty_text_has_no_tags() {
        assert!(classify("").is_empty());
        assert!(classify("   \n\t").is_empty());
    }

    #[test]
    fn test_unthemed_text() {
        assert!(classify("Great art direction and a lovely soundtrack.").is_empty());
    }

    #[test]
    fn test_matches_themes_respects_tag_set() {
        let grind_only = tags(&[ThemeTag::Grind]);
        assert!(matches_themes("too much farming", &grind_only));
        assert!(!matches_themes("about 20 hours long", &grind_only));
        assert!(!matches_themes("", &grind_only));
    }

    #[test]
    fn test_compile_empty_keyword_list() {
        assert!(compile_keyword_pattern(&["", "  "]).unwrap().is_none());
    }
}
