//! CSV export of a committed analysis
//!
//! Rows follow feed order. Text newlines are flattened to spaces; fields are
//! quoted only when they contain a delimiter, quote or line break.

use crate::services::analysis_cache::AnalysisRecord;
use crate::services::query_service::select_reviews;
use hourglass_common::api::FeedScope;
use hourglass_common::{AnnotatedReview, ScopeKey};
use std::borrow::Cow;

pub const CSV_HEADER: [&str; 5] = [
    "Sentiment Label",
    "Sentiment Compound",
    "Playtime (Hours)",
    "Theme Tags",
    "Review Text",
];

/// Normalized export request
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    /// Review count of the analysis being exported
    pub total_count: usize,
    pub themed_only: bool,
}

/// Rendered CSV with bookkeeping for response headers
#[derive(Debug, Clone)]
pub struct CsvExport {
    pub body: String,
    /// Data rows written (header excluded)
    pub rows: usize,
    pub requested: usize,
    /// Reviews held in the bounded view, before theme filtering
    pub available: usize,
    pub scope: FeedScope,
    /// Fewer reviews were held than `requested`
    pub shortfall: bool,
}

/// Quote a field per RFC 4180 when needed
pub fn csv_field(value: &str) -> Cow<'_, str> {
    if value.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", value.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(value)
    }
}

fn flatten_text(text: &str) -> String {
    text.replace("\r\n", " ")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}

fn write_row(out: &mut String, fields: &[&str]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&csv_field(field));
    }
    out.push_str("\r\n");
}

fn review_row(out: &mut String, review: &AnnotatedReview) {
    let tags = review
        .tags
        .iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join("|");
    // Debug formatting keeps the trailing ".0" on whole numbers
    let compound = format!("{:?}", review.compound);
    let playtime = format!("{:?}", review.review.playtime_hours);

    write_row(
        out,
        &[
            review.sentiment.as_str(),
            &compound,
            &playtime,
            &tags,
            &flatten_text(&review.review.text),
        ],
    );
}

/// Render the (themed or full) review set of `record` as CSV
pub fn export_csv(record: &AnalysisRecord, request: &ExportRequest) -> CsvExport {
    let (reviews, scope) = select_reviews(
        record,
        Some(request.total_count),
        request.themed_only,
        false,
    );
    let available = record.view(request.total_count).len();

    let mut body = String::with_capacity(128 + reviews.len() * 256);
    write_row(&mut body, &CSV_HEADER);
    for review in &reviews {
        review_row(&mut body, review);
    }

    CsvExport {
        body,
        rows: reviews.len(),
        requested: request.total_count,
        available,
        scope,
        shortfall: available < request.total_count,
    }
}

/// Download file name for an export
pub fn export_file_name(key: &ScopeKey, total_count: usize, themed_only: bool) -> String {
    let subject: String = key
        .subject_id
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    format!(
        "steam_reviews_{}_{}_{}_{}_{}.csv",
        subject,
        total_count,
        key.filter,
        key.language,
        if themed_only { "themed" } else { "all" }
    )
}
