//! Turns raw extraction output into the content written on success
//!
//! Empty strings count as absent, and a publication date that cannot be parsed is dropped
//! rather than failing the item.

use crate::ingest::extractor::ExtractionResult;
use crate::storage::ItemContent;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f%z", "%Y-%m-%d %H:%M:%S%.f%z"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%B %d %Y",
    "%b %d %Y",
];

/// Builds the content record for a successful extraction
pub fn normalize_extraction(result: ExtractionResult) -> ItemContent {
    ItemContent {
        title: non_empty(result.title),
        content: non_empty(result.markdown),
        original_image: non_empty(result.og_image),
        author: non_empty(result.author),
        published_at: result.published_at.as_deref().and_then(parse_published_at),
    }
}

/// Parses the publication dates commonly reported by article metadata
///
/// Values without an offset are read as UTC; date-only values land at midnight UTC.
///
/// ```
/// use pagekeep::ingest::parse_published_at;
///
/// assert!(parse_published_at("2024-03-01T09:30:00Z").is_some());
/// assert!(parse_published_at("March 1, 2024").is_some());
/// assert!(parse_published_at("last Tuesday").is_none());
/// ```
pub fn parse_published_at(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
        }
    }

    tracing::debug!(value = %raw, "Ignoring unparsable publication date");
    None
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}
