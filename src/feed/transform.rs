use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::borrow::Cow;
use std::fmt;

use super::raw::RawArticle;
use crate::storage::NewArticle;

/// Author recorded when the feed gives none
pub const UNKNOWN_AUTHOR: &str = "Unknown";

/// Timestamp layouts without an offset, tried after RFC 3339
const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Offset-carrying layouts RFC 3339 rejects (space separator, no seconds)
const OFFSET_DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M%:z"];

/// Recoverable data-quality problem found while transforming one entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformWarning {
    /// `published_at` was present but not a recognizable timestamp
    UnparseableDate(String),
}

impl fmt::Display for TransformWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransformWarning::UnparseableDate(raw) => write!(f, "could not parse date: {raw:?}"),
        }
    }
}

/// A transformed article and whatever was wrong with its input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transformed {
    pub article: NewArticle,
    pub warnings: Vec<TransformWarning>,
}

/// Map one raw feed entry to a fully populated article.
///
/// Never fails: missing or null fields take their defaults (empty string,
/// `"Unknown"` for the author, no date) and an unparseable date is reported
/// as a warning.
pub fn transform(raw: &RawArticle) -> Transformed {
    let mut warnings = Vec::new();

    let published_at = match raw.text("published_at") {
        Some(value) if !value.trim().is_empty() => {
            let parsed = parse_published_date(&value);
            if parsed.is_none() {
                warnings.push(TransformWarning::UnparseableDate(value));
            }
            parsed
        }
        _ => None,
    };

    let author = raw
        .text("author")
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| UNKNOWN_AUTHOR.to_string());

    let article = NewArticle {
        title: text_or_empty(raw, "title"),
        author,
        description: text_or_empty(raw, "description"),
        url: text_or_empty(raw, "url"),
        image_url: text_or_empty(raw, "image"),
        source: text_or_empty(raw, "source"),
        category: text_or_empty(raw, "category"),
        language: text_or_empty(raw, "language"),
        country: text_or_empty(raw, "country"),
        published_at,
    };

    Transformed { article, warnings }
}

fn text_or_empty(raw: &RawArticle, field: &str) -> String {
    raw.text(field).unwrap_or_default()
}

/// Parse an upstream timestamp down to its calendar date.
///
/// A trailing `Z` is read as `+00:00`. With an explicit offset the date is
/// the one in that offset, not converted to UTC. Accepts RFC 3339, the same
/// with a space separator or without seconds, offset-less timestamps and
/// bare `YYYY-MM-DD`.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use newsflow::feed::parse_published_date;
///
/// assert_eq!(
///     parse_published_date("2024-06-26T12:30:00.000000Z"),
///     NaiveDate::from_ymd_opt(2024, 6, 26)
/// );
/// assert_eq!(parse_published_date(""), None);
/// ```
pub fn parse_published_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized: Cow<'_, str> = match trimmed.strip_suffix(['Z', 'z']) {
        Some(rest) => Cow::Owned(format!("{rest}+00:00")),
        None => Cow::Borrowed(trimmed),
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.date_naive());
    }
    for format in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&normalized, format) {
            return Some(dt.date_naive());
        }
    }
    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d").ok()
}
