//! Lenient date and timestamp parsing
//!
//! Anything unparseable yields `None`; callers store that as null.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Naive formats tried in order, all interpreted as UTC
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.fZ",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
];

/// Parse a timestamp string
///
/// Accepts UTC `Z` timestamps with or without sub-second precision, RFC 3339
/// with an offset, and bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_timestamp_str(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Parse a timestamp from a JSON value; only strings are considered
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value.as_str().and_then(parse_timestamp_str)
}

/// Parse a calendar date; full timestamps are truncated to their UTC date
pub fn parse_date(value: &Value) -> Option<NaiveDate> {
    let input = value.as_str()?.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .or_else(|| parse_timestamp_str(input).map(|ts| ts.date_naive()))
}
