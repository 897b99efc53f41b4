//! Timestamp parsing for backend row fields.
//!
//! The backend is not consistent about date encoding: documents carry RFC 3339
//! strings with a `Z` suffix, form-submitted values arrive as naive
//! `YYYY-MM-DDTHH:MM`, closing records store plain dates, and a few legacy
//! fields are epoch milliseconds. Everything is normalized to a UTC
//! `NaiveDateTime` so rows from one collection compare on a single axis.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

/// Naive layouts tried in order after RFC 3339.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parse a timestamp string in any of the accepted layouts.
///
/// Offsets are folded into UTC. A bare `Z` on a value that is not full
/// RFC 3339 (for example `2024-01-02T10:00Z`) is accepted as UTC as well.
/// Returns `None` for empty or unrecognized input.
///
/// # Examples
/// ```
/// use parkmon::models::parse_timestamp;
/// assert!(parse_timestamp("2024-01-02T10:00").is_some());
/// assert!(parse_timestamp("2024-01-02").is_some());
/// assert!(parse_timestamp("yesterday").is_none());
/// ```
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    parse_datetime(raw).or_else(|| {
        let naive = raw.strip_suffix('Z').unwrap_or(raw);
        NaiveDate::parse_from_str(naive, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
    })
}

/// Parse a calendar date (`YYYY-MM-DD`), also accepting a full timestamp
/// and keeping only its date part.
#[must_use]
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    parse_datetime(raw).map(|dt| dt.date())
}

/// RFC 3339 and the naive layouts; no date-only fallback.
fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }

    let naive = raw.strip_suffix('Z').unwrap_or(raw);
    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(naive, format).ok())
}

/// Read a timestamp out of a JSON value.
///
/// Strings go through [`parse_timestamp`]; integers are epoch milliseconds.
/// Anything else (null, bool, object) has no timestamp.
#[must_use]
pub fn timestamp_from_value(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_timestamp(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}
