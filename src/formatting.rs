//! Shared formatting utilities for table cells and status lines
//!
//! String truncation, money and timestamp rendering, and compact durations
//! live here so the one-shot tables and the watch view print values the same
//! way.

use std::fmt::Write;
use std::time::Duration;

use chrono::NaiveDateTime;

/// Layout constants
pub mod layout {
    /// Table width before tabled wraps cells
    pub const TABLE_WIDTH: usize = 200;
    /// Placeholder for missing cell values
    pub const EMPTY_CELL: &str = "-";
}

/// Truncate a string to a maximum length (in characters), adding "..." at the end if truncated.
///
/// This function is Unicode-safe and counts characters, not bytes.
///
/// # Examples
/// ```
/// use parkmon::formatting::truncate_string;
/// assert_eq!(truncate_string("hello", 10), "hello");
/// assert_eq!(truncate_string("hello world", 8), "hello...");
/// assert_eq!(truncate_string("ab", 2), "ab");
/// ```
#[must_use]
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let char_count = s.chars().count();
    if char_count <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        // Edge case: if max_len is very small, just truncate without ellipsis
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format an amount of pesos with `.` thousands and `,` decimals.
///
/// Whole amounts drop the decimals.
///
/// # Examples
/// ```
/// use parkmon::formatting::format_money;
/// assert_eq!(format_money(1500.0), "$1.500");
/// assert_eq!(format_money(1234567.5), "$1.234.567,50");
/// assert_eq!(format_money(-80.0), "-$80");
/// ```
#[must_use]
pub fn format_money(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(c);
    }

    if fraction == 0 {
        format!("{}${}", sign, grouped)
    } else {
        format!("{}${},{:02}", sign, grouped, fraction)
    }
}

/// Fallback layout when a configured format cannot be rendered.
const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Format a timestamp with a chrono format string.
///
/// An invalid format falls back to `YYYY-MM-DD HH:MM` instead of panicking.
#[must_use]
pub fn format_timestamp(ts: &NaiveDateTime, format: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", ts.format(format)).is_ok() {
        return out;
    }
    ts.format(FALLBACK_DATE_FORMAT).to_string()
}

/// Format duration in verbose human-readable style (e.g., "2d 3h", "5h 30m").
///
/// Shows at most 2 time units for readability.
///
/// # Examples
/// ```
/// use parkmon::formatting::format_duration_human;
/// assert_eq!(format_duration_human(0), "0s");
/// assert_eq!(format_duration_human(45), "45s");
/// assert_eq!(format_duration_human(3660), "1h 1m");
/// ```
#[must_use]
pub fn format_duration_human(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }

    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if days > 0 {
        if hours > 0 {
            format!("{}d {}h", days, hours)
        } else {
            format!("{}d", days)
        }
    } else if hours > 0 {
        if minutes > 0 {
            format!("{}h {}m", hours, minutes)
        } else {
            format!("{}h", hours)
        }
    } else if minutes > 0 {
        if secs > 0 {
            format!("{}m {}s", minutes, secs)
        } else {
            format!("{}m", minutes)
        }
    } else {
        format!("{}s", secs)
    }
}

/// Format a poll interval; sub-second intervals are shown in milliseconds.
#[must_use]
pub fn format_interval(interval: Duration) -> String {
    if interval < Duration::from_secs(1) || interval.subsec_millis() != 0 {
        format!("{}ms", interval.as_millis())
    } else {
        format_duration_human(interval.as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("hello", 10), "hello");
        assert_eq!(truncate_string("hello world", 8), "hello...");
        assert_eq!(truncate_string("hello", 5), "hello");
        assert_eq!(truncate_string("hello", 3), "hel");
    }

    #[test]
    fn test_truncate_string_unicode() {
        // Accented names must not split inside a character
        assert_eq!(truncate_string("Muñoz Ibáñez", 8), "Muñoz...");
        assert_eq!(truncate_string("Ñandú", 10), "Ñandú");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "$0");
        assert_eq!(format_money(999.0), "$999");
        assert_eq!(format_money(1000.0), "$1.000");
        assert_eq!(format_money(2500.5), "$2.500,50");
        assert_eq!(format_money(1234567.0), "$1.234.567");
        assert_eq!(format_money(-1500.25), "-$1.500,25");
    }

    #[test]
    fn test_format_timestamp() {
        let ts = crate::models::parse_timestamp("2024-01-02T10:05").unwrap();
        assert_eq!(format_timestamp(&ts, "%d/%m/%Y %H:%M"), "02/01/2024 10:05");
    }

    #[test]
    fn test_format_timestamp_bad_format_falls_back() {
        let ts = crate::models::parse_timestamp("2024-01-02T10:05").unwrap();
        assert_eq!(format_timestamp(&ts, "%d/%m %Q"), "2024-01-02 10:05");
        assert_eq!(format_timestamp(&ts, "%H:%M %"), "2024-01-02 10:05");
    }

    #[test]
    fn test_format_duration_human() {
        assert_eq!(format_duration_human(65), "1m 5s");
        assert_eq!(format_duration_human(3600), "1h");
        assert_eq!(format_duration_human(86400), "1d");
        assert_eq!(format_duration_human(90000), "1d 1h");
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(format_interval(Duration::from_millis(5000)), "5s");
        assert_eq!(format_interval(Duration::from_millis(250)), "250ms");
        assert_eq!(format_interval(Duration::from_millis(1500)), "1500ms");
        assert_eq!(format_interval(Duration::from_secs(60)), "1m");
    }
}
