//! Filter definitions and the per-view filter state.
//!
//! A screen declares which filter keys it supports ([`FilterSpec`]) and the
//! user fills in values for some of them ([`FilterState`]). Values are parsed
//! against the filter's [`FilterKind`] when they are set, so evaluation never has
//! to deal with malformed input.

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::timestamp::parse_date;

/// How a filter key constrains rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Case-insensitive substring match on one field
    Text,
    /// Case-insensitive exact match (select boxes: vehicle type, payment method...)
    Enum,
    /// Hour of day of a timestamp field, `[from, to)`
    Hour,
    /// Calendar date of a timestamp field, `[from, to)`
    Date,
    /// Numeric field, `[from, to)`
    Number,
}

impl FilterKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FilterKind::Text => "text",
            FilterKind::Enum => "enum",
            FilterKind::Hour => "hour",
            FilterKind::Date => "date",
            FilterKind::Number => "number",
        }
    }

    #[must_use]
    pub fn is_range(self) -> bool {
        matches!(self, FilterKind::Hour | FilterKind::Date | FilterKind::Number)
    }
}

/// A filter key a screen supports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSpec {
    /// Name used on the command line (`--filter tipo=auto`)
    pub key: String,
    /// Dotted field path evaluated on each row
    pub field: String,
    pub kind: FilterKind,
}

impl FilterSpec {
    pub fn new(key: &str, field: &str, kind: FilterKind) -> Self {
        Self {
            key: key.to_string(),
            field: field.to_string(),
            kind,
        }
    }

    /// Parse raw user input into a typed value for this key.
    ///
    /// Ranges are written `from..to`; either side may be empty. Returns
    /// `Ok(None)` for input that carries no constraint (empty string, `..`).
    pub fn parse_value(&self, raw: &str) -> Result<Option<FilterValue>, FilterParseError> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Ok(None);
        }

        let value = match self.kind {
            FilterKind::Text => FilterValue::Text(raw.to_string()),
            FilterKind::Enum => FilterValue::Tag(raw.to_string()),
            FilterKind::Hour => FilterValue::Hours(self.parse_bounds(raw, parse_hour)?),
            FilterKind::Date => FilterValue::Dates(self.parse_bounds(raw, parse_date)?),
            FilterKind::Number => {
                FilterValue::Numbers(self.parse_bounds(raw, |s| s.parse::<f64>().ok())?)
            }
        };

        Ok(value.is_active().then_some(value))
    }

    fn parse_bounds<T>(
        &self,
        raw: &str,
        parse: impl Fn(&str) -> Option<T>,
    ) -> Result<Bounds<T>, FilterParseError> {
        let (from, to) = raw.split_once("..").unwrap_or((raw, ""));
        let bound = |part: &str| -> Result<Option<T>, FilterParseError> {
            let part = part.trim();
            if part.is_empty() {
                return Ok(None);
            }
            parse(part).map(Some).ok_or_else(|| FilterParseError {
                key: self.key.clone(),
                kind: self.kind,
                input: part.to_string(),
            })
        };
        Ok(Bounds {
            from: bound(from)?,
            to: bound(to)?,
        })
    }
}

fn parse_hour(raw: &str) -> Option<u32> {
    // Accept "7", "07" and "07:00"
    let hour = raw.split(':').next()?;
    hour.parse::<u32>().ok().filter(|h| *h <= 24)
}

/// Error for filter input that does not fit the key's kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {} value '{input}' for filter '{key}'", kind.as_str())]
pub struct FilterParseError {
    pub key: String,
    pub kind: FilterKind,
    pub input: String,
}

/// Half-open interval `[from, to)`; a missing side is unbounded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds<T> {
    pub from: Option<T>,
    pub to: Option<T>,
}

impl<T: PartialOrd> Bounds<T> {
    #[must_use]
    pub fn contains(&self, value: &T) -> bool {
        self.from.as_ref().is_none_or(|from| value >= from)
            && self.to.as_ref().is_none_or(|to| value < to)
    }

    #[must_use]
    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }
}

impl Bounds<u32> {
    /// Hour membership; `from > to` wraps past midnight (`22..6`).
    #[must_use]
    pub fn contains_hour(&self, hour: u32) -> bool {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => hour >= from || hour < to,
            _ => self.contains(&hour),
        }
    }
}

impl<T: fmt::Display> fmt::Display for Bounds<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(from) = &self.from {
            write!(f, "{}", from)?;
        }
        f.write_str("..")?;
        if let Some(to) = &self.to {
            write!(f, "{}", to)?;
        }
        Ok(())
    }
}

/// A parsed filter value.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    Text(String),
    Tag(String),
    Hours(Bounds<u32>),
    Dates(Bounds<NaiveDate>),
    Numbers(Bounds<f64>),
}

impl FilterValue {
    /// Whether this value constrains anything at all.
    #[must_use]
    pub fn is_active(&self) -> bool {
        match self {
            FilterValue::Text(s) | FilterValue::Tag(s) => !s.trim().is_empty(),
            FilterValue::Hours(b) => !b.is_unbounded(),
            FilterValue::Dates(b) => !b.is_unbounded(),
            FilterValue::Numbers(b) => !b.is_unbounded(),
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Text(s) | FilterValue::Tag(s) => f.write_str(s),
            FilterValue::Hours(b) => b.fmt(f),
            FilterValue::Dates(b) => b.fmt(f),
            FilterValue::Numbers(b) => b.fmt(f),
        }
    }
}

/// Current filter values for one view, keyed by filter key.
///
/// Absent keys and inactive values impose no constraint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    values: BTreeMap<String, FilterValue>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear a key. Inactive values are stored as "cleared".
    pub fn set(&mut self, key: &str, value: Option<FilterValue>) {
        match value.filter(FilterValue::is_active) {
            Some(value) => {
                self.values.insert(key.to_string(), value);
            }
            None => {
                self.values.remove(key);
            }
        }
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&FilterValue> {
        self.values.get(key)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Active constraints in key order.
    pub fn active(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
