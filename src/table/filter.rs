//! Row filtering for live tables
//!
//! This module computes the visible subset of a snapshot:
//! - Free-text search: case-insensitive substring over the screen's search fields
//! - Per-key filters from [`FilterState`] (text, enum, hour/date/number ranges)
//! - All active constraints combined with AND logic
//!
//! Filtering is pure and never reorders rows.

use chrono::Timelike;

use crate::models::{FilterState, FilterValue, Record, TableSchema};

/// Keep the rows matching `search` and every active filter, in input order.
pub fn filter<T: Record + Clone>(
    rows: &[T],
    schema: &TableSchema,
    state: &FilterState,
    search: &str,
) -> Vec<T> {
    let needle = search.trim().to_lowercase();
    rows.iter()
        .filter(|row| row_matches_search(*row, schema, &needle) && row_matches_filters(*row, schema, state))
        .cloned()
        .collect()
}

/// Check if a row matches an already lowercased search term.
///
/// An empty term matches everything. A missing field reads as the empty
/// string, so it never matches a non-empty term.
pub fn row_matches_search<R: Record>(row: &R, schema: &TableSchema, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    schema.search_fields.iter().any(|field| {
        row.text(field)
            .unwrap_or_default()
            .to_lowercase()
            .contains(needle)
    })
}

/// Check a row against every active filter (AND).
///
/// Keys without a matching spec in the schema are read as field paths.
pub fn row_matches_filters<R: Record>(row: &R, schema: &TableSchema, state: &FilterState) -> bool {
    state.active().all(|(key, value)| {
        let field = schema
            .filter_spec(key)
            .map_or(key, |spec| spec.field.as_str());
        row_matches_value(row, field, value)
    })
}

/// Match one field against one filter value.
///
/// A row without the field (or with a value of the wrong shape) does not match.
pub fn row_matches_value<R: Record>(row: &R, field: &str, value: &FilterValue) -> bool {
    if !value.is_active() {
        return true;
    }

    match value {
        FilterValue::Text(term) => row
            .text(field)
            .is_some_and(|text| text.to_lowercase().contains(&term.trim().to_lowercase())),
        FilterValue::Tag(tag) => row
            .text(field)
            .is_some_and(|text| text.trim().to_lowercase() == tag.trim().to_lowercase()),
        FilterValue::Hours(bounds) => row
            .timestamp(field)
            .is_some_and(|ts| bounds.contains_hour(ts.hour())),
        FilterValue::Dates(bounds) => row
            .timestamp(field)
            .is_some_and(|ts| bounds.contains(&ts.date())),
        FilterValue::Numbers(bounds) => row
            .number(field)
            .is_some_and(|n| bounds.contains(&n)),
    }
}
