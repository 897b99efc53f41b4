//! Most-recent-first ordering by a timestamp field.

use std::cmp::Ordering;

use chrono::NaiveDateTime;

use crate::models::Record;

/// Sort rows by `timestamp_field`, newest first.
///
/// The sort is stable: equal timestamps keep their input order. Rows whose
/// timestamp is missing or unparseable go after every dated row, also in
/// input order. The input is left untouched.
pub fn sort_by_timestamp<T: Record + Clone>(rows: &[T], timestamp_field: &str) -> Vec<T> {
    // Parse each timestamp once instead of on every comparison
    let mut keyed: Vec<(Option<NaiveDateTime>, &T)> = rows
        .iter()
        .map(|row| (row.timestamp(timestamp_field), row))
        .collect();

    keyed.sort_by(|(a, _), (b, _)| compare_desc(a.as_ref(), b.as_ref()));

    keyed.into_iter().map(|(_, row)| row.clone()).collect()
}

/// Descending order with `None` last.
fn compare_desc(a: Option<&NaiveDateTime>, b: Option<&NaiveDateTime>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.cmp(a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
