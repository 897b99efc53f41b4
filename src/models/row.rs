//! Row records polled from backend collections.
//!
//! Collections are heterogeneous JSON documents (movements, vehicles,
//! subscriptions, audits...). Rows are kept as opaque JSON objects and read
//! through dotted field paths, so one table engine serves every screen.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::timestamp::timestamp_from_value;

/// Read access to a record's fields by dotted path (`estadiaActual.entrada`).
///
/// Implemented for [`Row`] and for references to any record, so the pure
/// table functions work on owned snapshots and on borrowed subsets alike.
pub trait Record {
    /// Raw JSON value at `path`, if present.
    fn value(&self, path: &str) -> Option<&Value>;

    /// Field as display text.
    ///
    /// Strings are returned as-is, numbers and booleans are stringified.
    /// Null, arrays and objects have no text form.
    fn text(&self, path: &str) -> Option<String> {
        match self.value(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Field parsed as a timestamp. Missing or unparseable values are `None`.
    fn timestamp(&self, path: &str) -> Option<NaiveDateTime> {
        self.value(path).and_then(timestamp_from_value)
    }

    /// Field as a number; numeric strings are accepted.
    fn number(&self, path: &str) -> Option<f64> {
        match self.value(path)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl<R: Record + ?Sized> Record for &R {
    fn value(&self, path: &str) -> Option<&Value> {
        (**self).value(path)
    }
}

/// One record of a polled collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row(Map<String, Value>);

impl Row {
    #[must_use]
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// Identifier read from `id_field`; numeric ids are stringified.
    #[must_use]
    pub fn id(&self, id_field: &str) -> Option<String> {
        self.text(id_field)
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for Row {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

impl Record for Row {
    fn value(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.0.get(first)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }
}
