//! Data models for backend collections.
//!
//! This module provides the row representation, timestamp parsing, filter
//! definitions, screen definitions and configuration types.

mod config;
mod filter_state;
mod row;
mod screen;
mod timestamp;

pub use config::{ApiConfig, Config, DisplayConfig, MIN_REFRESH_INTERVAL_MS, RefreshConfig};
pub use filter_state::{Bounds, FilterKind, FilterParseError, FilterSpec, FilterState, FilterValue};
pub use row::{Record, Row};
pub use screen::{ColumnKind, ColumnSpec, ScreenConfig, TableSchema, builtin_screens};
pub use timestamp::{parse_date, parse_timestamp, timestamp_from_value};
