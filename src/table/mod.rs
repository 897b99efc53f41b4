//! Live filtered tables.
//!
//! A [`LiveFilteredTable`] owns everything one view needs: the latest
//! snapshot, the user's filters and search text, the page position and the
//! load status. The visible rows are recomputed from that state on every read
//! (filter, then sort, then paginate); nothing derived is cached.
//!
//! Status moves `Idle -> Loading -> Ready` and stays `Ready` from then on.
//! A failed fetch only records the error; the last good snapshot stays visible.

mod filter;
mod paginate;
mod sort;

use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::{DateTime, Local};

pub use filter::{filter, row_matches_filters, row_matches_search, row_matches_value};
pub use paginate::{Page, PageState, paginate, total_pages};
pub use sort::sort_by_timestamp;

use crate::models::{FilterParseError, FilterState, FilterValue, Record, TableSchema};
use crate::poller::FetchError;

/// An immutable collection snapshot, shared between the poller and views.
pub type Snapshot<R> = Arc<[R]>;

/// Load status of a view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadStatus {
    /// Nothing requested yet
    #[default]
    Idle,
    /// First fetch in flight
    Loading,
    /// At least one snapshot has been applied
    Ready,
}

/// A fetch failure kept for non-blocking display.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedError {
    pub error: FetchError,
    pub at: DateTime<Local>,
}

/// One view's snapshot plus its filter, search and page state.
#[derive(Debug, Clone)]
pub struct LiveFilteredTable<R> {
    schema: TableSchema,
    snapshot: Snapshot<R>,
    status: LoadStatus,
    last_error: Option<RecordedError>,
    last_updated: Option<DateTime<Local>>,
    filters: FilterState,
    search: String,
    page: PageState,
}

impl<R: Record> LiveFilteredTable<R> {
    pub fn new(schema: TableSchema, page_size: NonZeroUsize) -> Self {
        Self {
            schema,
            snapshot: Arc::from(Vec::new()),
            status: LoadStatus::Idle,
            last_error: None,
            last_updated: None,
            filters: FilterState::new(),
            search: String::new(),
            page: PageState::new(page_size),
        }
    }

    #[must_use]
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.status
    }

    #[must_use]
    pub fn snapshot(&self) -> &Snapshot<R> {
        &self.snapshot
    }

    #[must_use]
    pub fn last_error(&self) -> Option<&RecordedError> {
        self.last_error.as_ref()
    }

    #[must_use]
    pub fn last_updated(&self) -> Option<DateTime<Local>> {
        self.last_updated
    }

    #[must_use]
    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    #[must_use]
    pub fn search(&self) -> &str {
        &self.search
    }

    #[must_use]
    pub fn page_state(&self) -> PageState {
        self.page
    }

    /// Mark the first fetch as in flight. No-op once data has arrived.
    pub fn begin_loading(&mut self) {
        if self.status == LoadStatus::Idle {
            self.status = LoadStatus::Loading;
        }
    }

    /// Replace the snapshot wholesale and clear any recorded error.
    pub fn apply_snapshot(&mut self, snapshot: impl Into<Snapshot<R>>) {
        self.snapshot = snapshot.into();
        self.status = LoadStatus::Ready;
        self.last_error = None;
        self.last_updated = Some(Local::now());
        self.clamp_page();
    }

    /// Record a failed fetch; the current snapshot stays as it is.
    pub fn record_error(&mut self, error: FetchError) {
        self.last_error = Some(RecordedError {
            error,
            at: Local::now(),
        });
    }

    /// Set one filter from raw input, resetting to page 1.
    ///
    /// # Errors
    /// Unknown keys and values that do not parse for the key's kind.
    pub fn set_filter(&mut self, key: &str, raw: &str) -> Result<(), TableError> {
        let spec = self
            .schema
            .filter_spec(key)
            .ok_or_else(|| TableError::UnknownFilter {
                key: key.to_string(),
                known: self.schema.filters.iter().map(|f| f.key.clone()).collect(),
            })?;
        let value = spec.parse_value(raw)?;
        let key = spec.key.clone();
        self.set_filter_value(&key, value);
        Ok(())
    }

    /// Set an already-typed filter value, resetting to page 1.
    pub fn set_filter_value(&mut self, key: &str, value: Option<FilterValue>) {
        self.filters.set(key, value);
        self.page.reset();
    }

    pub fn clear_filter(&mut self, key: &str) {
        self.set_filter_value(key, None);
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
        self.page.reset();
    }

    /// Set the free-text search, resetting to page 1.
    pub fn set_search(&mut self, search: &str) {
        self.search = search.to_string();
        self.page.reset();
    }

    pub fn set_page(&mut self, page_number: usize) {
        let len = self.visible_len();
        self.page.set(page_number, len);
    }

    pub fn next_page(&mut self) {
        let len = self.visible_len();
        self.page.next(len);
    }

    pub fn prev_page(&mut self) {
        let len = self.visible_len();
        self.page.prev(len);
    }

    /// Filtered and sorted rows.
    #[must_use]
    pub fn visible(&self) -> Vec<&R> {
        let all: Vec<&R> = self.snapshot.iter().collect();
        let filtered = filter(&all, &self.schema, &self.filters, &self.search);
        sort_by_timestamp(&filtered, &self.schema.timestamp_field)
    }

    /// The current page of visible rows.
    #[must_use]
    pub fn page(&self) -> Page<&R> {
        let visible = self.visible();
        paginate(&visible, self.page.page_size(), self.page.page_number())
    }

    fn visible_len(&self) -> usize {
        let needle = self.search.trim().to_lowercase();
        self.snapshot
            .iter()
            .filter(|row| {
                row_matches_search(*row, &self.schema, &needle)
                    && row_matches_filters(*row, &self.schema, &self.filters)
            })
            .count()
    }

    fn clamp_page(&mut self) {
        let len = self.visible_len();
        self.page.clamp(len);
    }
}

/// Errors from driving a table with user input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TableError {
    #[error("unknown filter '{key}' (available: {})", known.join(", "))]
    UnknownFilter { key: String, known: Vec<String> },

    #[error(transparent)]
    InvalidValue(#[from] FilterParseError),
}
