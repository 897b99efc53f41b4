//! Fixed-size pagination.

use std::num::NonZeroUsize;

/// Number of pages for `len` rows; never less than 1.
#[must_use]
pub fn total_pages(len: usize, page_size: NonZeroUsize) -> usize {
    len.div_ceil(page_size.get()).max(1)
}

/// One page of rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_number: usize,
    pub page_size: NonZeroUsize,
    pub total_pages: usize,
    /// Row count before slicing
    pub total_rows: usize,
}

impl<T> Page<T> {
    /// Items padded with `None` up to `page_size`, for fixed-height rendering.
    pub fn padded(&self) -> impl Iterator<Item = Option<&T>> {
        let blanks = self.page_size.get().saturating_sub(self.items.len());
        self.items
            .iter()
            .map(Some)
            .chain(std::iter::repeat_n(None, blanks))
    }

    #[must_use]
    pub fn has_next(&self) -> bool {
        self.page_number < self.total_pages
    }

    #[must_use]
    pub fn has_prev(&self) -> bool {
        self.page_number > 1
    }
}

/// Slice out page `page_number` (1-based).
///
/// Pages past the end come back empty; clamping the page number is up to the
/// caller. Page 0 is read as page 1.
pub fn paginate<T: Clone>(rows: &[T], page_size: NonZeroUsize, page_number: usize) -> Page<T> {
    let page_number = page_number.max(1);
    let size = page_size.get();
    let start = (page_number - 1).saturating_mul(size);
    let items = rows
        .get(start..)
        .map(|rest| rest.iter().take(size).cloned().collect())
        .unwrap_or_default();

    Page {
        items,
        page_number,
        page_size,
        total_pages: total_pages(rows.len(), page_size),
        total_rows: rows.len(),
    }
}

/// Page size and current page for one view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageState {
    page_size: NonZeroUsize,
    page_number: usize,
}

impl PageState {
    #[must_use]
    pub fn new(page_size: NonZeroUsize) -> Self {
        Self {
            page_size,
            page_number: 1,
        }
    }

    #[must_use]
    pub fn page_size(&self) -> NonZeroUsize {
        self.page_size
    }

    #[must_use]
    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn reset(&mut self) {
        self.page_number = 1;
    }

    /// Jump to a page, clamped to `[1, total_pages(len)]`.
    pub fn set(&mut self, page_number: usize, len: usize) {
        self.page_number = page_number;
        self.clamp(len);
    }

    /// Pull the page number back into range after the row count changed.
    pub fn clamp(&mut self, len: usize) {
        self.page_number = self.page_number.clamp(1, total_pages(len, self.page_size));
    }

    pub fn next(&mut self, len: usize) {
        self.set(self.page_number.saturating_add(1), len);
    }

    pub fn prev(&mut self, len: usize) {
        self.set(self.page_number.saturating_sub(1), len);
    }
}
