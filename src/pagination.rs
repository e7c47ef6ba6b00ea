//! This modules defines the page arithmetic shared by views and page controls.

use std::ops::Range;

use serde::Serialize;

/// Where a page sits within a filtered result set.
///
/// Pages are numbered from 1. A page number of 0 is treated as page 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// The number of records across all pages.
    pub total_count: usize,
    /// The maximum number of records on a page.
    pub page_size: usize,
    /// The 1-based page number.
    pub current_page: usize,
}

impl PageInfo {
    /// Describe page `current_page` of `total_count` records split into pages
    /// of `page_size`.
    pub fn new(total_count: usize, page_size: usize, current_page: usize) -> Self {
        Self {
            total_count,
            page_size,
            current_page: current_page.max(1),
        }
    }

    /// The number of pages, or 0 if the page size is 0.
    pub fn total_pages(&self) -> usize {
        if self.page_size == 0 {
            return 0;
        }

        self.total_count.div_ceil(self.page_size)
    }

    /// Whether there is a page before this one.
    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    /// Whether there is a page after this one.
    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages()
    }

    /// The positions of this page's records in the full result set.
    ///
    /// Empty if the page is past the last page or the page size is 0.
    pub(crate) fn bounds(&self) -> Range<usize> {
        let start = (self.current_page - 1)
            .saturating_mul(self.page_size)
            .min(self.total_count);
        let end = start.saturating_add(self.page_size).min(self.total_count);

        start..end
    }

    /// The 1-based position of the first record on this page, or 0 if the
    /// page is empty.
    pub fn start_index(&self) -> usize {
        let bounds = self.bounds();
        if bounds.is_empty() { 0 } else { bounds.start + 1 }
    }

    /// The 1-based position of the last record on this page, or 0 if the page
    /// is empty.
    pub fn end_index(&self) -> usize {
        let bounds = self.bounds();
        if bounds.is_empty() { 0 } else { bounds.end }
    }

    /// A one-line description, e.g. "Showing 51-100 of 120 transactions (Page 2 of 3)".
    pub fn summary(&self) -> String {
        if self.total_count == 0 {
            return "No records found".to_owned();
        }

        format!(
            "Showing {}-{} of {} transactions (Page {} of {})",
            self.start_index(),
            self.end_index(),
            self.total_count,
            self.current_page,
            self.total_pages()
        )
    }
}
