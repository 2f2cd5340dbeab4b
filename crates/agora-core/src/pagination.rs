//! # Pagination
//!
//! 1-indexed page requests and the pages they produce. Every listing in the
//! engine (feeds, relations, follow requests) is cut through `Page::slice`.

use crate::AgoraError;
use crate::primitives::{DEFAULT_PAGE, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use serde::{Deserialize, Serialize};

/// A validated page request: `page >= 1`, `1 <= limit <= MAX_PAGE_LIMIT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// Validate a page request.
    pub fn new(page: u32, limit: u32) -> Result<Self, AgoraError> {
        if page == 0 {
            return Err(AgoraError::InvalidInput(
                "Page numbers start at 1".to_string(),
            ));
        }
        if limit == 0 || limit > MAX_PAGE_LIMIT {
            return Err(AgoraError::InvalidInput(format!(
                "Page limit must be between 1 and {}",
                MAX_PAGE_LIMIT
            )));
        }
        Ok(Self { page, limit })
    }

    /// Build a request from optional parts, filling in the defaults.
    pub fn from_parts(page: Option<u32>, limit: Option<u32>) -> Result<Self, AgoraError> {
        Self::new(
            page.unwrap_or(DEFAULT_PAGE),
            limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        )
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn limit(&self) -> u32 {
        self.limit
    }

    /// Number of items that precede this page.
    #[must_use]
    pub fn offset(&self) -> usize {
        (self.page.saturating_sub(1) as usize).saturating_mul(self.limit as usize)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

/// One page of an ordered result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Size of the whole result set.
    pub total: usize,
    pub total_pages: usize,
    pub page: u32,
    pub limit: u32,
}

impl<T> Page<T> {
    /// Cut the requested page out of an already ordered result set.
    ///
    /// Pages past the end are empty but still report the totals.
    #[must_use]
    pub fn slice(ordered: Vec<T>, request: PageRequest) -> Self {
        let total = ordered.len();
        let limit = request.limit as usize;
        let items = ordered
            .into_iter()
            .skip(request.offset())
            .take(limit)
            .collect();
        Self {
            items,
            total,
            total_pages: total.div_ceil(limit),
            page: request.page,
            limit: request.limit,
        }
    }

    /// Transform the items, keeping the page metadata.
    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            total_pages: self.total_pages,
            page: self.page,
            limit: self.limit,
        }
    }
}
