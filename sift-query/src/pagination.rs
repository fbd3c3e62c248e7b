//! Page validation and paginated results.
//!
//! Requests paginate by page number and page size. [`validate`] clamps the
//! page size into `[1, max_per_page]` and refuses page numbers above a fixed
//! ceiling. The ceiling applies to the page number itself, so a request
//! cannot force a huge `OFFSET` scan by pairing a large page with a tiny
//! page size or the other way round.
//!
//! ```rust
//! use sift_query::pagination::{PaginationLimits, validate};
//!
//! let limits = PaginationLimits::default();
//!
//! let window = validate(Some(3), Some(20), &limits).unwrap();
//! assert_eq!(window.limit, 20);
//! assert_eq!(window.offset, 40);
//! assert_eq!(window.to_sql(), "LIMIT 20 OFFSET 40");
//!
//! // Oversized page sizes are clamped, not rejected.
//! assert_eq!(validate(None, Some(5_000), &limits).unwrap().per_page, 100);
//!
//! // Pages beyond the ceiling are rejected.
//! assert!(validate(Some(10_001), Some(1), &limits).unwrap_err().is_invalid_pagination());
//! ```

use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, QueryResult};

/// Default page size.
pub const DEFAULT_PER_PAGE: u64 = 25;
/// Largest accepted page size.
pub const DEFAULT_MAX_PER_PAGE: u64 = 100;
/// Largest accepted page number.
pub const DEFAULT_MAX_PAGE: u64 = 10_000;

/// Page size and page-number limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PaginationLimits {
    /// Page size used when the request gives none.
    #[serde(default = "default_per_page")]
    pub default_per_page: u64,
    /// Upper clamp for the page size.
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u64,
    /// Page-number ceiling.
    #[serde(default = "default_max_page")]
    pub max_page: u64,
}

fn default_per_page() -> u64 {
    DEFAULT_PER_PAGE
}

fn default_max_per_page() -> u64 {
    DEFAULT_MAX_PER_PAGE
}

fn default_max_page() -> u64 {
    DEFAULT_MAX_PAGE
}

impl Default for PaginationLimits {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: DEFAULT_MAX_PER_PAGE,
            max_page: DEFAULT_MAX_PAGE,
        }
    }
}

/// A validated page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    /// 1-based page number.
    pub page: u64,
    /// Page size after clamping.
    pub per_page: u64,
    /// Rows to take.
    pub limit: u64,
    /// Rows to skip.
    pub offset: u64,
}

impl PageWindow {
    /// Generate the LIMIT/OFFSET clause.
    pub fn to_sql(&self) -> String {
        let mut sql = String::with_capacity(32);
        let _ = write!(sql, "LIMIT {}", self.limit);
        if self.offset > 0 {
            let _ = write!(sql, " OFFSET {}", self.offset);
        }
        sql
    }
}

/// Validate and clamp a requested page.
///
/// `page` defaults to 1 and must lie in `1..=max_page`. `per_page` defaults to
/// `default_per_page` and is clamped into `[1, max_per_page]`.
pub fn validate(
    page: Option<i64>,
    per_page: Option<i64>,
    limits: &PaginationLimits,
) -> QueryResult<PageWindow> {
    let page = page.unwrap_or(1);
    if page < 1 || page as u64 > limits.max_page {
        return Err(QueryError::page_out_of_range(page, limits.max_page));
    }
    let page = page as u64;

    let max_per_page = limits.max_per_page.max(1);
    let per_page = match per_page {
        Some(n) if n < 1 => 1,
        Some(n) => (n as u64).min(max_per_page),
        None => limits.default_per_page.clamp(1, max_per_page),
    };

    let offset = (page - 1)
        .checked_mul(per_page)
        .ok_or_else(|| QueryError::offset_overflow(page, per_page))?;

    Ok(PageWindow {
        page,
        per_page,
        limit: per_page,
        offset,
    })
}

/// Result of a paginated query with metadata.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    /// The records on this page.
    pub data: Vec<T>,
    /// The page that was loaded.
    pub page: u64,
    /// The page size.
    pub per_page: u64,
    /// Total matching records across all pages.
    pub total_count: u64,
}

impl<T> PaginatedResult<T> {
    /// Create a new paginated result.
    pub fn new(data: Vec<T>, window: &PageWindow, total_count: u64) -> Self {
        Self {
            data,
            page: window.page,
            per_page: window.per_page,
            total_count,
        }
    }

    /// Number of pages needed for `total_count` records.
    pub fn total_pages(&self) -> u64 {
        if self.per_page == 0 {
            return 0;
        }
        self.total_count.div_ceil(self.per_page)
    }

    /// Whether there are more records after these.
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages()
    }

    /// Whether there are records before these.
    pub fn has_previous(&self) -> bool {
        self.page > 1
    }

    /// Get the number of records in this result.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<T> IntoIterator for PaginatedResult<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.data.into_iter()
    }
}
