//! Pagination utilities for ddb-api

use serde::Deserialize;

/// Page size used when the configuration does not name one
pub const DEFAULT_PAGE_SIZE: i64 = 50;

/// `?page=N` query parameter (1-indexed)
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
}

fn default_page() -> i64 {
    1
}

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    /// Total number of pages
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    pub offset: i64,
    pub page_size: i64,
}

impl Pagination {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }
}

/// Calculate pagination metadata from total results and requested page
///
/// Ensures page is within valid bounds [1, total_pages]. A non-positive
/// `page_size` falls back to [`DEFAULT_PAGE_SIZE`].
///
/// # Examples
/// ```
/// use ddb_api::pagination::calculate_pagination;
///
/// // 120 total results at 50 per page = 3 pages (50 + 50 + 20)
/// let p = calculate_pagination(120, 2, 50);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 50);
///
/// // Requesting out-of-bounds page gets clamped
/// let p = calculate_pagination(120, 99, 50);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 100);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64, page_size: i64) -> Pagination {
    let page_size = if page_size > 0 { page_size } else { DEFAULT_PAGE_SIZE };
    let total_pages = (total_results + page_size - 1) / page_size;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * page_size;

    Pagination {
        page,
        total_pages,
        offset,
        page_size,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_normal() {
        let p = calculate_pagination(250, 2, 100);
        assert_eq!(p.page, 2);
        assert_eq!(p.total_pages, 3);
        assert_eq!(p.offset, 100);
        assert!(p.has_next());
        assert!(p.has_prev());
    }

    #[test]
    fn test_pagination_out_of_bounds_high() {
        let p = calculate_pagination(150, 99, 100);
        assert_eq!(p.page, 2); // Clamped to last page
        assert_eq!(p.offset, 100);
        assert!(!p.has_next());
    }

    #[test]
    fn test_pagination_out_of_bounds_low() {
        let p = calculate_pagination(150, -3, 100);
        assert_eq!(p.page, 1);
        assert_eq!(p.offset, 0);
        assert!(!p.has_prev());
    }

    #[test]
    fn test_pagination_empty() {
        let p = calculate_pagination(0, 4, 50);
        assert_eq!(p.page, 1);
        assert_eq!(p.total_pages, 0);
        assert_eq!(p.offset, 0);
    }

    #[test]
    fn test_pagination_exact_page_boundary() {
        let p = calculate_pagination(100, 2, 50);
        assert_eq!(p.total_pages, 2);
        assert_eq!(p.offset, 50);
    }

    #[test]
    fn test_invalid_page_size_uses_default() {
        let p = calculate_pagination(120, 1, 0);
        assert_eq!(p.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(p.total_pages, 3);
    }
}
