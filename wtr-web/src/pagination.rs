//! Pagination for admin list endpoints (100 rows/page)

use serde::Serialize;

/// Page size constant for all pagination
pub const PAGE_SIZE: i64 = 100;

/// Pagination metadata calculated from total results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    /// Current page number (1-indexed)
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
    /// Offset for SQL LIMIT/OFFSET query
    #[serde(skip)]
    pub offset: i64,
}

/// Clamp `requested_page` into `[1, total_pages]` and derive the offset
///
/// # Examples
/// ```
/// use wtr_web::pagination::calculate_pagination;
///
/// // 250 total results = 3 pages (100 + 100 + 50)
/// let p = calculate_pagination(250, 2);
/// assert_eq!(p.page, 2);
/// assert_eq!(p.total_pages, 3);
/// assert_eq!(p.offset, 100);
///
/// // Out-of-bounds pages are clamped
/// let p = calculate_pagination(250, 99);
/// assert_eq!(p.page, 3);
/// assert_eq!(p.offset, 200);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64) -> Pagination {
    let total_pages = (total_results + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = requested_page.max(1).min(total_pages.max(1));
    let offset = (page - 1) * PAGE_SIZE;

    Pagination {
        page,
        page_size: PAGE_SIZE,
        total: total_results,
        total_pages,
        offset,
    }
}

/// One page of rows plus its metadata
#[derive(Debug, Serialize)]
pub struct Page<T> {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(pagination: Pagination, items: Vec<T>) -> Self {
        Self { pagination, items }
    }
}
