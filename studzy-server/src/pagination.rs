//! Page arithmetic for the course catalogue

use serde::Serialize;

/// Courses per catalogue page
pub const PAGE_SIZE: i64 = 20;

/// Page metadata returned next to a listing; `offset` feeds the SQL query
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pagination {
    pub page: i64,
    pub total_pages: i64,
    pub has_next: bool,
    #[serde(skip)]
    pub offset: i64,
}

/// Clamp the requested page into `[1, total_pages]` and derive the offset
///
/// ```
/// use studzy_server::pagination::calculate_pagination;
///
/// // 45 courses: 20 + 20 + 5
/// let p = calculate_pagination(45, 2);
/// assert_eq!((p.page, p.total_pages, p.offset), (2, 3, 20));
/// assert!(p.has_next);
///
/// let p = calculate_pagination(45, 99);
/// assert_eq!((p.page, p.offset), (3, 40));
/// assert!(!p.has_next);
/// ```
pub fn calculate_pagination(total_results: i64, requested_page: i64) -> Pagination {
    let total_pages = (total_results.max(0) + PAGE_SIZE - 1) / PAGE_SIZE;
    let page = requested_page.clamp(1, total_pages.max(1));

    Pagination {
        page,
        total_pages,
        has_next: page < total_pages,
        offset: (page - 1) * PAGE_SIZE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_page_of_catalogue() {
        let p = calculate_pagination(21, 1);
        assert_eq!((p.page, p.total_pages, p.offset), (1, 2, 0));
        assert!(p.has_next);
    }

    #[test]
    fn test_non_positive_page_becomes_first() {
        assert_eq!(calculate_pagination(30, 0).page, 1);
        assert_eq!(calculate_pagination(30, -4).page, 1);
    }

    #[test]
    fn test_empty_catalogue() {
        let p = calculate_pagination(0, 3);
        assert_eq!((p.page, p.total_pages, p.offset), (1, 0, 0));
        assert!(!p.has_next);
    }

    #[test]
    fn test_full_last_page() {
        let p = calculate_pagination(40, 2);
        assert_eq!((p.page, p.total_pages, p.offset), (2, 2, 20));
        assert!(!p.has_next);
    }
}
