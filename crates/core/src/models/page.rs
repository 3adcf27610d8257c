//! Pagination types shared by all list operations

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 50;

/// Normalized page request: `page >= 1`, `limit` in `[1, 50]`.
/// Only [`PageRequest::new`] builds one, so the bounds always hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    pub fn describe(&self, total: u64) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
            total,
            pages: total.div_ceil(u64::from(self.limit.max(1))),
        }
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub pages: u64,
}

/// One page of results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: Pagination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let req = PageRequest::default();
        assert_eq!(req.page(), 1);
        assert_eq!(req.limit(), 10);
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn test_clamping() {
        let floor = PageRequest::new(Some(0), Some(0));
        assert_eq!((floor.page(), floor.limit()), (1, 1));
        assert_eq!(floor.offset(), 0);
        assert_eq!(floor.describe(3).pages, 3);
        assert_eq!(PageRequest::new(Some(3), Some(500)).limit(), 50);
        assert_eq!(PageRequest::new(Some(3), Some(20)).offset(), 40);
    }

    #[test]
    fn test_page_count_rounds_up() {
        let req = PageRequest::new(Some(1), Some(10));
        assert_eq!(req.describe(0).pages, 0);
        assert_eq!(req.describe(10).pages, 1);
        assert_eq!(req.describe(11).pages, 2);
    }

    #[test]
    fn test_zeroed_request_is_safe() {
        let req = PageRequest { page: 0, limit: 0 };
        assert_eq!(req.offset(), 0);
        assert_eq!(req.describe(7).pages, 7);
    }
}
