//! Skip/limit pagination with a total-count sidecar.

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const MAX_LIMIT: u64 = 100;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum PaginationError {
    #[error("page must be greater than 0")]
    InvalidPage,
    #[error("limit must be between 1 and {MAX_LIMIT}")]
    InvalidLimit,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    Asc,
    #[default]
    Desc,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl PageRequest {
    /// Builds a request from optional query values, applying the defaults.
    pub fn new(page: Option<u64>, limit: Option<u64>) -> Result<Self, PaginationError> {
        let page = page.unwrap_or(DEFAULT_PAGE);
        let limit = limit.unwrap_or(DEFAULT_LIMIT);

        if page == 0 {
            return Err(PaginationError::InvalidPage);
        }
        if limit == 0 || limit > MAX_LIMIT {
            return Err(PaginationError::InvalidLimit);
        }

        Ok(PageRequest { page, limit })
    }

    pub fn skip(&self) -> usize {
        ((self.page - 1) * self.limit) as usize
    }

    pub fn limit(&self) -> usize {
        self.limit as usize
    }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct PageInfo {
    pub current_page: u64,
    pub records_per_page: u64,
    pub total_records: u64,
    pub total_pages: u64,
}

impl PageInfo {
    pub fn new(total_records: u64, request: PageRequest) -> Self {
        PageInfo {
            current_page: request.page,
            records_per_page: request.limit,
            total_records,
            total_pages: total_records.div_ceil(request.limit),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> Page<T> {
    /// Slices an already filtered and sorted result set.
    pub fn from_sorted(items: Vec<T>, request: PageRequest) -> Self {
        let total = items.len() as u64;
        let data = items
            .into_iter()
            .skip(request.skip())
            .take(request.limit())
            .collect();

        Page {
            data,
            pagination: PageInfo::new(total, request),
        }
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_defaults() {
        let request = PageRequest::new(None, None).unwrap();
        assert_eq!(request, PageRequest { page: 1, limit: 10 });
        assert_eq!(request.skip(), 0);

        assert_eq!(PageRequest::new(Some(0), None), Err(PaginationError::InvalidPage));
        assert_eq!(PageRequest::new(None, Some(0)), Err(PaginationError::InvalidLimit));
        assert_eq!(PageRequest::new(None, Some(101)), Err(PaginationError::InvalidLimit));
    }

    #[test]
    fn test_from_sorted() {
        let request = PageRequest::new(Some(2), Some(3)).unwrap();
        let page = Page::from_sorted((0..8).collect::<Vec<u32>>(), request);

        assert_eq!(page.data, vec![3, 4, 5]);
        assert_eq!(
            page.pagination,
            PageInfo {
                current_page: 2,
                records_per_page: 3,
                total_records: 8,
                total_pages: 3,
            }
        );

        // Past the end
        let request = PageRequest::new(Some(4), Some(3)).unwrap();
        let page = Page::from_sorted((0..8).collect::<Vec<u32>>(), request);
        assert!(page.data.is_empty());
        assert_eq!(page.pagination.total_pages, 3);
    }

    #[test]
    fn test_order_deserialize() {
        let order: Order = serde_json::from_str("\"asc\"").unwrap();
        assert_eq!(order, Order::Asc);
        assert_eq!(Order::default(), Order::Desc);
    }
}
