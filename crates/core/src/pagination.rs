use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Raw `page` / `limit` query parameters as sent by clients.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Server-side bounds applied to every list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageLimits {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PageLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// A validated, 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub limit: u32,
}

impl Page {
    /// Resolve a request against the limits. Oversized limits are clamped,
    /// a zero page or limit is rejected.
    pub fn resolve(request: PageRequest, limits: PageLimits) -> CoreResult<Self> {
        let page = request.page.unwrap_or(1);
        if page == 0 {
            return Err(CoreError::validation("page must be at least 1"));
        }
        let limit = request.limit.unwrap_or(limits.default_limit);
        if limit == 0 {
            return Err(CoreError::validation("limit must be at least 1"));
        }
        Ok(Self {
            page,
            limit: limit.min(limits.max_limit),
        })
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }

    /// Cut an already ordered collection down to this window.
    pub fn slice<T>(&self, items: Vec<T>) -> Paginated<T> {
        let total = items.len() as u64;
        let items = items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .collect();
        Paginated {
            items,
            page: self.page,
            limit: self.limit,
            total,
        }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub limit: u32,
    pub total: u64,
}

impl<T> Paginated<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Paginated<U> {
        Paginated {
            items: self.items.into_iter().map(f).collect(),
            page: self.page,
            limit: self.limit,
            total: self.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_limit_to_server_max() {
        let page = Page::resolve(
            PageRequest {
                page: Some(2),
                limit: Some(500),
            },
            PageLimits::default(),
        )
        .unwrap();
        assert_eq!(page.limit, 100);
        assert_eq!(page.offset(), 100);
    }

    #[test]
    fn rejects_page_zero() {
        let err = Page::resolve(
            PageRequest {
                page: Some(0),
                limit: None,
            },
            PageLimits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[test]
    fn slice_reports_total() {
        let page = Page { page: 2, limit: 2 };
        let paged = page.slice(vec![1, 2, 3, 4, 5]);
        assert_eq!(paged.items, vec![3, 4]);
        assert_eq!(paged.total, 5);
    }
}
