//! Token-based pagination.
//!
//! Page tokens are decimal page numbers, 1-origin. An empty or unparseable
//! token means the first page; an empty `next_page_token` in a response
//! means the last page.

use serde::{Deserialize, Serialize};

/// Pagination parameters carried on every list request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageRequest {
    /// Requested page size; zero or negative falls back to the operation's
    /// default (10 for lists, 20 for orders, 50 for movements).
    #[serde(default)]
    pub page_size: i32,

    /// Decimal page number, 1-origin. Empty means page 1.
    #[serde(default)]
    pub page_token: String,
}

impl PageRequest {
    /// The effective page size given the operation's default.
    pub fn size_or(&self, default: i32) -> i64 {
        if self.page_size > 0 {
            self.page_size as i64
        } else {
            default as i64
        }
    }

    /// The 1-origin page number encoded in the token.
    pub fn page_number(&self) -> i64 {
        match self.page_token.trim().parse::<i64>() {
            Ok(n) if n > 0 => n,
            _ => 1,
        }
    }

    /// Row offset for the effective page.
    pub fn offset(&self, default: i32) -> i64 {
        (self.page_number() - 1) * self.size_or(default)
    }
}

/// Pagination echo carried on every list response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    /// Token for the next page; empty when this is the last page.
    pub next_page_token: String,

    /// Total matching rows (or distinct groups) across all pages.
    pub total_count: i64,
}

impl Pagination {
    /// Builds the response-side pagination for a request that yielded
    /// `total` matching rows.
    pub fn for_page(request: &PageRequest, default_size: i32, total: i64) -> Self {
        let page = request.page_number();
        let size = request.size_or(default_size);
        let next_page_token = if page * size < total {
            (page + 1).to_string()
        } else {
            String::new()
        };
        Pagination {
            next_page_token,
            total_count: total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(size: i32, token: &str) -> PageRequest {
        PageRequest {
            page_size: size,
            page_token: token.to_string(),
        }
    }

    #[test]
    fn empty_token_is_first_page() {
        let r = req(10, "");
        assert_eq!(r.page_number(), 1);
        assert_eq!(r.offset(10), 0);
    }

    #[test]
    fn garbage_token_falls_back_to_first_page() {
        assert_eq!(req(10, "abc").page_number(), 1);
        assert_eq!(req(10, "-3").page_number(), 1);
        assert_eq!(req(10, "0").page_number(), 1);
    }

    #[test]
    fn offset_uses_default_size_when_unset() {
        let r = req(0, "3");
        assert_eq!(r.size_or(20), 20);
        assert_eq!(r.offset(20), 40);
    }

    #[test]
    fn next_token_empty_on_last_page() {
        let r = req(10, "2");
        let p = Pagination::for_page(&r, 10, 20);
        assert_eq!(p.next_page_token, "");
        assert_eq!(p.total_count, 20);

        let p = Pagination::for_page(&r, 10, 21);
        assert_eq!(p.next_page_token, "3");
    }
}
