//! Page-based pagination shared by all list tools.

use serde::{Deserialize, Serialize};

use super::{Error, Result};

pub const DEFAULT_PAGE: u32 = 1;
pub const DEFAULT_PER_PAGE: u32 = 20;
pub const MAX_PER_PAGE: u32 = 100;

/// Requested page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationRequest {
    pub page: u32,
    pub per_page: u32,
}

impl Default for PaginationRequest {
    fn default() -> Self {
        Self {
            page: DEFAULT_PAGE,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

impl PaginationRequest {
    /// Build a request, rejecting `page < 1` and `per_page` outside `1..=100`.
    pub fn new(page: u32, per_page: u32) -> Result<Self> {
        if page < 1 {
            return Err(Error::validation(format!("page must be >= 1, got {}", page)));
        }
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(Error::validation(format!(
                "per_page must be between 1 and {}, got {}",
                MAX_PER_PAGE, per_page
            )));
        }
        Ok(Self { page, per_page })
    }

    /// Query parameters in the form GitLab expects.
    pub fn to_query(self) -> [(&'static str, String); 2] {
        [
            ("page", self.page.to_string()),
            ("per_page", self.per_page.to_string()),
        ]
    }
}

/// Page position within a result set of known size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationResponse {
    pub page: u32,
    pub per_page: u32,
    pub total_count: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl PaginationResponse {
    pub fn new(request: PaginationRequest, total_count: u64) -> Self {
        let page = u64::from(request.page);
        let per_page = u64::from(request.per_page);
        Self {
            page: request.page,
            per_page: request.per_page,
            total_count,
            total_pages: total_count.div_ceil(per_page),
            has_next: page * per_page < total_count,
            has_previous: page > 1,
        }
    }

    /// Rebuild from GitLab's `X-Page`, `X-Per-Page` and `X-Total` headers.
    ///
    /// GitLab omits `X-Total` for very large collections; no pagination is
    /// reported in that case.
    pub fn from_headers(headers: &reqwest::header::HeaderMap) -> Option<Self> {
        let number = |name: &str| -> Option<u64> {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
        };

        let total = number("x-total")?;
        let page = number("x-page").unwrap_or(u64::from(DEFAULT_PAGE));
        let per_page = number("x-per-page").unwrap_or(u64::from(DEFAULT_PER_PAGE));
        let request = PaginationRequest::new(
            u32::try_from(page).ok()?,
            u32::try_from(per_page).ok()?,
        )
        .ok()?;
        Some(Self::new(request, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_forty_five_items_twenty_per_page() {
        let first = PaginationResponse::new(PaginationRequest::new(1, 20).unwrap(), 45);
        assert!(first.has_next);
        assert!(!first.has_previous);
        assert_eq!(first.total_pages, 3);

        let last = PaginationResponse::new(PaginationRequest::new(3, 20).unwrap(), 45);
        assert!(!last.has_next);
        assert!(last.has_previous);
    }

    #[test]
    fn test_empty_result_set() {
        let resp = PaginationResponse::new(PaginationRequest::default(), 0);
        assert_eq!(resp.total_pages, 0);
        assert!(!resp.has_next);
    }

    #[test]
    fn test_request_bounds() {
        assert!(PaginationRequest::new(0, 20).is_err());
        assert!(PaginationRequest::new(1, 0).is_err());
        assert!(PaginationRequest::new(1, 101).is_err());
        assert!(PaginationRequest::new(1, 100).is_ok());
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-total", HeaderValue::from_static("45"));
        headers.insert("x-page", HeaderValue::from_static("2"));
        headers.insert("x-per-page", HeaderValue::from_static("20"));

        let resp = PaginationResponse::from_headers(&headers).unwrap();
        assert_eq!(resp.page, 2);
        assert_eq!(resp.total_pages, 3);
        assert!(resp.has_next);
        assert!(resp.has_previous);
    }

    #[test]
    fn test_from_headers_without_total() {
        let mut headers = HeaderMap::new();
        headers.insert("x-page", HeaderValue::from_static("1"));
        assert!(PaginationResponse::from_headers(&headers).is_none());
    }

    proptest! {
        #[test]
        fn prop_has_next_matches_window(page in 1u32..500, per_page in 1u32..=100, total in 0u64..100_000) {
            let resp = PaginationResponse::new(PaginationRequest::new(page, per_page).unwrap(), total);
            prop_assert_eq!(resp.has_next, u64::from(page) * u64::from(per_page) < total);
            prop_assert_eq!(resp.has_previous, page > 1);
            prop_assert!(resp.total_pages * u64::from(per_page) >= total);
        }
    }
}
