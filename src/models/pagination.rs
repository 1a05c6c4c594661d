use rocket::serde::{Deserialize, Serialize};
use schemars::JsonSchema;

/// Offset pagination parameters for list queries.
#[derive(Debug, Clone, Copy, Deserialize, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct PaginationParams {
    /// Page number (1-indexed).
    pub page: Option<i64>,
    /// Number of items per page.
    pub per_page: Option<i64>,
}

impl PaginationParams {
    /// Page size when the caller does not specify one.
    pub const DEFAULT_PER_PAGE: i64 = 20;
    /// Maximum allowed page size.
    pub const MAX_PER_PAGE: i64 = 100;

    pub fn from_query(page: Option<i64>, per_page: Option<i64>) -> Self {
        Self { page, per_page }
    }

    /// Get the effective page size, applying the default and max constraints.
    pub fn effective_per_page(&self) -> i64 {
        match self.per_page {
            Some(per_page) => per_page.clamp(1, Self::MAX_PER_PAGE),
            None => Self::DEFAULT_PER_PAGE,
        }
    }

    pub fn effective_page(&self) -> i64 {
        self.page.unwrap_or(1).max(1)
    }

    /// Calculate the SQL OFFSET value based on page and per_page.
    /// Uses the effective (capped) size to keep page boundaries consistent.
    pub fn offset(&self) -> i64 {
        (self.effective_page() - 1).saturating_mul(self.effective_per_page())
    }
}

impl Default for PaginationParams {
    fn default() -> Self {
        Self { page: None, per_page: None }
    }
}

/// Paginated response wrapper with metadata
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct PaginatedResponse<T> {
    /// The actual data items
    pub data: Vec<T>,
    /// Current page number (1-indexed)
    pub page: i64,
    /// Number of items per page
    pub per_page: i64,
    /// Total number of items across all pages
    pub total_items: i64,
    /// Total number of pages
    pub total_pages: i64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, page: i64, per_page: i64, total_items: i64) -> Self {
        let total_pages = if per_page > 0 { (total_items + per_page - 1) / per_page } else { 1 };

        Self {
            data,
            page,
            per_page,
            total_items,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn default_page_size_is_20() {
        let params = PaginationParams::default();
        assert_eq!(params.effective_per_page(), 20);
        assert_eq!(params.effective_page(), 1);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn per_page_is_capped() {
        let params = PaginationParams::from_query(None, Some(5000));
        assert_eq!(params.effective_per_page(), PaginationParams::MAX_PER_PAGE);
    }

    #[test]
    fn nonsense_values_are_clamped() {
        let params = PaginationParams::from_query(Some(0), Some(-3));
        assert_eq!(params.effective_page(), 1);
        assert_eq!(params.effective_per_page(), 1);
        assert_eq!(params.offset(), 0);
    }

    #[test]
    fn offset_follows_page_boundaries() {
        let params = PaginationParams::from_query(Some(3), Some(25));
        assert_eq!(params.offset(), 50);
    }

    #[test]
    fn total_pages_rounds_up() {
        let response = PaginatedResponse::new(vec![1, 2, 3], 1, 20, 41);
        assert_eq!(response.total_pages, 3);

        let exact = PaginatedResponse::<i32>::new(Vec::new(), 1, 20, 40);
        assert_eq!(exact.total_pages, 2);
    }

    proptest! {
        #[test]
        fn offset_is_never_negative(page in any::<i64>(), per_page in any::<i64>()) {
            let params = PaginationParams::from_query(Some(page), Some(per_page));
            prop_assert!(params.offset() >= 0);
            prop_assert!(params.effective_per_page() >= 1);
            prop_assert!(params.effective_per_page() <= PaginationParams::MAX_PER_PAGE);
        }
    }
}
