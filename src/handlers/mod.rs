//! HTTP handlers, one module per resource.
//!
//! Handlers resolve the caller with the `AuthUser` extractor, check capabilities, validate
//! input and delegate to the repository and media store held in `AppState`.

pub mod analytics;
pub mod auth;
pub mod media;
pub mod menus;
pub mod posts;
pub mod settings;
pub mod site;
pub mod users;

use crate::error::{ApiError, ApiResult};

pub const DEFAULT_PER_PAGE: i64 = 20;
pub const MAX_PER_PAGE: i64 = 100;

/// A validated `page`/`per_page` pair and the matching SQL window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub per_page: i64,
}

impl PageWindow {
    /// `page` defaults to 1 and must be at least 1. `per_page` defaults to 20 and must lie
    /// in `1..=100`.
    pub fn new(page: Option<i64>, per_page: Option<i64>) -> ApiResult<Self> {
        let page = page.unwrap_or(1);
        let per_page = per_page.unwrap_or(DEFAULT_PER_PAGE);
        if page < 1 {
            return Err(ApiError::bad_request("page must be at least 1"));
        }
        if !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(ApiError::bad_request(format!(
                "per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        Ok(Self { page, per_page })
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.per_page)
    }
}

/// Keys of settings and names of menus: 1..=100 chars of `[A-Za-z0-9_.-]`.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= 100
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
