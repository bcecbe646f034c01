//! URL handling module
//!
//! This module provides store-URL normalization, recognition of dealer-store
//! paths, and composition of category-filtered and paginated listing URLs.

mod normalize;
mod store;

use thiserror::Error;

// Re-export main functions
pub use normalize::normalize_store_url;
pub use store::{compose_category_url, compose_page_url, is_store_url, STORE_PATH_SEGMENT};

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Not a store URL: {0}")]
    NotAStore(String),
}

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;
