//! Njuskalo store tracker
//!
//! This crate implements a sitemap-driven store discovery and longitudinal
//! inventory tracker for njuskalo.hr. It walks the site's sitemap index to
//! find dealer-store pages, visits each one through a headless browser
//! filtered to the auto-moto category, counts active listings by vehicle
//! condition, and records per-run snapshots with deltas against the
//! previous run.

pub mod browser;
pub mod config;
pub mod output;
pub mod pacing;
pub mod runner;
pub mod scraper;
pub mod sitemap;
pub mod storage;
pub mod tunnel;
pub mod url;

use thiserror::Error;

/// Main error type for tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Sitemap error: {0}")]
    Sitemap(#[from] sitemap::SitemapError),

    #[error("Tunnel error: {0}")]
    Tunnel(#[from] tunnel::TunnelError),

    #[error("Browser driver error: {0}")]
    Driver(#[from] browser::DriverError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] crate::url::UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Run aborted: {0}")]
    Aborted(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },

    #[error("Failed to read tunnel config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse tunnel config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use runner::{run, RunMode, RunReport};
pub use scraper::StoreOutcome;
