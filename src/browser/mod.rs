//! Browser driver module
//!
//! HTML-rendered, JavaScript-executed page access with stealth posture.
//! The [`PageDriver`] trait is the seam between the scraper and the real
//! browser: the production backend drives headless Chromium over CDP, while
//! tests swap in [`FixtureDriver`] serving canned HTML.

mod chromium;
mod fixture;
mod stealth;

pub use chromium::{ChromiumDriver, DriverConfig};
pub use fixture::FixtureDriver;
pub use stealth::{random_user_agent, random_viewport, STEALTH_SCRIPTS, USER_AGENTS};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur at the browser driver layer
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation failed for {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Navigation timed out for {url}")]
    Timeout { url: String },

    #[error("CDP error: {0}")]
    Cdp(String),

    #[error("No page is open")]
    NoPage,
}

/// Capability set the scraper needs from a browser
///
/// A fresh driver is lazily built on first `open`. Any navigation error
/// surfaces as a `DriverError`; the scraper turns those into invalid-visit
/// outcomes rather than propagating them.
#[async_trait]
pub trait PageDriver: Send {
    /// Navigates to a URL and waits for the document to be ready
    async fn open(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    /// Returns the current page's rendered HTML
    async fn source(&mut self) -> Result<String, DriverError>;

    /// Checks whether any element matches the CSS selector
    async fn exists(&mut self, css: &str) -> Result<bool, DriverError>;

    /// Best-effort click on the GDPR consent button; errors are swallowed
    async fn dismiss_consent(&mut self);

    /// Quits and reconstructs the driver (after crashes or a proxy change)
    ///
    /// The new SOCKS proxy URL, if any, applies to the reconstructed
    /// browser; passing `None` rebuilds with a direct connection.
    async fn rebuild(&mut self, proxy: Option<String>) -> Result<(), DriverError>;

    /// Shuts the driver down
    async fn close(&mut self);
}
