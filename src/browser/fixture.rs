//! Fixture driver for tests
//!
//! Serves canned HTML keyed by URL, so the whole scrape path runs without a
//! real browser. Also usable for offline replays of saved pages.

use crate::browser::{DriverError, PageDriver};
use async_trait::async_trait;
use scraper::{Html, Selector};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// In-memory page driver backed by a URL → HTML map
#[derive(Default)]
pub struct FixtureDriver {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
    current: Option<String>,
    /// URLs opened, in order
    pub opened: Vec<String>,
    /// How many times the driver was rebuilt
    pub rebuilds: u32,
}

impl FixtureDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers HTML to serve for a URL
    pub fn insert(&mut self, url: impl Into<String>, html: impl Into<String>) {
        self.pages.insert(url.into(), html.into());
    }

    /// Marks a URL so navigation to it fails like a transport error
    pub fn fail_on(&mut self, url: impl Into<String>) {
        self.failing.insert(url.into());
    }
}

#[async_trait]
impl PageDriver for FixtureDriver {
    async fn open(&mut self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        self.opened.push(url.to_string());

        if self.failing.contains(url) {
            self.current = None;
            return Err(DriverError::Timeout {
                url: url.to_string(),
            });
        }

        if self.pages.contains_key(url) {
            self.current = Some(url.to_string());
            Ok(())
        } else {
            self.current = None;
            Err(DriverError::Navigation {
                url: url.to_string(),
                message: "no fixture registered".to_string(),
            })
        }
    }

    async fn source(&mut self) -> Result<String, DriverError> {
        self.current
            .as_ref()
            .and_then(|url| self.pages.get(url))
            .cloned()
            .ok_or(DriverError::NoPage)
    }

    async fn exists(&mut self, css: &str) -> Result<bool, DriverError> {
        let html = self.source().await?;
        let selector = Selector::parse(css).map_err(|e| DriverError::Cdp(e.to_string()))?;
        let document = Html::parse_document(&html);
        Ok(document.select(&selector).next().is_some())
    }

    async fn dismiss_consent(&mut self) {}

    async fn rebuild(&mut self, _proxy: Option<String>) -> Result<(), DriverError> {
        self.rebuilds += 1;
        self.current = None;
        Ok(())
    }

    async fn close(&mut self) {
        self.current = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_serves_registered_html() {
        let mut driver = FixtureDriver::new();
        driver.insert("https://x/a", "<html><body><p>hi</p></body></html>");

        driver.open("https://x/a", Duration::from_secs(1)).await.unwrap();
        let html = driver.source().await.unwrap();
        assert!(html.contains("hi"));
        assert!(driver.exists("p").await.unwrap());
        assert!(!driver.exists("table").await.unwrap());
    }

    #[tokio::test]
    async fn test_unregistered_url_fails_navigation() {
        let mut driver = FixtureDriver::new();
        let result = driver.open("https://x/missing", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(DriverError::Navigation { .. })));
    }

    #[tokio::test]
    async fn test_fail_on_simulates_timeout() {
        let mut driver = FixtureDriver::new();
        driver.insert("https://x/a", "<html></html>");
        driver.fail_on("https://x/a");

        let result = driver.open("https://x/a", Duration::from_secs(1)).await;
        assert!(matches!(result, Err(DriverError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_records_opened_urls_and_rebuilds() {
        let mut driver = FixtureDriver::new();
        driver.insert("https://x/a", "<html></html>");

        let _ = driver.open("https://x/a", Duration::from_secs(1)).await;
        let _ = driver.open("https://x/b", Duration::from_secs(1)).await;
        driver.rebuild(None).await.unwrap();

        assert_eq!(driver.opened.len(), 2);
        assert_eq!(driver.rebuilds, 1);
    }
}
