//! Store page scraping
//!
//! Drives the browser through one store's category-filtered listing pages
//! and produces a classification outcome. Every error below this layer is
//! absorbed into the outcome; the orchestrator never sees a scrape throw.

use crate::browser::{DriverError, PageDriver};
use crate::pacing::{Pacer, Situation};
use crate::scraper::category::detect_category;
use crate::scraper::flags::{extract_flags, FlagCounts};
use crate::scraper::StoreOutcome;
use crate::url::compose_page_url;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Hard cap on paginated listing pages walked per store
pub const MAX_PAGES: u32 = 20;

/// Navigation deadline per page load
const NAV_TIMEOUT: Duration = Duration::from_secs(30);

/// Grace period for the in-flight store after a cancel; a navigation still
/// running past it is aborted
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Scrapes store pages through a browser driver with pacing between requests
pub struct StoreScraper<'a> {
    driver: &'a mut dyn PageDriver,
    pacer: &'a Pacer,
    category_id: u32,
    count_flags: bool,
    cancel: CancellationToken,
}

impl<'a> StoreScraper<'a> {
    /// Creates a scraper for the full flag-counting walk
    pub fn new(
        driver: &'a mut dyn PageDriver,
        pacer: &'a Pacer,
        category_id: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            driver,
            pacer,
            category_id,
            count_flags: true,
            cancel,
        }
    }

    /// Creates a scraper that only classifies validity and category (basic mode)
    pub fn basic(
        driver: &'a mut dyn PageDriver,
        pacer: &'a Pacer,
        category_id: u32,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            driver,
            pacer,
            category_id,
            count_flags: false,
            cancel,
        }
    }

    /// Opens a page with the navigation deadline derived from the
    /// cancellation token
    ///
    /// The effective deadline is the lesser of the 30s navigation budget
    /// and the time remaining until cancel + 5s, so an in-flight store
    /// finishes within the grace period or gets its navigation aborted.
    async fn open_page(&mut self, url: &str) -> Result<(), DriverError> {
        let cancel = self.cancel.clone();
        let cancel_deadline = async move {
            cancel.cancelled().await;
            tokio::time::sleep(CANCEL_GRACE).await;
        };

        tokio::select! {
            result = self.driver.open(url, NAV_TIMEOUT) => result,
            _ = cancel_deadline => Err(DriverError::Timeout {
                url: url.to_string(),
            }),
        }
    }

    /// Visits a store and produces its classification outcome
    ///
    /// Never returns an error: any driver failure or traversal problem maps
    /// to an invalid outcome after an `error_recovery` pause.
    pub async fn scrape(&mut self, url: &str) -> StoreOutcome {
        match self.try_scrape(url).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!("Visit failed for {}: {}", url, e);
                self.pacer.pause(Situation::ErrorRecovery).await;
                StoreOutcome::invalid()
            }
        }
    }

    async fn try_scrape(&mut self, url: &str) -> Result<StoreOutcome, DriverError> {
        let first_page = compose_page_url(url, self.category_id, 1);
        self.open_page(&first_page).await?;

        self.driver.dismiss_consent().await;
        self.pacer.pause(Situation::PageLoad).await;

        let html = self.driver.source().await?;

        if !detect_category(&html, self.category_id) {
            tracing::debug!("No auto-moto category at {}", url);
            return Ok(StoreOutcome::not_automoto());
        }

        if !self.count_flags {
            return Ok(StoreOutcome {
                is_valid: true,
                is_automoto: true,
                new: 0,
                used: 0,
                test: 0,
            });
        }

        self.pacer.pause(Situation::DataExtract).await;
        let totals = self.walk_pages(url, &html).await;

        Ok(StoreOutcome {
            is_valid: true,
            is_automoto: true,
            new: totals.new,
            used: totals.used,
            test: totals.test,
        })
    }

    /// Walks the paginated listing view, accumulating per-page counts
    ///
    /// A pagination request that fails stops the walk with whatever was
    /// counted so far; it does not fail the store.
    async fn walk_pages(&mut self, url: &str, first_page_html: &str) -> FlagCounts {
        let mut totals = FlagCounts::default();

        for page in 1..=MAX_PAGES {
            let counts = if page == 1 {
                extract_flags(first_page_html)
            } else {
                // On cancel the store keeps what it has counted so far
                if self.cancel.is_cancelled() {
                    tracing::debug!("Cancelled; stopping pagination for {}", url);
                    break;
                }

                self.pacer.pause(Situation::Pagination).await;

                let page_url = compose_page_url(url, self.category_id, page);
                if let Err(e) = self.open_page(&page_url).await {
                    tracing::debug!("Pagination stopped at page {} of {}: {}", page, url, e);
                    break;
                }

                match self.driver.source().await {
                    Ok(html) => extract_flags(&html),
                    Err(e) => {
                        tracing::debug!("Pagination stopped at page {} of {}: {}", page, url, e);
                        break;
                    }
                }
            };

            totals.accumulate(&counts);

            if counts.is_empty() && page > 1 {
                break;
            }
        }

        totals
    }
}
