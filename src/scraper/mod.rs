//! Store scraping module
//!
//! The central algorithm: given a store URL, drive the browser through the
//! category-filtered listing pages, detect whether the store carries the
//! auto-moto category, and count active listings by condition flag.

mod category;
mod flags;
mod store;

pub use category::{detect_category, CATEGORY_KEYWORDS};
pub use flags::{extract_flags, FlagCounts, PER_PAGE_CAP};
pub use store::{StoreScraper, MAX_PAGES};

use serde::{Deserialize, Serialize};

/// Classification outcome of one store visit
///
/// The sole input to the persistence step. Every failure below the scraper
/// is folded into `is_valid = false` here; the scrape path never throws.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreOutcome {
    /// False when the URL was unreachable or did not render a store page
    pub is_valid: bool,

    /// True iff the page exposes the auto-moto category
    pub is_automoto: bool,

    /// Active listings flagged as new vehicles
    pub new: u32,

    /// Active listings flagged as used vehicles
    pub used: u32,

    /// Active listings flagged as test vehicles
    pub test: u32,
}

impl StoreOutcome {
    /// Total active listings across the three buckets
    pub fn total(&self) -> u32 {
        self.new + self.used + self.test
    }

    /// Outcome for a failed visit
    pub fn invalid() -> Self {
        Self {
            is_valid: false,
            is_automoto: false,
            new: 0,
            used: 0,
            test: 0,
        }
    }

    /// Outcome for a store that rendered fine but has no auto-moto category
    pub fn not_automoto() -> Self {
        Self {
            is_valid: true,
            is_automoto: false,
            new: 0,
            used: 0,
            test: 0,
        }
    }
}
