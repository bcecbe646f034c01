//! Condition-flag extraction
//!
//! Each listing tile carries a small badge ("Novo vozilo", "Rabljeno
//! vozilo", "Testno vozilo") rendered as `span.flag` inside `li.entity-flag`.
//! Extraction runs three tiers, first non-empty wins: precise flag spans,
//! then flag containers, then a regex sweep over the raw source. Every tier
//! caps each bucket at 100 per page so markup pathologies cannot inflate
//! the counts.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

/// Per-type per-page cap on counted listings
pub const PER_PAGE_CAP: u32 = 100;

/// Croatian badge phrase for a new vehicle
const NEW_PHRASES: &[&str] = &["novo vozilo"];

/// Croatian badge phrases for a used vehicle (both regional spellings)
const USED_PHRASES: &[&str] = &["rabljeno vozilo", "polovno vozilo"];

/// Croatian badge phrase for a test/demo vehicle
const TEST_PHRASES: &[&str] = &["testno vozilo"];

/// Listing counts for one page, bucketed by condition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagCounts {
    pub new: u32,
    pub used: u32,
    pub test: u32,
}

impl FlagCounts {
    /// True when no listing was counted
    pub fn is_empty(&self) -> bool {
        self.new == 0 && self.used == 0 && self.test == 0
    }

    /// Total across the three buckets
    pub fn total(&self) -> u32 {
        self.new + self.used + self.test
    }

    /// Adds another page's counts into this running total
    pub fn accumulate(&mut self, other: &FlagCounts) {
        self.new += other.new;
        self.used += other.used;
        self.test += other.test;
    }

    fn capped(mut self) -> Self {
        self.new = self.new.min(PER_PAGE_CAP);
        self.used = self.used.min(PER_PAGE_CAP);
        self.test = self.test.min(PER_PAGE_CAP);
        self
    }
}

/// Condition bucket of a single listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    New,
    Used,
    Test,
}

/// Extracts per-page flag counts from rendered HTML
///
/// Tier 1 reads the precise `li.entity-flag > span.flag` badges; tier 2
/// falls back to the textual content of `li.entity-flag` containers; tier 3
/// runs a case-insensitive regex over the raw source. The first tier that
/// finds anything decides the page.
pub fn extract_flags(html: &str) -> FlagCounts {
    let document = Html::parse_document(html);

    let tier1 = extract_from_spans(&document);
    if !tier1.is_empty() {
        return tier1.capped();
    }

    let tier2 = extract_from_containers(&document);
    if !tier2.is_empty() {
        return tier2.capped();
    }

    extract_with_regex(html).capped()
}

/// Tier 1: exact text of the flag spans
fn extract_from_spans(document: &Html) -> FlagCounts {
    let selector = match Selector::parse("li.entity-flag > span.flag") {
        Ok(s) => s,
        Err(_) => return FlagCounts::default(),
    };

    let mut counts = FlagCounts::default();
    for element in document.select(&selector) {
        if let Some(bucket) = classify_exact(&element_text(&element)) {
            bump(&mut counts, bucket);
        }
    }
    counts
}

/// Tier 2: textual content of the flag containers
fn extract_from_containers(document: &Html) -> FlagCounts {
    let selector = match Selector::parse("li.entity-flag") {
        Ok(s) => s,
        Err(_) => return FlagCounts::default(),
    };

    let mut counts = FlagCounts::default();
    for element in document.select(&selector) {
        if let Some(bucket) = classify_containing(&element_text(&element)) {
            bump(&mut counts, bucket);
        }
    }
    counts
}

/// Tier 3: regex sweep over the raw page source
///
/// Whitespace between the words is flexible because server-side rendering
/// sometimes breaks the phrase across lines.
fn extract_with_regex(html: &str) -> FlagCounts {
    FlagCounts {
        new: count_phrase_matches(html, NEW_PHRASES),
        used: count_phrase_matches(html, USED_PHRASES),
        test: count_phrase_matches(html, TEST_PHRASES),
    }
}

fn count_phrase_matches(html: &str, phrases: &[&str]) -> u32 {
    let mut count = 0u32;
    for phrase in phrases {
        let pattern = format!(r"(?i){}", phrase.replace(' ', r"\s+"));
        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(_) => continue,
        };
        count = count.saturating_add(re.find_iter(html).take(PER_PAGE_CAP as usize).count() as u32);
    }
    count.min(PER_PAGE_CAP)
}

/// Collapses an element's text nodes into one normalized string
fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Exact-phrase classification for tier 1
fn classify_exact(text: &str) -> Option<Bucket> {
    // A listing contributes to exactly one bucket; new wins over used over test
    if NEW_PHRASES.contains(&text) {
        Some(Bucket::New)
    } else if USED_PHRASES.contains(&text) {
        Some(Bucket::Used)
    } else if TEST_PHRASES.contains(&text) {
        Some(Bucket::Test)
    } else {
        None
    }
}

/// Contains-phrase classification for tier 2, same priority order
fn classify_containing(text: &str) -> Option<Bucket> {
    if NEW_PHRASES.iter().any(|p| text.contains(p)) {
        Some(Bucket::New)
    } else if USED_PHRASES.iter().any(|p| text.contains(p)) {
        Some(Bucket::Used)
    } else if TEST_PHRASES.iter().any(|p| text.contains(p)) {
        Some(Bucket::Test)
    } else {
        None
    }
}

fn bump(counts: &mut FlagCounts, bucket: Bucket) {
    match bucket {
        Bucket::New => counts.new += 1,
        Bucket::Used => counts.used += 1,
        Bucket::Test => counts.test += 1,
    }
}
