//! Run modes and the terminal run report

use crate::sitemap::IngestReport;
use chrono::{DateTime, Utc};

/// Scraping mode for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Full scrape through SSH tunnels
    Tunnel,

    /// Full scrape over a direct connection
    Enhanced,

    /// Classification only: validity and category, no flag counting
    Basic,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tunnel => "tunnel",
            Self::Enhanced => "enhanced",
            Self::Basic => "basic",
        }
    }

    /// Whether this mode walks pagination and counts flags
    pub fn counts_flags(&self) -> bool {
        !matches!(self, Self::Basic)
    }

    /// Whether snapshot rows are appended in this mode
    ///
    /// Basic mode does not measure counts, so a snapshot row would fabricate
    /// zero actives and negative deltas.
    pub fn writes_snapshots(&self) -> bool {
        self.counts_flags()
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary of one scrape run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub mode: RunMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Sitemap ingest outcome, when the run decided to re-ingest
    pub ingest: Option<IngestReport>,

    /// Stores visited this run
    pub visited: u64,

    /// Visits that produced a valid classification
    pub valid: u64,

    /// Visits classified as auto-moto stores
    pub automoto: u64,

    /// Cumulative counts across this run's valid visits
    pub new_vehicles: u64,
    pub used_vehicles: u64,
    pub test_vehicles: u64,
    pub total_vehicles: u64,

    /// Whether a SOCKS tunnel was in use at the end of the run
    pub proxy_active: bool,

    /// True when the run stopped early (cancellation or fatal error)
    pub aborted: bool,

    /// Non-fatal errors collected along the way
    pub errors: Vec<String>,
}

impl RunReport {
    pub fn new(mode: RunMode) -> Self {
        Self {
            mode,
            started_at: Utc::now(),
            finished_at: None,
            ingest: None,
            visited: 0,
            valid: 0,
            automoto: 0,
            new_vehicles: 0,
            used_vehicles: 0,
            test_vehicles: 0,
            total_vehicles: 0,
            proxy_active: false,
            aborted: false,
            errors: Vec::new(),
        }
    }

    /// Wall-clock duration of the run, if finished
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }
}
