//! Storage module for the store registry and snapshot ledger
//!
//! Two durable entities live here: the registry of known store URLs with
//! their latest classification and counts (`scraped_stores`), and the
//! append-only ledger of per-run counts with deltas (`store_snapshots`).
//! A lightweight `runs` table records each run's lifecycle.

mod schema;
mod sqlite;
mod traits;

pub use schema::{initialize_schema, SCHEMA_SQL};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use chrono::{DateTime, Utc};

/// A row in the store registry
#[derive(Debug, Clone)]
pub struct StoreRecord {
    /// Database row id
    pub id: i64,

    /// Canonical store URL (unique)
    pub url: String,

    /// Opaque per-run payload from the last scrape (JSON)
    pub results: Option<String>,

    /// False when the URL is unreachable or not a store page
    pub is_valid: bool,

    /// True iff the page exposes the auto-moto category; None until first classified
    pub is_automoto: Option<bool>,

    pub new_vehicle_count: i64,
    pub used_vehicle_count: i64,
    pub test_vehicle_count: i64,
    pub total_vehicle_count: i64,

    /// First-seen timestamp
    pub created_at: DateTime<Utc>,

    /// Last-scrape timestamp (equals `created_at` until first scraped)
    pub updated_at: DateTime<Utc>,
}

/// A row in the snapshot ledger
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    /// Database row id
    pub id: i64,

    /// Store URL this snapshot belongs to (not a foreign key by design)
    pub url: String,

    /// When this snapshot was taken
    pub scraped_at: DateTime<Utc>,

    pub active_new: i64,
    pub active_used: i64,
    pub active_test: i64,
    pub active_total: i64,

    /// Signed change against the previous snapshot for the same URL
    /// (all zero for a store's first snapshot)
    pub delta_new: i64,
    pub delta_used: i64,
    pub delta_test: i64,
    pub delta_total: i64,
}

/// A row in the runs table
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub mode: String,
    pub status: RunStatus,
    pub stores_visited: i64,
    pub stores_valid: i64,
    pub stores_automoto: i64,
}

/// Status of a scrape run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Aborted,
}

impl RunStatus {
    /// Converts the status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    /// Parses a status from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }
}

/// Parses an RFC 3339 datetime string from the database
///
/// Defaults to the Unix epoch if the stored value is unparseable, so a
/// corrupt row degrades to "very stale" rather than an error.
pub fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}
