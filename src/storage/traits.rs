//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types. The registry and ledger are only ever touched
//! from the orchestrator thread, so the trait takes `&mut self` for writes
//! and no internal locking is required.

use crate::scraper::StoreOutcome;
use crate::storage::{RunRecord, RunStatus, SnapshotRecord, StoreRecord};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Covers the store registry, the snapshot ledger, and run records.
/// The one non-obvious contract: [`Storage::record_outcome`] must perform
/// the registry upsert and the ledger append inside a single transaction,
/// with both rows stamped from the same `now`, so that a crash can never
/// leave the registry ahead of the ledger.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new run row with status `running`
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, mode: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Finalizes a run with its terminal status and counters
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        visited: i64,
        valid: i64,
        automoto: i64,
    ) -> StorageResult<()>;

    // ===== Store Registry =====

    /// Inserts any URLs not already present with registry defaults
    ///
    /// New rows get `is_valid = true`, `is_automoto = NULL`, zero counts,
    /// and `created_at = updated_at = now`. Existing rows are untouched.
    ///
    /// # Returns
    ///
    /// The number of rows actually inserted
    fn seed_new(&mut self, urls: &[String]) -> StorageResult<u64>;

    /// Lists store URLs in scrape order
    ///
    /// Never-scraped stores (where `updated_at` still equals `created_at`)
    /// come first, then least-recently-scraped, truncated to `limit`.
    fn list_to_scrape(&self, limit: Option<u64>) -> StorageResult<Vec<String>>;

    /// Gets a registry row by URL
    fn get_store(&self, url: &str) -> StorageResult<Option<StoreRecord>>;

    /// Returns all registry rows ordered by URL (for export)
    fn all_stores(&self) -> StorageResult<Vec<StoreRecord>>;

    /// Counts all registry rows
    fn count_stores(&self) -> StorageResult<u64>;

    /// Returns the most recent `updated_at` across the registry
    ///
    /// `None` when the registry is empty. Drives the sitemap staleness check.
    fn newest_update(&self) -> StorageResult<Option<DateTime<Utc>>>;

    /// Persists a successful visit: registry upsert plus optional snapshot append
    ///
    /// Runs in a single transaction. When `with_snapshot` is set, the prior
    /// snapshot for the URL is read inline and the new row's deltas are
    /// computed against it (zero deltas for a first snapshot).
    fn record_outcome(
        &mut self,
        url: &str,
        outcome: &StoreOutcome,
        with_snapshot: bool,
    ) -> StorageResult<()>;

    /// Marks a URL as invalid after a failed visit
    ///
    /// Counts are left at their last-known values; only `is_valid` flips and
    /// `updated_at` advances. No snapshot row is written for a failed visit.
    fn mark_invalid(&mut self, url: &str) -> StorageResult<()>;

    // ===== Snapshot Ledger =====

    /// Gets the most recent snapshot for a URL
    fn last_snapshot(&self, url: &str) -> StorageResult<Option<SnapshotRecord>>;

    /// Gets all snapshots for a URL ordered by `scraped_at` ascending
    fn snapshots_for(&self, url: &str) -> StorageResult<Vec<SnapshotRecord>>;

    /// Counts all ledger rows
    fn count_snapshots(&self) -> StorageResult<u64>;

    // ===== Statistics =====

    /// Counts registry rows with `is_valid = true`
    fn count_valid_stores(&self) -> StorageResult<u64>;

    /// Counts registry rows with `is_automoto = true`
    fn count_automoto_stores(&self) -> StorageResult<u64>;

    /// Sums the typed vehicle counts across the registry
    ///
    /// Returns `(new, used, test, total)`.
    fn sum_vehicle_counts(&self) -> StorageResult<(i64, i64, i64, i64)>;
}
