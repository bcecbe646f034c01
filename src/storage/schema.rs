//! Database schema definitions
//!
//! All SQL schema for the tracker database. Creation is idempotent and
//! migrations are additive only: columns and tables may be added in later
//! versions but never dropped or renamed.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Registry of known store URLs with latest classification and counts
CREATE TABLE IF NOT EXISTS scraped_stores (
    id INTEGER PRIMARY KEY,
    url TEXT UNIQUE NOT NULL,
    results TEXT,
    is_valid INTEGER NOT NULL,
    is_automoto INTEGER,
    new_vehicle_count INTEGER NOT NULL DEFAULT 0,
    used_vehicle_count INTEGER NOT NULL DEFAULT 0,
    test_vehicle_count INTEGER NOT NULL DEFAULT 0,
    total_vehicle_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_scraped_stores_url ON scraped_stores(url);
CREATE INDEX IF NOT EXISTS idx_scraped_stores_updated_at ON scraped_stores(updated_at);
CREATE INDEX IF NOT EXISTS idx_scraped_stores_is_automoto ON scraped_stores(is_automoto);

-- Append-only per-run counts with deltas against the prior snapshot
CREATE TABLE IF NOT EXISTS store_snapshots (
    id INTEGER PRIMARY KEY,
    url TEXT NOT NULL,
    scraped_at TEXT NOT NULL,
    active_new INTEGER NOT NULL,
    active_used INTEGER NOT NULL,
    active_test INTEGER NOT NULL,
    active_total INTEGER NOT NULL,
    delta_new INTEGER NOT NULL,
    delta_used INTEGER NOT NULL,
    delta_test INTEGER NOT NULL,
    delta_total INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_store_snapshots_url_scraped_at
    ON store_snapshots(url, scraped_at DESC);

-- Run lifecycle records
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    mode TEXT NOT NULL,
    status TEXT NOT NULL,
    stores_visited INTEGER NOT NULL DEFAULT 0,
    stores_valid INTEGER NOT NULL DEFAULT 0,
    stores_automoto INTEGER NOT NULL DEFAULT 0
);
"#;

/// Initializes the database schema
///
/// Safe to call on every open; all statements are `IF NOT EXISTS`.
///
/// # Arguments
///
/// * `conn` - The database connection
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
