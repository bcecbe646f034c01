//! SQLite storage implementation
//!
//! File-backed embedded store for the registry, ledger, and run records.

use crate::scraper::StoreOutcome;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{parse_datetime, RunRecord, RunStatus, SnapshotRecord, StoreRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database file and ensures the schema exists
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for tests and `--no-database` dry runs)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    fn map_store_row(row: &Row<'_>) -> rusqlite::Result<StoreRecord> {
        Ok(StoreRecord {
            id: row.get(0)?,
            url: row.get(1)?,
            results: row.get(2)?,
            is_valid: row.get::<_, i64>(3)? != 0,
            is_automoto: row.get::<_, Option<i64>>(4)?.map(|v| v != 0),
            new_vehicle_count: row.get(5)?,
            used_vehicle_count: row.get(6)?,
            test_vehicle_count: row.get(7)?,
            total_vehicle_count: row.get(8)?,
            created_at: parse_datetime(&row.get::<_, String>(9)?),
            updated_at: parse_datetime(&row.get::<_, String>(10)?),
        })
    }

    fn map_snapshot_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
        Ok(SnapshotRecord {
            id: row.get(0)?,
            url: row.get(1)?,
            scraped_at: parse_datetime(&row.get::<_, String>(2)?),
            active_new: row.get(3)?,
            active_used: row.get(4)?,
            active_test: row.get(5)?,
            active_total: row.get(6)?,
            delta_new: row.get(7)?,
            delta_used: row.get(8)?,
            delta_test: row.get(9)?,
            delta_total: row.get(10)?,
        })
    }
}

const STORE_COLUMNS: &str = "id, url, results, is_valid, is_automoto, new_vehicle_count, \
     used_vehicle_count, test_vehicle_count, total_vehicle_count, created_at, updated_at";

const SNAPSHOT_COLUMNS: &str = "id, url, scraped_at, active_new, active_used, active_test, \
     active_total, delta_new, delta_used, delta_test, delta_total";

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, mode: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, mode, status) VALUES (?1, ?2, ?3)",
            params![now, mode, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, mode, status, stores_visited, stores_valid, stores_automoto
             FROM runs WHERE id = ?1",
        )?;

        let run = stmt
            .query_row(params![run_id], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: parse_datetime(&row.get::<_, String>(1)?),
                    finished_at: row
                        .get::<_, Option<String>>(2)?
                        .map(|s| parse_datetime(&s)),
                    mode: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                    stores_visited: row.get(5)?,
                    stores_valid: row.get(6)?,
                    stores_automoto: row.get(7)?,
                })
            })
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))?;

        Ok(run)
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        visited: i64,
        valid: i64,
        automoto: i64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let changed = self.conn.execute(
            "UPDATE runs SET finished_at = ?1, status = ?2, stores_visited = ?3,
                             stores_valid = ?4, stores_automoto = ?5
             WHERE id = ?6",
            params![now, status.to_db_string(), visited, valid, automoto, run_id],
        )?;
        if changed == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Store Registry =====

    fn seed_new(&mut self, urls: &[String]) -> StorageResult<u64> {
        let now = Utc::now().to_rfc3339();
        let tx = self.conn.transaction()?;
        let mut inserted = 0u64;
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO scraped_stores
                     (url, is_valid, is_automoto, created_at, updated_at)
                 VALUES (?1, 1, NULL, ?2, ?2)",
            )?;
            for url in urls {
                inserted += stmt.execute(params![url, now])? as u64;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn list_to_scrape(&self, limit: Option<u64>) -> StorageResult<Vec<String>> {
        // Never-scraped rows (updated_at still equals created_at) first, then
        // least-recently-scraped. The id tiebreak keeps the order deterministic.
        let sql = "SELECT url FROM scraped_stores
                   ORDER BY CASE WHEN updated_at = created_at THEN 0 ELSE 1 END,
                            updated_at ASC, id ASC";
        let mut urls = Vec::new();
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        for row in rows {
            urls.push(row?);
        }
        if let Some(limit) = limit {
            urls.truncate(limit as usize);
        }
        Ok(urls)
    }

    fn get_store(&self, url: &str) -> StorageResult<Option<StoreRecord>> {
        let sql = format!("SELECT {} FROM scraped_stores WHERE url = ?1", STORE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let record = stmt
            .query_row(params![url], Self::map_store_row)
            .optional()?;
        Ok(record)
    }

    fn all_stores(&self) -> StorageResult<Vec<StoreRecord>> {
        let sql = format!("SELECT {} FROM scraped_stores ORDER BY url", STORE_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], Self::map_store_row)?;
        let mut stores = Vec::new();
        for row in rows {
            stores.push(row?);
        }
        Ok(stores)
    }

    fn count_stores(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM scraped_stores", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn newest_update(&self) -> StorageResult<Option<DateTime<Utc>>> {
        let newest: Option<String> = self.conn.query_row(
            "SELECT MAX(updated_at) FROM scraped_stores",
            [],
            |row| row.get(0),
        )?;
        Ok(newest.map(|s| parse_datetime(&s)))
    }

    fn record_outcome(
        &mut self,
        url: &str,
        outcome: &StoreOutcome,
        with_snapshot: bool,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let results = serde_json::to_string(outcome)?;
        let total = outcome.total();

        let tx = self.conn.transaction()?;

        tx.execute(
            "INSERT INTO scraped_stores
                 (url, results, is_valid, is_automoto, new_vehicle_count,
                  used_vehicle_count, test_vehicle_count, total_vehicle_count,
                  created_at, updated_at)
             VALUES (?1, ?2, 1, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(url) DO UPDATE SET
                 results = excluded.results,
                 is_valid = 1,
                 is_automoto = excluded.is_automoto,
                 new_vehicle_count = excluded.new_vehicle_count,
                 used_vehicle_count = excluded.used_vehicle_count,
                 test_vehicle_count = excluded.test_vehicle_count,
                 total_vehicle_count = excluded.total_vehicle_count,
                 updated_at = excluded.updated_at",
            params![
                url,
                results,
                outcome.is_automoto,
                outcome.new as i64,
                outcome.used as i64,
                outcome.test as i64,
                total as i64,
                now,
            ],
        )?;

        if with_snapshot {
            // The prior snapshot is read inside the same transaction so the
            // deltas stay correct under crash-restart.
            let prev: Option<(i64, i64, i64, i64)> = tx
                .query_row(
                    "SELECT active_new, active_used, active_test, active_total
                     FROM store_snapshots WHERE url = ?1
                     ORDER BY scraped_at DESC, id DESC LIMIT 1",
                    params![url],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
                )
                .optional()?;

            let active = (
                outcome.new as i64,
                outcome.used as i64,
                outcome.test as i64,
                total as i64,
            );
            let delta = match prev {
                Some(p) => (
                    active.0 - p.0,
                    active.1 - p.1,
                    active.2 - p.2,
                    active.3 - p.3,
                ),
                None => (0, 0, 0, 0),
            };

            tx.execute(
                "INSERT INTO store_snapshots
                     (url, scraped_at, active_new, active_used, active_test, active_total,
                      delta_new, delta_used, delta_test, delta_total)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    url, now, active.0, active.1, active.2, active.3, delta.0, delta.1, delta.2,
                    delta.3,
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    fn mark_invalid(&mut self, url: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let results = r#"{"error":"URL not accessible"}"#;
        self.conn.execute(
            "INSERT INTO scraped_stores
                 (url, results, is_valid, is_automoto, created_at, updated_at)
             VALUES (?1, ?2, 0, NULL, ?3, ?3)
             ON CONFLICT(url) DO UPDATE SET
                 is_valid = 0,
                 updated_at = excluded.updated_at",
            params![url, results, now],
        )?;
        Ok(())
    }

    // ===== Snapshot Ledger =====

    fn last_snapshot(&self, url: &str) -> StorageResult<Option<SnapshotRecord>> {
        let sql = format!(
            "SELECT {} FROM store_snapshots WHERE url = ?1
             ORDER BY scraped_at DESC, id DESC LIMIT 1",
            SNAPSHOT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let record = stmt
            .query_row(params![url], Self::map_snapshot_row)
            .optional()?;
        Ok(record)
    }

    fn snapshots_for(&self, url: &str) -> StorageResult<Vec<SnapshotRecord>> {
        let sql = format!(
            "SELECT {} FROM store_snapshots WHERE url = ?1
             ORDER BY scraped_at ASC, id ASC",
            SNAPSHOT_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map(params![url], Self::map_snapshot_row)?;
        let mut snapshots = Vec::new();
        for row in rows {
            snapshots.push(row?);
        }
        Ok(snapshots)
    }

    fn count_snapshots(&self) -> StorageResult<u64> {
        let count: i64 =
            self.conn
                .query_row("SELECT COUNT(*) FROM store_snapshots", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    // ===== Statistics =====

    fn count_valid_stores(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM scraped_stores WHERE is_valid = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_automoto_stores(&self) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM scraped_stores WHERE is_automoto = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn sum_vehicle_counts(&self) -> StorageResult<(i64, i64, i64, i64)> {
        let sums = self.conn.query_row(
            "SELECT COALESCE(SUM(new_vehicle_count), 0),
                    COALESCE(SUM(used_vehicle_count), 0),
                    COALESCE(SUM(test_vehicle_count), 0),
                    COALESCE(SUM(total_vehicle_count), 0)
             FROM scraped_stores WHERE is_valid = 1",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;
        Ok(sums)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome(new: u32, used: u32, test: u32) -> StoreOutcome {
        StoreOutcome {
            is_valid: true,
            is_automoto: true,
            new,
            used,
            test,
        }
    }

    fn store_url(slug: &str) -> String {
        format!("https://www.njuskalo.hr/trgovina/{}", slug)
    }

    #[test]
    fn test_seed_new_inserts_defaults() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let urls = vec![store_url("a"), store_url("b")];

        let inserted = storage.seed_new(&urls).unwrap();
        assert_eq!(inserted, 2);

        let record = storage.get_store(&store_url("a")).unwrap().unwrap();
        assert!(record.is_valid);
        assert_eq!(record.is_automoto, None);
        assert_eq!(record.total_vehicle_count, 0);
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn test_seed_new_is_idempotent() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let urls = vec![store_url("a"), store_url("b"), store_url("c")];

        assert_eq!(storage.seed_new(&urls).unwrap(), 3);
        assert_eq!(storage.seed_new(&urls).unwrap(), 0);
        assert_eq!(storage.count_stores().unwrap(), 3);
    }

    #[test]
    fn test_record_outcome_first_snapshot_has_zero_deltas() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let url = store_url("a");
        storage.seed_new(&[url.clone()]).unwrap();

        storage.record_outcome(&url, &outcome(12, 3, 1), true).unwrap();

        let snapshots = storage.snapshots_for(&url).unwrap();
        assert_eq!(snapshots.len(), 1);
        let snap = &snapshots[0];
        assert_eq!(snap.active_new, 12);
        assert_eq!(snap.active_total, 16);
        assert_eq!(snap.delta_new, 0);
        assert_eq!(snap.delta_used, 0);
        assert_eq!(snap.delta_test, 0);
        assert_eq!(snap.delta_total, 0);
    }

    #[test]
    fn test_record_outcome_deltas_against_prior_snapshot() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let url = store_url("a");
        storage.seed_new(&[url.clone()]).unwrap();

        storage.record_outcome(&url, &outcome(12, 5, 0), true).unwrap();
        storage.record_outcome(&url, &outcome(9, 7, 1), true).unwrap();

        let snapshots = storage.snapshots_for(&url).unwrap();
        assert_eq!(snapshots.len(), 2);
        let latest = &snapshots[1];
        assert_eq!(latest.active_new, 9);
        assert_eq!(latest.delta_new, -3);
        assert_eq!(latest.delta_used, 2);
        assert_eq!(latest.delta_test, 1);
        assert_eq!(latest.delta_total, 0);
    }

    #[test]
    fn test_record_outcome_updates_registry_counts() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let url = store_url("a");
        storage.seed_new(&[url.clone()]).unwrap();

        storage.record_outcome(&url, &outcome(4, 2, 1), true).unwrap();

        let record = storage.get_store(&url).unwrap().unwrap();
        assert_eq!(record.new_vehicle_count, 4);
        assert_eq!(record.used_vehicle_count, 2);
        assert_eq!(record.test_vehicle_count, 1);
        assert_eq!(record.total_vehicle_count, 7);
        assert_eq!(record.is_automoto, Some(true));
        assert!(record.results.is_some());
    }

    #[test]
    fn test_registry_total_equals_sum_of_types() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let url = store_url("a");
        storage.record_outcome(&url, &outcome(10, 20, 3), true).unwrap();

        let record = storage.get_store(&url).unwrap().unwrap();
        assert_eq!(
            record.total_vehicle_count,
            record.new_vehicle_count + record.used_vehicle_count + record.test_vehicle_count
        );
    }

    #[test]
    fn test_record_outcome_without_snapshot() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let url = store_url("a");

        storage.record_outcome(&url, &outcome(1, 1, 0), false).unwrap();

        assert_eq!(storage.count_snapshots().unwrap(), 0);
        assert!(storage.get_store(&url).unwrap().is_some());
    }

    #[test]
    fn test_registry_and_ledger_timestamps_agree() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let url = store_url("a");
        storage.record_outcome(&url, &outcome(2, 0, 0), true).unwrap();

        let record = storage.get_store(&url).unwrap().unwrap();
        let snap = storage.last_snapshot(&url).unwrap().unwrap();
        assert_eq!(record.updated_at, snap.scraped_at);
    }

    #[test]
    fn test_mark_invalid_preserves_counts() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let url = store_url("a");
        storage.record_outcome(&url, &outcome(5, 3, 0), true).unwrap();

        storage.mark_invalid(&url).unwrap();

        let record = storage.get_store(&url).unwrap().unwrap();
        assert!(!record.is_valid);
        assert_eq!(record.new_vehicle_count, 5);
        assert_eq!(record.used_vehicle_count, 3);
        assert_eq!(record.total_vehicle_count, 8);
        // No snapshot is appended for a failed visit
        assert_eq!(storage.snapshots_for(&url).unwrap().len(), 1);
    }

    #[test]
    fn test_mark_invalid_on_unknown_url_creates_row() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let url = store_url("ghost");

        storage.mark_invalid(&url).unwrap();

        let record = storage.get_store(&url).unwrap().unwrap();
        assert!(!record.is_valid);
        assert_eq!(record.total_vehicle_count, 0);
    }

    #[test]
    fn test_list_to_scrape_never_scraped_first() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let scraped = store_url("scraped");
        let fresh = store_url("fresh");

        storage.seed_new(&[scraped.clone()]).unwrap();
        storage.record_outcome(&scraped, &outcome(1, 0, 0), true).unwrap();
        storage.seed_new(&[fresh.clone()]).unwrap();

        let order = storage.list_to_scrape(None).unwrap();
        assert_eq!(order, vec![fresh, scraped]);
    }

    #[test]
    fn test_list_to_scrape_respects_limit() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let urls: Vec<String> = (0..5).map(|i| store_url(&format!("s{}", i))).collect();
        storage.seed_new(&urls).unwrap();

        let limited = storage.list_to_scrape(Some(2)).unwrap();
        assert_eq!(limited.len(), 2);
    }

    #[test]
    fn test_newest_update_empty_registry() {
        let storage = SqliteStorage::new_in_memory().unwrap();
        assert_eq!(storage.newest_update().unwrap(), None);
    }

    #[test]
    fn test_newest_update_after_seed() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.seed_new(&[store_url("a")]).unwrap();
        let newest = storage.newest_update().unwrap().unwrap();
        assert!(Utc::now().signed_duration_since(newest).num_seconds() < 10);
    }

    #[test]
    fn test_run_lifecycle() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let run_id = storage.create_run("enhanced").unwrap();

        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Running);
        assert!(run.finished_at.is_none());

        storage
            .finish_run(run_id, RunStatus::Completed, 10, 8, 3)
            .unwrap();
        let run = storage.get_run(run_id).unwrap();
        assert_eq!(run.status, RunStatus::Completed);
        assert_eq!(run.stores_visited, 10);
        assert!(run.finished_at.is_some());
    }

    #[test]
    fn test_finish_unknown_run_errors() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let result = storage.finish_run(999, RunStatus::Completed, 0, 0, 0);
        assert!(matches!(result, Err(StorageError::RunNotFound(999))));
    }

    #[test]
    fn test_statistics_counts() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.record_outcome(&store_url("a"), &outcome(2, 1, 0), true).unwrap();
        storage
            .record_outcome(
                &store_url("b"),
                &StoreOutcome {
                    is_valid: true,
                    is_automoto: false,
                    new: 0,
                    used: 0,
                    test: 0,
                },
                true,
            )
            .unwrap();
        storage.mark_invalid(&store_url("c")).unwrap();

        assert_eq!(storage.count_stores().unwrap(), 3);
        assert_eq!(storage.count_valid_stores().unwrap(), 2);
        assert_eq!(storage.count_automoto_stores().unwrap(), 1);
        assert_eq!(storage.sum_vehicle_counts().unwrap(), (2, 1, 0, 3));
    }
}
