//! Statistics and terminal summaries

use crate::runner::RunReport;
use crate::storage::{Storage, StorageError};

/// Aggregate statistics over the registry and ledger
#[derive(Debug, Clone)]
pub struct TrackerStatistics {
    pub total_stores: u64,
    pub valid_stores: u64,
    pub invalid_stores: u64,
    pub automoto_stores: u64,
    pub snapshot_rows: u64,
    pub new_vehicles: i64,
    pub used_vehicles: i64,
    pub test_vehicles: i64,
    pub total_vehicles: i64,
}

/// Loads statistics from storage
pub fn load_statistics(storage: &dyn Storage) -> Result<TrackerStatistics, StorageError> {
    let total_stores = storage.count_stores()?;
    let valid_stores = storage.count_valid_stores()?;
    let (new_vehicles, used_vehicles, test_vehicles, total_vehicles) =
        storage.sum_vehicle_counts()?;

    Ok(TrackerStatistics {
        total_stores,
        valid_stores,
        invalid_stores: total_stores - valid_stores,
        automoto_stores: storage.count_automoto_stores()?,
        snapshot_rows: storage.count_snapshots()?,
        new_vehicles,
        used_vehicles,
        test_vehicles,
        total_vehicles,
    })
}

/// Prints registry statistics to stdout
pub fn print_statistics(stats: &TrackerStatistics) {
    println!("=== Registry Statistics ===\n");
    println!("Stores known:      {}", stats.total_stores);
    println!("  valid:           {}", stats.valid_stores);
    println!("  invalid:         {}", stats.invalid_stores);
    println!("  auto-moto:       {}", stats.automoto_stores);
    println!("Snapshot rows:     {}", stats.snapshot_rows);
    println!();
    println!("Active vehicles across valid stores:");
    println!("  new:             {}", stats.new_vehicles);
    println!("  used:            {}", stats.used_vehicles);
    println!("  test:            {}", stats.test_vehicles);
    println!("  total:           {}", stats.total_vehicles);
}

/// Prints a run's terminal summary to stdout
pub fn print_run_report(report: &RunReport) {
    println!("\n{}", "=".repeat(60));
    println!("SCRAPING RESULTS ({} mode)", report.mode);
    println!("{}", "=".repeat(60));

    if let Some(ingest) = &report.ingest {
        println!(
            "  Sitemap ingest:      {} discovered, {} new, {} known",
            ingest.discovered, ingest.inserted, ingest.skipped
        );
    } else {
        println!("  Sitemap ingest:      skipped (registry fresh)");
    }

    println!("  Stores visited:      {}", report.visited);
    println!("  Valid:               {}", report.valid);
    println!("  Auto-moto:           {}", report.automoto);
    println!("  New vehicles:        {}", report.new_vehicles);
    println!("  Used vehicles:       {}", report.used_vehicles);
    println!("  Test vehicles:       {}", report.test_vehicles);
    println!("  Total vehicles:      {}", report.total_vehicles);
    println!(
        "  Proxy:               {}",
        if report.proxy_active { "tunnel" } else { "direct" }
    );

    if report.aborted {
        println!("  Status:              ABORTED");
    }

    if !report.errors.is_empty() {
        println!("\n  Errors ({}):", report.errors.len());
        for error in report.errors.iter().take(10) {
            println!("    - {}", error);
        }
    }

    if let Some(elapsed) = report.elapsed() {
        println!("\n  Elapsed:             {}s", elapsed.num_seconds());
    }
    println!("{}", "=".repeat(60));
}
