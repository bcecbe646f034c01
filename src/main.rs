//! Njuskalo tracker main entry point
//!
//! Command-line interface for the sitemap-driven store discovery and
//! inventory tracker. The scheduler invokes this binary once per run.

use clap::{Parser, ValueEnum};
use njuskalo_tracker::browser::{ChromiumDriver, DriverConfig};
use njuskalo_tracker::config::load_config;
use njuskalo_tracker::output::{export_registry_csv, load_statistics, print_run_report, print_statistics};
use njuskalo_tracker::runner::{run, RunMode, RunOptions};
use njuskalo_tracker::storage::SqliteStorage;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    /// Full scrape through SSH tunnels
    Tunnel,
    /// Full scrape over a direct connection
    Enhanced,
    /// Classification only, no flag counting
    Basic,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Tunnel => RunMode::Tunnel,
            ModeArg::Enhanced => RunMode::Enhanced,
            ModeArg::Basic => RunMode::Basic,
        }
    }
}

/// Sitemap-driven store discovery and inventory tracker for njuskalo.hr
#[derive(Parser, Debug)]
#[command(name = "njuskalo-tracker")]
#[command(version = "1.0.0")]
#[command(about = "Track dealer-store vehicle inventory on njuskalo.hr", long_about = None)]
struct Cli {
    /// Scraping mode
    #[arg(long, value_enum, default_value_t = ModeArg::Tunnel)]
    mode: ModeArg,

    /// Limit this run to N stores
    #[arg(long, value_name = "N")]
    max_stores: Option<u64>,

    /// Run without SSH tunnels even in tunnel mode
    #[arg(long)]
    no_tunnels: bool,

    /// Do not write to the database; results go to stdout only
    #[arg(long)]
    no_database: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,

    /// Export the registry to a CSV file after the run
    #[arg(long)]
    export_csv: bool,

    /// Show registry statistics and exit
    #[arg(long, conflicts_with_all = ["max_stores", "no_database", "export_csv"])]
    stats: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // .env before config, logging before everything else that can fail
    let _ = dotenvy::dotenv();
    setup_logging(cli.verbose);

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(2);
        }
    };

    if cli.stats {
        std::process::exit(handle_stats(&config));
    }

    let mut storage = match open_storage(&cli, &config) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!("Failed to open storage: {}", e);
            std::process::exit(1);
        }
    };

    // One cancellation token flows into pacing sleeps and the store loop
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; finishing the in-flight store");
            signal_cancel.cancel();
        }
    });

    let mut driver = ChromiumDriver::new(DriverConfig::stealth(
        config.headless,
        None,
        config.display_num,
    ));

    let mut opts = RunOptions::new(cli.mode.into(), cancel);
    opts.max_stores = cli.max_stores;
    opts.use_tunnels = !cli.no_tunnels;

    match run(&config, &mut storage, &mut driver, opts).await {
        Ok(report) => {
            print_run_report(&report);

            if cli.export_csv && !cli.no_database {
                match export_registry_csv(&storage, &config.datadump_dir) {
                    Ok(path) => println!("Registry exported to {}", path.display()),
                    Err(e) => tracing::warn!("CSV export failed: {}", e),
                }
            }
        }
        Err(e) => {
            tracing::error!("Run failed: {}", e);
            std::process::exit(1);
        }
    }
}

/// Sets up the tracing subscriber based on verbosity
fn setup_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("njuskalo_tracker=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("njuskalo_tracker=info,warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Opens file-backed storage, or an in-memory database for `--no-database`
fn open_storage(
    cli: &Cli,
    config: &njuskalo_tracker::Config,
) -> Result<SqliteStorage, njuskalo_tracker::storage::StorageError> {
    if cli.no_database {
        tracing::info!("--no-database: results will not be persisted");
        SqliteStorage::new_in_memory()
    } else {
        SqliteStorage::new(&config.database_path)
    }
}

/// Handles `--stats`: print registry statistics and exit
fn handle_stats(config: &njuskalo_tracker::Config) -> i32 {
    match SqliteStorage::new(&config.database_path) {
        Ok(storage) => match load_statistics(&storage) {
            Ok(stats) => {
                print_statistics(&stats);
                0
            }
            Err(e) => {
                tracing::error!("Failed to load statistics: {}", e);
                1
            }
        },
        Err(e) => {
            tracing::error!("Failed to open database: {}", e);
            1
        }
    }
}
