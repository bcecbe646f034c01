//! Run coordinator
//!
//! Owns the per-run control flow: staleness-gated sitemap ingest, the store
//! loop with pacing, extended breaks and tunnel rotation, transactional
//! persistence of each outcome, and teardown in reverse order of
//! acquisition. All top-level exception handling lives here.

use crate::browser::PageDriver;
use crate::config::Config;
use crate::pacing::{pick_break_period, Pacer, Situation};
use crate::runner::report::{RunMode, RunReport};
use crate::scraper::StoreScraper;
use crate::sitemap::{build_sitemap_client, ingest, HttpSitemapFetcher};
use crate::storage::{RunStatus, Storage};
use crate::tunnel::{load_tunnel_config, TunnelStatus, TunnelSupervisor};
use crate::{Result, TrackerError};
use chrono::{Duration as ChronoDuration, Utc};
use tokio_util::sync::CancellationToken;

/// Consecutive invalid visits that trigger a driver rebuild (and tunnel
/// rotation when tunnels are active)
const REBUILD_AFTER_FAILURES: u32 = 3;

/// Options for one run
pub struct RunOptions {
    pub mode: RunMode,

    /// Cap on stores visited this run
    pub max_stores: Option<u64>,

    /// Master switch for the tunnel supervisor (`--no-tunnels` clears it)
    pub use_tunnels: bool,

    /// Abort instead of degrading to a direct connection when no tunnel
    /// can be established in tunnel mode
    pub strict_tunnels: bool,

    /// Pacing controller (inject an instant sleeper in tests)
    pub pacer: Pacer,

    /// Cancellation token observed between stores and inside sleeps
    pub cancel: CancellationToken,
}

impl RunOptions {
    pub fn new(mode: RunMode, cancel: CancellationToken) -> Self {
        Self {
            mode,
            max_stores: None,
            use_tunnels: true,
            strict_tunnels: false,
            pacer: Pacer::new(cancel.clone()),
            cancel,
        }
    }
}

/// Executes one scrape run end to end
///
/// The storage handle and browser driver are injected so tests can run the
/// whole pipeline over fixtures. Resources are released in reverse order of
/// acquisition on every exit path; storage errors propagate as fatal.
pub async fn run(
    config: &Config,
    storage: &mut dyn Storage,
    driver: &mut dyn PageDriver,
    mut opts: RunOptions,
) -> Result<RunReport> {
    let run_id = storage.create_run(opts.mode.as_str())?;
    tracing::info!("Starting run {} in {} mode", run_id, opts.mode);

    let mut tunnels = setup_tunnels(config, &opts)?;

    let mut report = RunReport::new(opts.mode);
    let result = scrape_all(
        config,
        storage,
        driver,
        tunnels.as_mut(),
        &mut opts,
        &mut report,
    )
    .await;

    // Teardown in reverse order of acquisition
    driver.close().await;
    if let Some(supervisor) = tunnels.as_mut() {
        supervisor.close_all().await;
    }

    report.finished_at = Some(Utc::now());

    let status = match &result {
        Ok(()) if report.aborted => RunStatus::Aborted,
        Ok(()) => RunStatus::Completed,
        Err(_) => RunStatus::Aborted,
    };

    match result {
        Ok(()) => {
            storage.finish_run(
                run_id,
                status,
                report.visited as i64,
                report.valid as i64,
                report.automoto as i64,
            )?;
            tracing::info!(
                "Run {} finished: {} visited, {} valid, {} auto-moto",
                run_id,
                report.visited,
                report.valid,
                report.automoto
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!("Run {} aborted: {}", run_id, e);
            // Best-effort: the original failure is the one worth surfacing
            let _ = storage.finish_run(
                run_id,
                RunStatus::Aborted,
                report.visited as i64,
                report.valid as i64,
                report.automoto as i64,
            );
            Err(e)
        }
    }
}

/// Builds the tunnel supervisor when the run wants one
fn setup_tunnels(
    config: &Config,
    opts: &RunOptions,
) -> Result<Option<TunnelSupervisor>> {
    if opts.mode != RunMode::Tunnel || !opts.use_tunnels {
        return Ok(None);
    }

    let Some(path) = config.tunnel_config_path.as_ref() else {
        tracing::warn!("Tunnel mode requested but TUNNEL_CONFIG is not set; running direct");
        return Ok(None);
    };

    let entries = load_tunnel_config(path)?;
    if entries.is_empty() {
        tracing::warn!("Tunnel config {} has no entries; running direct", path.display());
        return Ok(None);
    }

    Ok(Some(TunnelSupervisor::new(entries)))
}

/// The main store loop
async fn scrape_all(
    config: &Config,
    storage: &mut dyn Storage,
    driver: &mut dyn PageDriver,
    mut tunnels: Option<&mut TunnelSupervisor>,
    opts: &mut RunOptions,
    report: &mut RunReport,
) -> Result<()> {
    // Step 1: sitemap ingest when the registry is empty or stale
    if should_ingest(config, storage)? {
        let client = build_sitemap_client()?;
        let fetcher = HttpSitemapFetcher::new(client);
        match ingest(&fetcher, &config.sitemap_index_url, storage).await {
            Ok(ingest_report) => {
                report.ingest = Some(ingest_report);
            }
            Err(e) => {
                tracing::warn!("Sitemap ingest failed: {}; falling back to known URLs", e);
                report.errors.push(format!("sitemap ingest: {}", e));
            }
        }
    } else {
        tracing::info!("Registry is fresh; skipping sitemap ingest");
    }

    // Step 2: choose the URL list, least-recently-scraped first
    let urls = storage.list_to_scrape(opts.max_stores)?;
    if urls.is_empty() {
        return Err(TrackerError::Aborted(
            "no store URLs known; sitemap ingest produced nothing".to_string(),
        ));
    }
    tracing::info!("Scraping {} stores", urls.len());

    // Step 3: establish the first tunnel, or degrade to direct
    let mut proxy: Option<String> = None;
    if let Some(supervisor) = tunnels.as_deref_mut() {
        match supervisor.establish_first().await {
            Ok(endpoint) => {
                proxy = Some(endpoint.socks_url());
                driver.rebuild(proxy.clone()).await?;
            }
            Err(e) if opts.strict_tunnels => {
                return Err(TrackerError::Aborted(format!(
                    "strict tunnel mode and no tunnel available: {}",
                    e
                )));
            }
            Err(e) => {
                tracing::warn!("No tunnel available ({}); continuing without proxy", e);
                report.errors.push(format!("tunnel: {}", e));
            }
        }
    }

    // Step 4: the store loop
    let break_period = pick_break_period(&mut rand::thread_rng());
    tracing::debug!("Extended break every {} stores", break_period);

    let mut consecutive_failures = 0u32;

    for (i, url) in urls.iter().enumerate() {
        if opts.cancel.is_cancelled() {
            tracing::info!("Cancellation requested; stopping after {} stores", i);
            report.aborted = true;
            break;
        }

        if i > 0 {
            opts.pacer.pause(Situation::StoreVisit).await;

            if i as u32 % break_period == 0 {
                tracing::info!("Extended break after {} stores", i);
                opts.pacer.pause(Situation::ExtendedBreak).await;

                if let Some(supervisor) = tunnels.as_deref_mut() {
                    proxy = rotate_proxy(supervisor, driver, report).await?;
                }
            }
        }

        // Health contract: probe the tunnel before each use, rotate once
        // if it has gone bad
        if proxy.is_some() {
            if let Some(supervisor) = tunnels.as_deref_mut() {
                let healthy = matches!(
                    supervisor.current().await,
                    Some(endpoint) if endpoint.status == TunnelStatus::Up
                );
                if !healthy {
                    tracing::warn!("Current tunnel failed its probe; rotating");
                    proxy = rotate_proxy(supervisor, driver, report).await?;
                }
            }
        }

        let visit_start = std::time::Instant::now();
        let outcome = {
            let mut scraper = if opts.mode.counts_flags() {
                StoreScraper::new(
                    driver,
                    &opts.pacer,
                    config.target_category_id,
                    opts.cancel.clone(),
                )
            } else {
                StoreScraper::basic(
                    driver,
                    &opts.pacer,
                    config.target_category_id,
                    opts.cancel.clone(),
                )
            };
            scraper.scrape(url).await
        };

        // Persistence: registry upsert and ledger append share one transaction
        if outcome.is_valid {
            storage.record_outcome(url, &outcome, opts.mode.writes_snapshots())?;
        } else {
            storage.mark_invalid(url)?;
        }

        report.visited += 1;
        if outcome.is_valid {
            report.valid += 1;
            report.new_vehicles += outcome.new as u64;
            report.used_vehicles += outcome.used as u64;
            report.test_vehicles += outcome.test as u64;
            report.total_vehicles += outcome.total() as u64;
        }
        if outcome.is_automoto {
            report.automoto += 1;
        }

        tracing::info!(
            url = url.as_str(),
            valid = outcome.is_valid,
            automoto = outcome.is_automoto,
            new = outcome.new,
            used = outcome.used,
            test = outcome.test,
            elapsed_ms = visit_start.elapsed().as_millis() as u64,
            proxy = proxy.as_deref().unwrap_or("direct"),
            "store visited"
        );

        opts.pacer.record_store_scraped();

        // Resource recovery: repeated invalid visits usually mean the
        // browser or the egress IP has gone bad
        if outcome.is_valid {
            consecutive_failures = 0;
        } else {
            consecutive_failures += 1;
            if consecutive_failures >= REBUILD_AFTER_FAILURES {
                tracing::warn!(
                    "{} consecutive invalid visits; rebuilding driver",
                    consecutive_failures
                );
                if let Some(supervisor) = tunnels.as_deref_mut() {
                    proxy = rotate_proxy(supervisor, driver, report).await?;
                } else {
                    driver.rebuild(proxy.clone()).await?;
                }
                consecutive_failures = 0;
            }
        }
    }

    report.proxy_active = proxy.is_some();
    Ok(())
}

/// Rotates to the next tunnel and rebuilds the driver against it
///
/// A failed rotation degrades to a direct connection, logged at warn level.
async fn rotate_proxy(
    supervisor: &mut TunnelSupervisor,
    driver: &mut dyn PageDriver,
    report: &mut RunReport,
) -> Result<Option<String>> {
    match supervisor.rotate().await {
        Ok(endpoint) => {
            let proxy = endpoint.socks_url();
            tracing::info!("Rotated tunnel; proxy now {}", proxy);
            driver.rebuild(Some(proxy.clone())).await?;
            Ok(Some(proxy))
        }
        Err(e) => {
            tracing::warn!("Tunnel rotation failed ({}); continuing without proxy", e);
            report.errors.push(format!("rotation: {}", e));
            driver.rebuild(None).await?;
            Ok(None)
        }
    }
}

/// Decides whether this run should re-ingest the sitemap
///
/// True when the registry is empty or its newest row is older than the
/// configured staleness window.
fn should_ingest(config: &Config, storage: &dyn Storage) -> Result<bool> {
    if storage.count_stores()? == 0 {
        return Ok(true);
    }

    match storage.newest_update()? {
        None => Ok(true),
        Some(newest) => {
            let age = Utc::now() - newest;
            Ok(age > ChronoDuration::days(config.staleness_days))
        }
    }
}
