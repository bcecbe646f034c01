//! Pacing controller
//!
//! Produces context-aware delays that keep request cadence looking human:
//! triangular jitter per situation, a progressive slowdown as the run gets
//! longer, occasional stealth pauses, and periodic extended breaks. All
//! timing lives here so the scraper itself stays deterministic under test.

use async_trait::async_trait;
use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Named situations with enumerated delay profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Situation {
    /// Main gap between two store visits
    StoreVisit,

    /// Between opening a URL and starting extraction
    PageLoad,

    /// Between extracting consecutive fields
    DataExtract,

    /// Between paginated requests for one store
    Pagination,

    /// After any thrown transport or scrape error
    ErrorRecovery,

    /// Long pause inserted every N stores to break cadence
    ExtendedBreak,
}

/// Delay profile in seconds: triangular when `mode` is given, uniform otherwise
#[derive(Debug, Clone, Copy)]
struct DelayProfile {
    min: f64,
    mode: Option<f64>,
    max: f64,
}

impl Situation {
    fn profile(&self) -> DelayProfile {
        match self {
            Self::StoreVisit => DelayProfile {
                min: 8.0,
                mode: Some(12.0),
                max: 20.0,
            },
            Self::PageLoad => DelayProfile {
                min: 2.0,
                mode: Some(3.0),
                max: 5.0,
            },
            Self::DataExtract => DelayProfile {
                min: 1.0,
                mode: Some(2.0),
                max: 3.0,
            },
            Self::Pagination => DelayProfile {
                min: 3.0,
                mode: Some(5.0),
                max: 8.0,
            },
            Self::ErrorRecovery => DelayProfile {
                min: 15.0,
                mode: None,
                max: 30.0,
            },
            Self::ExtendedBreak => DelayProfile {
                min: 30.0,
                mode: None,
                max: 90.0,
            },
        }
    }
}

/// Probability of adding an extra stealth pause to any delay
const STEALTH_PAUSE_CHANCE: f64 = 0.03;

/// Range of the extra stealth pause in seconds
const STEALTH_PAUSE_RANGE: (f64, f64) = (15.0, 45.0);

/// Computes the delay for a situation as a pure function of the inputs
///
/// The drawn value is triangular on (min, mode, max) where the profile has a
/// mode, uniform on (min, max) otherwise. It is then multiplied by the
/// progressive scale factor `1 + 0.01 × stores_scraped` and, with 3%
/// probability, extended by a uniform(15, 45) second stealth pause.
///
/// # Arguments
///
/// * `situation` - The named situation
/// * `stores_scraped` - How many stores this run has scraped so far
/// * `rng` - Random source (inject a seeded one for deterministic tests)
pub fn delay_for<R: Rng>(situation: Situation, stores_scraped: u32, rng: &mut R) -> Duration {
    let profile = situation.profile();

    let drawn = match profile.mode {
        Some(mode) => sample_triangular(profile.min, mode, profile.max, rng),
        None => rng.gen_range(profile.min..=profile.max),
    };

    let scale = 1.0 + 0.01 * stores_scraped as f64;
    let mut seconds = drawn * scale;

    if rng.gen::<f64>() < STEALTH_PAUSE_CHANCE {
        seconds += rng.gen_range(STEALTH_PAUSE_RANGE.0..=STEALTH_PAUSE_RANGE.1);
    }

    Duration::from_secs_f64(seconds)
}

/// Samples a triangular distribution on (min, mode, max) by inverse CDF
fn sample_triangular<R: Rng>(min: f64, mode: f64, max: f64, rng: &mut R) -> f64 {
    let u: f64 = rng.gen();
    let cut = (mode - min) / (max - min);
    if u < cut {
        min + (u * (max - min) * (mode - min)).sqrt()
    } else {
        max - ((1.0 - u) * (max - min) * (max - mode)).sqrt()
    }
}

/// Picks the extended-break period for a run: a break every N stores, N in [8, 15]
pub fn pick_break_period<R: Rng>(rng: &mut R) -> u32 {
    rng.gen_range(8..=15)
}

/// Abstraction over the actual act of sleeping
///
/// The production sleeper waits on the tokio clock and observes the run's
/// cancellation token; tests inject a recording fake instead.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Sleeps for the given duration, returning early on cancellation
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer, cancellable via a token
pub struct TokioSleeper {
    cancel: CancellationToken,
}

impl TokioSleeper {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.cancel.cancelled() => {}
        }
    }
}

/// Sleeper that returns immediately
///
/// For tests and dry runs where pacing would only waste wall-clock time.
pub struct InstantSleeper;

#[async_trait]
impl Sleeper for InstantSleeper {
    async fn sleep(&self, _duration: Duration) {}
}

/// Pacing controller for one run
///
/// Owns the run-so-far counter that drives the progressive slowdown and the
/// sleeper used to actually wait.
pub struct Pacer {
    stores_scraped: u32,
    sleeper: Box<dyn Sleeper>,
}

impl Pacer {
    /// Creates a pacer with the production tokio sleeper
    pub fn new(cancel: CancellationToken) -> Self {
        Self::with_sleeper(Box::new(TokioSleeper::new(cancel)))
    }

    /// Creates a pacer with an injected sleeper (for tests)
    pub fn with_sleeper(sleeper: Box<dyn Sleeper>) -> Self {
        Self {
            stores_scraped: 0,
            sleeper,
        }
    }

    /// Records that another store finished scraping
    ///
    /// Feeds the progressive scale factor.
    pub fn record_store_scraped(&mut self) {
        self.stores_scraped += 1;
    }

    /// Number of stores scraped so far this run
    pub fn stores_scraped(&self) -> u32 {
        self.stores_scraped
    }

    /// Draws a delay for the situation and sleeps it
    pub async fn pause(&self, situation: Situation) {
        let delay = delay_for(situation, self.stores_scraped, &mut rand::thread_rng());
        tracing::debug!(?situation, delay_s = delay.as_secs_f64(), "pacing sleep");
        self.sleeper.sleep(delay).await;
    }
}
