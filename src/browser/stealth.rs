//! Stealth posture applied at driver construction
//!
//! Fingerprint randomisation and automation-indicator removal. The scripts
//! are injected once per page load; selectors and properties they touch are
//! the ones bot-detection vendors are known to check.

use rand::seq::SliceRandom;
use rand::Rng;

/// Pool of real browser user-agent strings
pub const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
];

/// Picks a random user agent from the pool
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Picks a random viewport within a realistic desktop range
pub fn random_viewport() -> (u32, u32) {
    let mut rng = rand::thread_rng();
    (rng.gen_range(1366..=1920), rng.gen_range(768..=1080))
}

/// Scripts that unset automation indicators on the global object
pub const STEALTH_SCRIPTS: &[&str] = &[
    // Remove the webdriver property
    r#"
    Object.defineProperty(navigator, 'webdriver', {
        get: () => undefined,
        configurable: true
    });
    "#,
    // A real Chrome exposes window.chrome
    r#"
    window.chrome = {
        runtime: {},
        loadTimes: function() {},
        csi: function() {},
        app: {}
    };
    "#,
    // Plugin list of a regular Chrome install
    r#"
    Object.defineProperty(navigator, 'plugins', {
        get: () => [
            { name: 'Chrome PDF Plugin', filename: 'internal-pdf-viewer', description: 'Portable Document Format' },
            { name: 'Chrome PDF Viewer', filename: 'mhjfbmdgcfjbbpaeojofohoefgiehjai', description: '' },
            { name: 'Native Client', filename: 'internal-nacl-plugin', description: '' }
        ],
        configurable: true
    });
    "#,
    // Croatian site, Croatian-first language list
    r#"
    Object.defineProperty(navigator, 'languages', {
        get: () => ['hr-HR', 'hr', 'en-US', 'en'],
        configurable: true
    });
    "#,
    // ChromeDriver leaves these behind
    r#"
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Array;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Promise;
    delete window.cdc_adoQpoasnfa76pfcZLmcfl_Symbol;
    "#,
];
