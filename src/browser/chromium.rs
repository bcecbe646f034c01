//! Chromium driver backend
//!
//! Drives headless Chromium over CDP with the stealth posture applied at
//! construction. One driver exists per run; pages are opened fresh per
//! navigation and closed afterwards to avoid tab accumulation.

use crate::browser::stealth::{random_user_agent, random_viewport, STEALTH_SCRIPTS};
use crate::browser::{DriverError, PageDriver};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::time::Duration;

/// Common Chromium executable locations
const CHROME_PATHS: &[&str] = &[
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
];

/// Selectors for the GDPR consent button, tried in order
const CONSENT_SELECTORS: &[&str] = &[
    "#didomi-notice-agree-button",
    "button[id*='agree']",
    ".gdpr-consent-accept",
];

/// Driver configuration, fixed at construction
///
/// The stealth identity (user agent, viewport) is chosen once per driver so
/// every page load within one session presents the same fingerprint. A
/// rotation of the proxy requires a rebuild with a fresh config.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Run without a visible window
    pub headless: bool,

    /// SOCKS proxy URL, e.g. `socks5://127.0.0.1:1080`
    pub proxy: Option<String>,

    /// X display number for non-headless operation
    pub display_num: Option<u32>,

    /// User agent presented by this driver
    pub user_agent: String,

    /// Window size presented by this driver
    pub viewport: (u32, u32),
}

impl DriverConfig {
    /// Builds a config with a freshly randomized fingerprint
    pub fn stealth(headless: bool, proxy: Option<String>, display_num: Option<u32>) -> Self {
        Self {
            headless,
            proxy,
            display_num,
            user_agent: random_user_agent().to_string(),
            viewport: random_viewport(),
        }
    }
}

/// Chromium-backed page driver
pub struct ChromiumDriver {
    config: DriverConfig,
    browser: Option<Browser>,
    page: Option<Page>,
}

impl ChromiumDriver {
    /// Creates a driver; the browser itself launches lazily on first use
    pub fn new(config: DriverConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
        }
    }

    fn find_chrome() -> Result<std::path::PathBuf, DriverError> {
        for path in CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                return Ok(p.to_path_buf());
            }
        }

        for cmd in ["google-chrome", "google-chrome-stable", "chromium", "chromium-browser"] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(DriverError::Launch(
            "Chromium not found; install chromium or google-chrome".to_string(),
        ))
    }

    async fn ensure_browser(&mut self) -> Result<(), DriverError> {
        if self.browser.is_some() {
            return Ok(());
        }

        if let Some(display) = self.config.display_num {
            std::env::set_var("DISPLAY", format!(":{}", display));
        }

        tracing::info!(
            "Launching browser (headless={}, proxy={:?}, viewport={}x{})",
            self.config.headless,
            self.config.proxy,
            self.config.viewport.0,
            self.config.viewport.1
        );

        let chrome_path = Self::find_chrome()?;

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .window_size(self.config.viewport.0, self.config.viewport.1);

        if !self.config.headless {
            builder = builder.with_head();
        }

        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer");

        let config = builder
            .build()
            .map_err(|e| DriverError::Launch(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| DriverError::Launch(e.to_string()))?;

        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        self.browser = Some(browser);
        Ok(())
    }

    async fn drop_page(&mut self) {
        if let Some(page) = self.page.take() {
            let _ = page.close().await;
        }
    }

    /// Applies stealth scripts to the current page, best-effort
    async fn apply_stealth(page: &Page) {
        for script in STEALTH_SCRIPTS {
            if let Err(e) = page.evaluate(script.to_string()).await {
                tracing::debug!("Stealth script injection skipped: {}", e);
            }
        }
    }
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn open(&mut self, url: &str, timeout: Duration) -> Result<(), DriverError> {
        self.ensure_browser().await?;
        self.drop_page().await;

        let browser = self.browser.as_ref().ok_or(DriverError::NoPage)?;
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| DriverError::Cdp(e.to_string()))?;

        page.execute(SetUserAgentOverrideParams::new(
            self.config.user_agent.clone(),
        ))
        .await
        .map_err(|e| DriverError::Cdp(e.to_string()))?;

        let nav = NavigateParams::builder()
            .url(url)
            .build()
            .map_err(|e| DriverError::Navigation {
                url: url.to_string(),
                message: e,
            })?;

        page.execute(nav).await.map_err(|e| DriverError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        // Wait for readyState instead of a fixed pause; the fallback timeout
        // inside the script covers pages whose load event never fires.
        let ready_script = r#"
            new Promise((resolve) => {
                if (document.readyState === 'complete' || document.readyState === 'interactive') {
                    resolve(document.readyState);
                } else {
                    document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
                    setTimeout(() => resolve('timeout'), 10000);
                }
            })
        "#;

        match tokio::time::timeout(timeout, page.evaluate(ready_script.to_string())).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                tracing::debug!("Could not check ready state for {}: {}", url, e);
            }
            Err(_) => {
                let _ = page.close().await;
                return Err(DriverError::Timeout {
                    url: url.to_string(),
                });
            }
        }

        Self::apply_stealth(&page).await;

        // Short settle for late-rendering listing tiles
        tokio::time::sleep(Duration::from_millis(500)).await;

        self.page = Some(page);
        Ok(())
    }

    async fn source(&mut self) -> Result<String, DriverError> {
        let page = self.page.as_ref().ok_or(DriverError::NoPage)?;
        page.content()
            .await
            .map_err(|e| DriverError::Cdp(e.to_string()))
    }

    async fn exists(&mut self, css: &str) -> Result<bool, DriverError> {
        let page = self.page.as_ref().ok_or(DriverError::NoPage)?;
        Ok(page.find_element(css).await.is_ok())
    }

    async fn dismiss_consent(&mut self) {
        let Some(page) = self.page.as_ref() else {
            return;
        };

        for selector in CONSENT_SELECTORS {
            if let Ok(element) = page.find_element(*selector).await {
                match element.click().await {
                    Ok(_) => {
                        tracing::debug!("Dismissed consent dialog via {}", selector);
                        return;
                    }
                    Err(e) => {
                        tracing::debug!("Consent click failed on {}: {}", selector, e);
                    }
                }
            }
        }
    }

    async fn rebuild(&mut self, proxy: Option<String>) -> Result<(), DriverError> {
        tracing::info!("Rebuilding browser driver (proxy={:?})", proxy);
        self.close().await;
        // Fresh fingerprint for the fresh browser
        self.config.proxy = proxy;
        self.config.user_agent = random_user_agent().to_string();
        self.config.viewport = random_viewport();
        self.ensure_browser().await
    }

    async fn close(&mut self) {
        self.drop_page().await;
        if let Some(mut browser) = self.browser.take() {
            let _ = browser.close().await;
        }
    }
}
