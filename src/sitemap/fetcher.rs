//! Sitemap HTTP fetching
//!
//! Plain reqwest client with retry logic and transparent gzip handling for
//! `.xml.gz` leaves. Sitemap traffic is low-volume and innocuous, so it does
//! not go through the browser or the tunnels.

use crate::sitemap::SitemapError;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::Client;
use std::io::Read;
use std::time::Duration;

/// Gzip magic bytes, checked when the URL extension is inconclusive
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Retry delays for transient fetch failures (linear backoff)
const RETRY_DELAYS: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(8),
];

/// Builds the HTTP client used for sitemap fetches
///
/// A browser-like user agent keeps the sitemap endpoints from serving the
/// degraded bot variant of the responses.
pub fn build_sitemap_client() -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(
            "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
             Chrome/120.0.0.0 Safari/537.36",
        )
        .timeout(Duration::from_secs(20))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .build()
}

/// Abstraction over fetching raw sitemap bytes
///
/// The production implementation goes over HTTP; tests supply an in-memory
/// map so the whole ingest path runs without a network.
#[async_trait]
pub trait SitemapFetch: Send + Sync {
    /// Fetches the raw response body for a sitemap URL
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SitemapError>;
}

/// HTTP-backed sitemap fetcher with retries
pub struct HttpSitemapFetcher {
    client: Client,
}

impl HttpSitemapFetcher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>, SitemapError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(SitemapError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }

    /// Whether a failure is worth retrying (5xx and transport errors are,
    /// 4xx are not)
    fn is_retryable(error: &SitemapError) -> bool {
        match error {
            SitemapError::Status { status, .. } => *status >= 500,
            SitemapError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

#[async_trait]
impl SitemapFetch for HttpSitemapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, SitemapError> {
        for (attempt, delay) in RETRY_DELAYS.iter().enumerate() {
            match self.fetch_once(url).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) if Self::is_retryable(&e) => {
                    tracing::debug!(
                        "Sitemap fetch attempt {} failed for {}: {}, retrying in {:?}",
                        attempt + 1,
                        url,
                        e,
                        delay
                    );
                    tokio::time::sleep(*delay).await;
                }
                Err(e) => return Err(e),
            }
        }

        // Final attempt after the last backoff
        self.fetch_once(url).await
    }
}

/// Decodes a fetched sitemap body into XML text
///
/// Gzip is detected by the `.gz` extension first, then by magic bytes, so
/// mislabeled leaves still decompress. Plain bodies pass through as UTF-8
/// (lossily, to survive stray bytes in otherwise-fine XML).
pub fn decode_body(url: &str, bytes: &[u8]) -> Result<String, SitemapError> {
    if bytes.starts_with(&GZIP_MAGIC) {
        let mut decoder = GzDecoder::new(bytes);
        let mut xml = String::new();
        decoder
            .read_to_string(&mut xml)
            .map_err(|e| SitemapError::Gzip {
                url: url.to_string(),
                source: e,
            })?;
        return Ok(xml);
    }

    if url.ends_with(".gz") {
        tracing::debug!("{} has a .gz extension but a plain payload", url);
    }

    Ok(String::from_utf8_lossy(bytes).into_owned())
}
