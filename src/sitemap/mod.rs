//! Sitemap ingestion module
//!
//! Walks the site's sitemap index tree, transparently decompresses gzipped
//! leaves, extracts dealer-store URLs, and seeds them into the registry.
//! Uses a plain HTTP client, never the browser.

mod fetcher;
mod parser;
mod walker;

pub use fetcher::{build_sitemap_client, decode_body, HttpSitemapFetcher, SitemapFetch};
pub use parser::{filter_store_urls, parse_sitemap, prioritize_children, ParsedSitemap};
pub use walker::{ingest, IngestReport};

use thiserror::Error;

/// Errors that can occur during sitemap ingestion
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} fetching {url}")]
    Status { url: String, status: u16 },

    #[error("Failed to decompress {url}: {source}")]
    Gzip {
        url: String,
        source: std::io::Error,
    },

    #[error("Sitemap XML unparseable: {0}")]
    Unparseable(String),

    #[error("No store URLs found under the sitemap index")]
    NoStoreUrls,

    #[error("Storage error during ingest: {0}")]
    Storage(String),
}
