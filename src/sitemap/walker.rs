//! Sitemap tree walker
//!
//! Drives the fetch + parse pipeline over the sitemap index tree and seeds
//! newly discovered store URLs into the registry.

use crate::sitemap::fetcher::{decode_body, SitemapFetch};
use crate::sitemap::parser::{filter_store_urls, parse_sitemap, prioritize_children};
use crate::sitemap::SitemapError;
use crate::storage::Storage;
use crate::url::normalize_store_url;
use std::collections::{BTreeSet, HashSet, VecDeque};

/// Maximum nesting depth walked below the root index
///
/// The real tree is root index → stores index → leaf files; one spare level
/// keeps an unexpected extra layer from being silently dropped.
const MAX_DEPTH: u32 = 3;

/// Outcome of one sitemap ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Unique store URLs found under the index
    pub discovered: u64,

    /// Store URLs that were new to the registry
    pub inserted: u64,

    /// Store URLs that were already known (discovered − inserted)
    pub skipped: u64,
}

/// Walks the sitemap tree from the root index and seeds store URLs into the registry
///
/// Child sitemaps whose URL carries a store token are walked first. A child
/// that fails to fetch or parse is logged and skipped; the ingest as a whole
/// fails only when the root is unusable or no store URL is found anywhere.
///
/// # Arguments
///
/// * `fetcher` - Transport for raw sitemap bytes
/// * `root_index_url` - The root sitemap index URL
/// * `storage` - Registry to seed discovered URLs into
///
/// # Returns
///
/// * `Ok(IngestReport)` - At least one store URL was discovered
/// * `Err(SitemapError)` - Root unusable or zero store URLs in the whole tree
pub async fn ingest(
    fetcher: &dyn SitemapFetch,
    root_index_url: &str,
    storage: &mut dyn Storage,
) -> Result<IngestReport, SitemapError> {
    tracing::info!("Ingesting sitemap index from {}", root_index_url);

    let root_bytes = fetcher.fetch(root_index_url).await?;
    let root_xml = decode_body(root_index_url, &root_bytes)?;
    let root = parse_sitemap(&root_xml);

    if root.children.is_empty() && root.urls.is_empty() {
        return Err(SitemapError::Unparseable(format!(
            "root index {} yielded no entries",
            root_index_url
        )));
    }

    let mut found: BTreeSet<String> = BTreeSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(root_index_url.to_string());

    // The root may itself be a urlset in degenerate setups
    collect_stores(&root.urls, &mut found);

    let mut queue: VecDeque<(String, u32)> = prioritize_children(root.children)
        .into_iter()
        .map(|url| (url, 1))
        .collect();

    while let Some((url, depth)) = queue.pop_front() {
        if depth > MAX_DEPTH || !visited.insert(url.clone()) {
            continue;
        }

        let bytes = match fetcher.fetch(&url).await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Skipping child sitemap {}: {}", url, e);
                continue;
            }
        };

        let xml = match decode_body(&url, &bytes) {
            Ok(xml) => xml,
            Err(e) => {
                tracing::warn!("Skipping child sitemap {}: {}", url, e);
                continue;
            }
        };

        let parsed = parse_sitemap(&xml);
        collect_stores(&parsed.urls, &mut found);

        for child in prioritize_children(parsed.children) {
            queue.push_back((child, depth + 1));
        }
    }

    if found.is_empty() {
        return Err(SitemapError::NoStoreUrls);
    }

    let urls: Vec<String> = found.into_iter().collect();
    let discovered = urls.len() as u64;
    let inserted = storage
        .seed_new(&urls)
        .map_err(|e| SitemapError::Storage(e.to_string()))?;

    let report = IngestReport {
        discovered,
        inserted,
        skipped: discovered - inserted,
    };

    tracing::info!(
        "Sitemap ingest complete: {} discovered, {} new, {} already known",
        report.discovered,
        report.inserted,
        report.skipped
    );

    Ok(report)
}

/// Filters, normalizes, and accumulates store URLs from a leaf
fn collect_stores(urls: &[String], found: &mut BTreeSet<String>) {
    for url in filter_store_urls(urls) {
        match normalize_store_url(&url) {
            Ok(canonical) => {
                found.insert(canonical);
            }
            Err(e) => {
                tracing::debug!("Dropping malformed store URL {}: {}", url, e);
            }
        }
    }
}
