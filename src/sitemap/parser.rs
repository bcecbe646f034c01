//! Sitemap XML parsing
//!
//! Strict event-based parsing with a regex fallback: the site occasionally
//! serves sitemaps with stray bytes that break an XML parser but still carry
//! perfectly good `<loc>` values.

use crate::sitemap::SitemapError;
use crate::url::is_store_url;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;

/// Result of parsing one sitemap document
#[derive(Debug, Default)]
pub struct ParsedSitemap {
    /// `<sitemap><loc>` entries: child sitemaps to walk
    pub children: Vec<String>,

    /// `<url><loc>` entries: page URLs in a leaf
    pub urls: Vec<String>,
}

/// Tokens marking store-related child sitemaps, processed with priority
const STORE_TOKENS: &[&str] = &["trgovina", "stores", "store"];

/// Parses a sitemap document, handling both `<sitemapindex>` and `<urlset>`
///
/// Falls back to a `<loc>` regex scan when strict parsing fails; in that
/// case entries are classified by shape (store path → url, `.xml`/`.xml.gz`
/// suffix → child).
///
/// # Arguments
///
/// * `xml` - The decoded XML text
pub fn parse_sitemap(xml: &str) -> ParsedSitemap {
    match parse_strict(xml) {
        Ok(parsed) if !parsed.children.is_empty() || !parsed.urls.is_empty() => parsed,
        // A clean parse with nothing in it usually means the markup was not
        // really a sitemap; the regex scan still salvages stray locs.
        Ok(_) => parse_fallback(xml),
        Err(e) => {
            tracing::warn!("Strict sitemap parse failed ({}), using regex fallback", e);
            parse_fallback(xml)
        }
    }
}

/// Event-based parse of a sitemap document
fn parse_strict(xml: &str) -> Result<ParsedSitemap, SitemapError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut parsed = ParsedSitemap::default();
    let mut buf = Vec::new();

    let mut in_url = false;
    let mut in_sitemap = false;
    let mut in_loc = false;
    let mut current_loc = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                match e.local_name().as_ref() {
                    b"url" => {
                        in_url = true;
                        current_loc.clear();
                    }
                    b"sitemap" => {
                        in_sitemap = true;
                        current_loc.clear();
                    }
                    b"loc" => in_loc = true,
                    _ => {}
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"url" => {
                    if in_url && !current_loc.is_empty() {
                        parsed.urls.push(current_loc.clone());
                    }
                    in_url = false;
                }
                b"sitemap" => {
                    if in_sitemap && !current_loc.is_empty() {
                        parsed.children.push(current_loc.clone());
                    }
                    in_sitemap = false;
                }
                b"loc" => in_loc = false,
                _ => {}
            },
            Ok(Event::Text(e)) => {
                if in_loc && (in_url || in_sitemap) {
                    let text = e.unescape().unwrap_or_default();
                    current_loc = text.trim().to_string();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(SitemapError::Unparseable(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(parsed)
}

/// Regex fallback: pull every `<loc>` value and classify by shape
fn parse_fallback(xml: &str) -> ParsedSitemap {
    let mut parsed = ParsedSitemap::default();

    let loc_re = match Regex::new(r"<loc>\s*([^<\s][^<]*?)\s*</loc>") {
        Ok(re) => re,
        Err(_) => return parsed,
    };

    for capture in loc_re.captures_iter(xml) {
        let loc = capture[1].to_string();
        if is_store_url(&loc) {
            parsed.urls.push(loc);
        } else if loc.ends_with(".xml") || loc.ends_with(".xml.gz") {
            parsed.children.push(loc);
        } else {
            parsed.urls.push(loc);
        }
    }

    parsed
}

/// Orders child sitemaps so store-related ones are walked first
pub fn prioritize_children(children: Vec<String>) -> Vec<String> {
    let (mut store_related, other): (Vec<String>, Vec<String>) =
        children.into_iter().partition(|url| {
            let lower = url.to_lowercase();
            STORE_TOKENS.iter().any(|token| lower.contains(token))
        });
    store_related.extend(other);
    store_related
}

/// Retains only dealer-store URLs from a leaf's entries
pub fn filter_store_urls(urls: &[String]) -> Vec<String> {
    urls.iter()
        .filter(|url| is_store_url(url))
        .cloned()
        .collect()
}
