use crate::url::store::STORE_PATH_SEGMENT;
use crate::url::{UrlError, UrlResult};
use url::Url;

/// Normalizes a store URL into its canonical registry form
///
/// The registry keys stores by URL, so every sighting of the same store must
/// normalize to the same string.
///
/// # Normalization steps
///
/// 1. Parse the URL; reject if malformed or non-http(s)
/// 2. Lowercase the host
/// 3. Reject URLs whose path is not under the store segment
/// 4. Remove the fragment
/// 5. Remove the query string (category filters are appended at scrape time)
/// 6. Remove the trailing slash (except for the root `/`)
///
/// # Arguments
///
/// * `url_str` - The URL string to normalize
///
/// # Returns
///
/// * `Ok(String)` - The canonical URL string
/// * `Err(UrlError)` - Malformed, wrong scheme, or not a store page
///
/// # Examples
///
/// ```
/// use njuskalo_tracker::url::normalize_store_url;
///
/// let url = normalize_store_url("https://WWW.NJUSKALO.HR/trgovina/auto-kuca-horvat/").unwrap();
/// assert_eq!(url, "https://www.njuskalo.hr/trgovina/auto-kuca-horvat");
/// ```
pub fn normalize_store_url(url_str: &str) -> UrlResult<String> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .ok_or(UrlError::MissingDomain)?
        .to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;

    // The store segment must be in the path proper; a listing that merely
    // mentions it in its query string is not a store page
    if !url.path().contains(STORE_PATH_SEGMENT) {
        return Err(UrlError::NotAStore(url_str.trim().to_string()));
    }

    url.set_fragment(None);
    url.set_query(None);

    let mut result = url.to_string();
    if result.ends_with('/') && url.path() != "/" {
        result.pop();
    }

    Ok(result)
}
