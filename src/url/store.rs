/// Path segment identifying a dealer-store page on the target site
///
/// "Trgovina" is Croatian for "store"; every dealer page lives under it.
pub const STORE_PATH_SEGMENT: &str = "/trgovina/";

/// Checks whether a URL points at a dealer-store page
///
/// # Examples
///
/// ```
/// use njuskalo_tracker::url::is_store_url;
///
/// assert!(is_store_url("https://www.njuskalo.hr/trgovina/auto-kuca-horvat"));
/// assert!(!is_store_url("https://www.njuskalo.hr/auti/bmw-320d-oglas-123"));
/// ```
pub fn is_store_url(url: &str) -> bool {
    url.contains(STORE_PATH_SEGMENT)
}

/// Composes the category-filtered URL for a store page
///
/// Appending `categoryId=<id>` restricts the store's listing view to the
/// target category.
///
/// # Arguments
///
/// * `store_url` - Canonical store URL (no query string)
/// * `category_id` - The numeric category id to filter by
pub fn compose_category_url(store_url: &str, category_id: u32) -> String {
    format!("{}?categoryId={}", store_url, category_id)
}

/// Composes the URL for a specific page of a store's category-filtered listings
///
/// Page 1 is the plain category URL; the `page` parameter is only added for
/// later pages, matching how the site itself links its pagination.
///
/// # Arguments
///
/// * `store_url` - Canonical store URL (no query string)
/// * `category_id` - The numeric category id to filter by
/// * `page` - 1-based page number
pub fn compose_page_url(store_url: &str, category_id: u32, page: u32) -> String {
    if page <= 1 {
        compose_category_url(store_url, category_id)
    } else {
        format!("{}?categoryId={}&page={}", store_url, category_id, page)
    }
}
