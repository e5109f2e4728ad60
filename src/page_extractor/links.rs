//! Outbound link extraction

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};
use url::Url;

static ANCHOR_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("ANCHOR_SELECTOR: hardcoded selector is valid"));

/// Extract absolute http(s) links from `<a href>` in document order.
///
/// Relative links resolve against `base_url` (or `<base href>` when present),
/// fragments are dropped and duplicates removed keeping the first occurrence.
#[must_use]
pub fn extract_links(html: &str, base_url: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    extract_links_from_document(&document, base_url)
}

pub(crate) fn extract_links_from_document(document: &Html, base_url: &str) -> Vec<String> {
    let Ok(page_base) = Url::parse(base_url) else {
        return Vec::new();
    };
    let base = document_base(document, &page_base).unwrap_or(page_base);

    let mut seen = HashSet::new();
    let mut links = Vec::new();

    for element in document.select(&ANCHOR_SELECTOR) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };

        // Skip empty, javascript:, mailto:, tel:, and fragment-only links
        let href = href.trim();
        if href.is_empty()
            || href.starts_with('#')
            || href.starts_with("javascript:")
            || href.starts_with("mailto:")
            || href.starts_with("tel:")
        {
            continue;
        }

        let Ok(mut resolved) = base.join(href) else {
            continue;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            continue;
        }
        resolved.set_fragment(None);

        let link = resolved.to_string();
        if seen.insert(link.clone()) {
            links.push(link);
        }
    }

    links
}

fn document_base(document: &Html, page_base: &Url) -> Option<Url> {
    static BASE_SELECTOR: LazyLock<Selector> =
        LazyLock::new(|| Selector::parse("base[href]").expect("BASE_SELECTOR: hardcoded selector is valid"));

    let href = document
        .select(&BASE_SELECTOR)
        .next()?
        .value()
        .attr("href")?;
    page_base.join(href.trim()).ok()
}
