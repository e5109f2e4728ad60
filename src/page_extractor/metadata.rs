//! `<head>` metadata extraction

use std::collections::HashMap;
use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::schema::PageMetadata;

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("meta[content]").expect("META_SELECTOR: hardcoded selector is valid"));
static TITLE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("title").expect("TITLE_SELECTOR: hardcoded selector is valid"));
static HTML_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("html").expect("HTML_SELECTOR: hardcoded selector is valid"));

#[must_use]
pub fn extract_metadata(html: &str, source_url: &str, status_code: u16) -> PageMetadata {
    let document = Html::parse_document(html);
    extract_metadata_from_document(&document, source_url, status_code)
}

pub(crate) fn extract_metadata_from_document(
    document: &Html,
    source_url: &str,
    status_code: u16,
) -> PageMetadata {
    // name= and property= share one namespace; first occurrence wins
    let mut meta: HashMap<String, String> = HashMap::new();
    for element in document.select(&META_SELECTOR) {
        let attrs = element.value();
        let Some(key) = attrs.attr("name").or_else(|| attrs.attr("property")) else {
            continue;
        };
        let content = attrs.attr("content").unwrap_or_default().trim();
        if content.is_empty() {
            continue;
        }
        meta.entry(key.trim().to_ascii_lowercase())
            .or_insert_with(|| content.to_string());
    }
    let get = |key: &str| meta.get(key).cloned();

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|t| t.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty());

    let language = document
        .select(&HTML_SELECTOR)
        .next()
        .and_then(|h| h.value().attr("lang"))
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unwrap_or("en")
        .to_string();

    PageMetadata {
        title,
        description: get("description").or_else(|| get("og:description")),
        language,
        keywords: get("keywords"),
        author: get("author"),
        og_title: get("og:title"),
        og_description: get("og:description"),
        og_image: get("og:image"),
        og_url: get("og:url"),
        og_type: get("og:type"),
        og_site_name: get("og:site_name"),
        twitter_card: get("twitter:card"),
        twitter_title: get("twitter:title"),
        twitter_description: get("twitter:description"),
        twitter_image: get("twitter:image"),
        source_url: source_url.to_string(),
        status_code,
    }
}
