//! Content extraction from rendered HTML
//!
//! Everything here works on the serialized DOM returned by the browser, so
//! the same functions serve live pages and fixtures.

pub mod links;
pub mod markdown;
pub mod media;
pub mod metadata;
pub mod schema;

use scraper::Html;

pub use links::extract_links;
pub use markdown::{EXTRACTION_METHOD, html_to_markdown, visible_text};
pub use media::extract_media;
pub use metadata::extract_metadata;
pub use schema::{MediaItem, MediaKind, PageMetadata};

/// A document parsed once and queried for several formats
pub struct ParsedPage {
    document: Html,
    url: String,
}

impl ParsedPage {
    #[must_use]
    pub fn parse(html: &str, url: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            url: url.to_string(),
        }
    }

    #[must_use]
    pub fn links(&self) -> Vec<String> {
        links::extract_links_from_document(&self.document, &self.url)
    }

    #[must_use]
    pub fn metadata(&self, status_code: u16) -> PageMetadata {
        metadata::extract_metadata_from_document(&self.document, &self.url, status_code)
    }

    #[must_use]
    pub fn media(&self) -> Vec<MediaItem> {
        media::extract_media_from_document(&self.document, &self.url)
    }

    #[must_use]
    pub fn visible_text(&self) -> String {
        markdown::visible_text_from_document(&self.document)
    }
}
