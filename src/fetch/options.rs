//! Per-fetch request and response types

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::actions::PageAction;
use crate::browser::WaitUntil;
use crate::page_extractor::{MediaItem, PageMetadata};
use crate::utils::DEFAULT_REQUEST_TIMEOUT_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Markdown,
    Html,
    Screenshot,
    Links,
    Metadata,
    Media,
}

/// Options for a single page fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchOptions {
    pub formats: Vec<OutputFormat>,
    /// Tags dropped before markdown conversion; `None` keeps the defaults
    pub exclude_tags: Option<Vec<String>>,
    pub wait_for_selector: Option<String>,
    #[serde(alias = "timeout")]
    pub timeout_ms: u64,
    pub actions: Vec<PageAction>,
    pub wait_until: WaitUntil,
    pub headers: BTreeMap<String, String>,
    pub use_proxy: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            formats: vec![OutputFormat::Markdown],
            exclude_tags: None,
            wait_for_selector: None,
            timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            actions: Vec::new(),
            wait_until: WaitUntil::default(),
            headers: BTreeMap::new(),
            use_proxy: false,
        }
    }
}

impl FetchOptions {
    #[must_use]
    pub fn wants(&self, format: OutputFormat) -> bool {
        self.formats.contains(&format)
    }

    #[must_use]
    pub fn with_formats(mut self, formats: impl IntoIterator<Item = OutputFormat>) -> Self {
        self.formats = formats.into_iter().collect();
        self
    }
}

/// Output of one fetch, restricted to the requested formats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    /// Base64 PNG of the full page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PageMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<Vec<MediaItem>>,
    /// Base64 PNGs taken by `screenshot` actions, in action order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_screenshots: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extraction_method: Option<String>,
}

/// Everything the crawl engine needs from a fetched page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub url: String,
    pub status_code: Option<u16>,
    pub html: String,
    /// Outbound links, extracted regardless of the requested formats
    pub links: Vec<String>,
    pub visible_text: String,
    pub data: ScrapeData,
}
