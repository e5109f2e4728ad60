//! Core types for crawl jobs: frontier entries, request options and
//! per-page results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::fetch::{FetchOptions, OutputFormat, ScrapeData};
use crate::jobs::JobStatus;
use crate::utils::{DEFAULT_CRAWL_DEPTH, DEFAULT_CRAWL_LIMIT};


/// A URL waiting in the frontier together with its link distance from the
/// start URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
}

impl FrontierEntry {
    #[must_use]
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
        }
    }

    /// Entry for a link discovered on this page
    #[must_use]
    pub fn child(&self, url: impl Into<String>) -> Self {
        Self::new(url, self.depth + 1)
    }
}

/// Options accepted by `start_crawl`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrawlOptions {
    /// Maximum number of valid pages to collect
    pub limit: usize,
    #[serde(alias = "depth")]
    pub max_depth: u32,
    /// Glob patterns matched against the full URL; empty means "everything"
    pub include_patterns: Vec<String>,
    /// Glob patterns matched against the full URL; checked before includes
    pub exclude_patterns: Vec<String>,
    pub scrape_options: FetchOptions,
    /// Headers sent with every page of the crawl
    pub headers: BTreeMap<String, String>,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CRAWL_LIMIT,
            max_depth: DEFAULT_CRAWL_DEPTH,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            scrape_options: FetchOptions::default()
                .with_formats([OutputFormat::Markdown, OutputFormat::Metadata]),
            headers: BTreeMap::new(),
        }
    }
}

impl CrawlOptions {
    /// Fetch options for every page, with crawl-level headers merged in
    ///
    /// Per-page headers from `scrape_options` win over crawl-level ones.
    #[must_use]
    pub fn page_fetch_options(&self) -> FetchOptions {
        let mut options = self.scrape_options.clone();
        for (name, value) in &self.headers {
            options
                .headers
                .entry(name.clone())
                .or_insert_with(|| value.clone());
        }
        options
    }
}

/// One accepted page in a crawl's results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlPageResult {
    pub url: String,
    pub depth: u32,
    #[serde(flatten)]
    pub data: ScrapeData,
}

/// What a finished crawl loop produced
#[derive(Debug, Clone)]
pub struct CrawlSummary {
    pub status: JobStatus,
    pub pages: Vec<CrawlPageResult>,
    pub failed: usize,
    /// Pages fetched but rejected by content validation
    pub invalid: usize,
    /// Every URL taken off the frontier, in visit order
    pub visited: Vec<String>,
    pub error: Option<String>,
}
