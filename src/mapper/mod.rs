//! Site mapping: list the URLs of a site without crawling it
//!
//! Sitemaps come first: the ones declared in robots.txt, or else the first
//! of the conventional locations that exists, following sitemap indexes.
//! When they yield only a handful of pages, the links on the start page are
//! added. Results are limited to the start URL's origin.

pub mod sitemap;
pub mod source;

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use url::{Origin, Url};

use crate::crawl_engine::same_origin;
use crate::errors::{ScrapeError, ScrapeResult};
use crate::fetch::{FetchOptions, OutputFormat, PageFetcher};
use crate::url_safety::SafetyGate;
use crate::utils::{DEFAULT_MAP_LIMIT, normalize_url};

pub use sitemap::{SitemapEntries, parse_sitemap, sitemaps_in_robots};
pub use source::{HttpSiteFiles, MAX_SITE_FILE_BYTES, SiteFiles};

/// Tried in order when robots.txt declares no sitemap
pub const SITEMAP_PATHS: &[&str] = &["/sitemap.xml", "/sitemap_index.xml", "/sitemap-index.xml"];

/// Fewer sitemap pages than this and the start page's links are added
pub const SITEMAP_SUFFICIENT: usize = 5;

/// Sitemap documents read per map, indexes included
pub const MAX_SITEMAP_FILES: usize = 50;

/// Options accepted by `map`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MapOptions {
    /// Case-insensitive substring every returned URL must contain
    pub search: Option<String>,
    pub limit: usize,
    /// Read robots.txt and sitemaps; otherwise only the start page's links
    pub include_sitemap: bool,
    /// Used for the start page fetch
    pub timeout_ms: u64,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self {
            search: None,
            limit: DEFAULT_MAP_LIMIT,
            include_sitemap: true,
            timeout_ms: crate::utils::DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

pub struct SiteMapper {
    files: Arc<dyn SiteFiles>,
    fetcher: Arc<dyn PageFetcher>,
    gate: SafetyGate,
}

impl SiteMapper {
    pub fn new(files: Arc<dyn SiteFiles>, fetcher: Arc<dyn PageFetcher>, gate: SafetyGate) -> Self {
        Self {
            files,
            fetcher,
            gate,
        }
    }

    /// Same mapper reading robots.txt and sitemaps from `files`
    #[must_use]
    pub fn with_files(&self, files: Arc<dyn SiteFiles>) -> Self {
        Self::new(files, Arc::clone(&self.fetcher), self.gate.clone())
    }

    /// Discover the URLs of the site `url` belongs to
    ///
    /// A start URL rejected by the safety gate is an error; everything after
    /// that degrades to fewer results instead of failing.
    pub async fn map(
        &self,
        url: &str,
        options: &MapOptions,
        cancel: &CancellationToken,
    ) -> ScrapeResult<Vec<String>> {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        self.gate.check_async(url).await.into_result(url)?;
        let start = Url::parse(url).map_err(|e| ScrapeError::fetch_failed(url, e))?;
        let origin = start.origin();
        info!("Mapping {url} (search: {:?})", options.search);

        let mut found = if options.include_sitemap {
            self.sitemap_pages(&start, cancel).await?
        } else {
            Vec::new()
        };
        let from_sitemaps = found.len();

        if from_sitemaps < SITEMAP_SUFFICIENT {
            found.extend(self.start_page_links(url, options, cancel).await?);
        }

        let links = select_links(found, &origin, options);
        info!("Mapped {url}: {} links ({from_sitemaps} from sitemaps)", links.len());
        Ok(links)
    }

    async fn sitemap_pages(&self, start: &Url, cancel: &CancellationToken) -> ScrapeResult<Vec<String>> {
        let base = start.origin().ascii_serialization();
        let mut pending: VecDeque<String> = VecDeque::new();
        let mut prefetched: Option<(String, Vec<u8>)> = None;

        if let Some(robots) = self.fetch_file(&format!("{base}/robots.txt")).await {
            pending.extend(sitemaps_in_robots(&String::from_utf8_lossy(&robots)));
        }

        if pending.is_empty() {
            for path in SITEMAP_PATHS {
                if cancel.is_cancelled() {
                    return Err(ScrapeError::Cancelled);
                }
                let candidate = format!("{base}{path}");
                if let Some(body) = self.fetch_file(&candidate).await {
                    debug!("Found sitemap at {candidate}");
                    pending.push_back(candidate.clone());
                    prefetched = Some((candidate, body));
                    break;
                }
            }
        }

        let mut seen: HashSet<String> = HashSet::new();
        let mut pages = Vec::new();
        let mut read = 0;

        while let Some(sitemap_url) = pending.pop_front() {
            if cancel.is_cancelled() {
                return Err(ScrapeError::Cancelled);
            }
            if !seen.insert(sitemap_url.clone()) {
                continue;
            }
            if read == MAX_SITEMAP_FILES {
                warn!("Stopped after {MAX_SITEMAP_FILES} sitemap files for {base}");
                break;
            }
            read += 1;

            let body = match prefetched.take() {
                Some((url, body)) if url == sitemap_url => Some(body),
                _ => self.fetch_file(&sitemap_url).await,
            };
            let Some(body) = body else {
                continue;
            };

            let entries = parse_sitemap(&body);
            debug!(
                "{sitemap_url}: {} pages, {} nested sitemaps",
                entries.pages.len(),
                entries.sitemaps.len()
            );
            pages.extend(entries.pages);
            pending.extend(entries.sitemaps);
        }

        Ok(pages)
    }

    /// Gate, then fetch; any failure counts as "no such file"
    async fn fetch_file(&self, url: &str) -> Option<Vec<u8>> {
        if let Err(e) = self.gate.check_async(url).await.into_result(url) {
            warn!("Skipping {url}: {e}");
            return None;
        }
        match self.files.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                debug!("Could not fetch {url}: {e:#}");
                None
            }
        }
    }

    async fn start_page_links(
        &self,
        url: &str,
        options: &MapOptions,
        cancel: &CancellationToken,
    ) -> ScrapeResult<Vec<String>> {
        let fetch = FetchOptions {
            timeout_ms: options.timeout_ms,
            ..FetchOptions::default().with_formats([OutputFormat::Links])
        };
        match self.fetcher.fetch_page(url, &fetch, cancel).await {
            Ok(page) => Ok(page.links),
            Err(ScrapeError::Cancelled) => Err(ScrapeError::Cancelled),
            Err(e) => {
                warn!("Could not read links from {url}: {e}");
                Ok(Vec::new())
            }
        }
    }
}

/// Normalize, keep same-origin, de-duplicate, filter by search, then limit
#[must_use]
pub fn select_links(found: Vec<String>, origin: &Origin, options: &MapOptions) -> Vec<String> {
    let needle = options
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase);

    let mut seen = HashSet::new();
    found
        .into_iter()
        .filter_map(|link| normalize_url(&link).ok())
        .filter(|link| same_origin(link, origin))
        .filter(|link| {
            needle
                .as_ref()
                .is_none_or(|needle| link.to_lowercase().contains(needle.as_str()))
        })
        .filter(|link| seen.insert(link.clone()))
        .take(options.limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin() -> Origin {
        Url::parse("https://example.com/").expect("valid").origin()
    }

    fn links(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|u| (*u).to_string()).collect()
    }

    #[test]
    fn test_select_keeps_origin_and_order() {
        let found = links(&[
            "https://example.com/b",
            "https://example.com/a#top",
            "https://other.com/a",
            "http://example.com/plain",
            "https://example.com/b",
            "mailto:someone@example.com",
            "https://example.com/a",
        ]);
        assert_eq!(
            select_links(found, &origin(), &MapOptions::default()),
            vec!["https://example.com/b", "https://example.com/a"]
        );
    }

    #[test]
    fn test_select_search_is_case_insensitive() {
        let found = links(&[
            "https://example.com/Docs/intro",
            "https://example.com/blog/post",
            "https://example.com/docs/api",
        ]);
        let options = MapOptions {
            search: Some("DOCS".to_string()),
            ..MapOptions::default()
        };
        assert_eq!(
            select_links(found, &origin(), &options),
            vec!["https://example.com/Docs/intro", "https://example.com/docs/api"]
        );
    }

    #[test]
    fn test_select_applies_limit_after_dedup() {
        let found = links(&[
            "https://example.com/1",
            "https://example.com/1",
            "https://example.com/2",
            "https://example.com/3",
        ]);
        let options = MapOptions {
            limit: 2,
            search: Some("   ".to_string()),
            ..MapOptions::default()
        };
        assert_eq!(
            select_links(found, &origin(), &options),
            vec!["https://example.com/1", "https://example.com/2"]
        );
    }
}
