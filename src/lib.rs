pub mod actions;
pub mod batch;
pub mod browser;
pub mod browser_pool;
pub mod browser_setup;
pub mod config;
pub mod crawl_engine;
pub mod errors;
pub mod fetch;
pub mod jobs;
pub mod mapper;
pub mod page_extractor;
pub mod proxy_pool;
pub mod service;
pub mod url_safety;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use actions::{PageAction, ScrollDirection};
pub use batch::{BatchRecord, run_batch};
pub use browser::{BrowserDriver, BrowserEngine, BrowsingContext, ChromiumDriver, PageSession, WaitUntil};
pub use browser_pool::{AcquireOptions, BrowserPool, BrowserPoolConfig, ContextHandle, ContextKind, PoolStats, ReleaseOutcome};
pub use browser_setup::{download_managed_browser, find_browser_executable, launch_browser};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use crawl_engine::{CrawlOptions, CrawlPageResult, CrawlSummary, FrontierEntry, run_crawl};
pub use errors::{ScrapeError, ScrapeResult};
pub use fetch::{BrowserPageFetcher, FetchOptions, FetchedPage, OutputFormat, PageFetcher, ScrapeData};
pub use jobs::{CrawlJobState, InMemoryJobStore, JobKind, JobStatus, JobStore, JobUpdate};
pub use mapper::{HttpSiteFiles, MapOptions, SiteFiles, SiteMapper};
pub use page_extractor::{MediaItem, MediaKind, PageMetadata};
pub use proxy_pool::{ProxyEndpoint, ProxyPool, ProxyPoolStats, RotationStrategy};
pub use service::ExtractionService;
pub use url_safety::{SafetyGate, SafetyVerdict, check_url};
