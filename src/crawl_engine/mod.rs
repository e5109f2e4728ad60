//! Crawl Engine Module
//!
//! Breadth-first, same-origin crawling on top of a [`PageFetcher`]:
//! frontier bookkeeping, URL pattern filtering, content validation and the
//! job-driving loop.
//!
//! [`PageFetcher`]: crate::fetch::PageFetcher

pub mod content_validator;
pub mod crawl_types;
pub mod frontier;
pub mod link_processor;
pub mod url_filter;

pub use content_validator::{
    CHALLENGE_INDICATORS, ContentValidationResult, find_challenge_indicator, validate_page_content,
};
pub use crawl_types::{CrawlOptions, CrawlPageResult, CrawlSummary, FrontierEntry};
pub use frontier::run_crawl;
pub use link_processor::{CrawlState, normalize_url, process_page_links, same_origin};
pub use url_filter::{UrlFilter, glob_to_regex};
