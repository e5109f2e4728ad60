//! Shared configuration constants for simplecrawl
//!
//! Default values used by the config layer and by the subsystems when a
//! caller leaves an option unset.

/// Default user agent presented by every browsing context
pub const DEFAULT_USER_AGENT: &str = "SimpleCrawl/1.0 (+https://github.com/simplecrawl)";

/// Default viewport, matching a common desktop resolution
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// Pooled (reusable) browsing contexts kept by the browser pool
pub const DEFAULT_BROWSER_POOL_SIZE: usize = 5;

/// Global cap on simultaneous fetches in a batch
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 10;

/// Per-fetch navigation timeout: 30 seconds
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Crawl bounds applied when a request does not name its own
pub const DEFAULT_CRAWL_DEPTH: u32 = 3;
pub const DEFAULT_CRAWL_LIMIT: usize = 100;

/// Hard ceilings for crawl requests
pub const MAX_CRAWL_DEPTH: u32 = 10;
pub const MAX_CRAWL_PAGES: usize = 1000;

/// Proxy circuit breaker defaults
pub const DEFAULT_PROXY_MAX_FAILURES: u32 = 3;
pub const DEFAULT_PROXY_COOLDOWN_SECS: u64 = 300;

/// Terminal jobs are dropped from the in-memory store after this long
pub const DEFAULT_JOB_RETENTION_HOURS: u64 = 24;

/// Tags stripped before markdown conversion unless the caller overrides them
pub const DEFAULT_EXCLUDE_TAGS: &[&str] = &[
    "script", "style", "nav", "footer", "header", "aside", "iframe", "noscript", "svg",
];

/// Wiping a pooled context's cookies and storage must finish within this
pub const CONTEXT_CLEAR_TIMEOUT_MS: u64 = 10_000;

/// Most URLs a site map returns unless the caller asks for fewer
pub const DEFAULT_MAP_LIMIT: usize = 5_000;
