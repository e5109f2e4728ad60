//! Core configuration types for the extraction service
//!
//! `ServiceConfig` holds every tunable of the browser pool, proxy pool,
//! crawl bounds, batch concurrency and job retention.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::proxy_pool::RotationStrategy;
use crate::utils::constants::{
    DEFAULT_BROWSER_POOL_SIZE, DEFAULT_JOB_RETENTION_HOURS, DEFAULT_MAX_CONCURRENT_REQUESTS,
    DEFAULT_PROXY_COOLDOWN_SECS, DEFAULT_PROXY_MAX_FAILURES, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_USER_AGENT, DEFAULT_VIEWPORT_HEIGHT, DEFAULT_VIEWPORT_WIDTH, MAX_CRAWL_DEPTH,
    MAX_CRAWL_PAGES,
};

/// Main configuration struct for the extraction service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    // Browser settings
    pub(crate) headless: bool,
    pub(crate) user_agent: String,
    pub(crate) viewport_width: u32,
    pub(crate) viewport_height: u32,

    /// Number of reusable browsing contexts kept in the free stack.
    /// Acquisitions beyond this spill to ephemeral contexts.
    pub(crate) browser_pool_size: usize,

    /// Explicit Chromium binary; when unset the executable is discovered
    pub(crate) chrome_executable: Option<PathBuf>,

    // Proxy settings
    pub(crate) proxy_url: Option<String>,
    pub(crate) proxy_list_file: Option<PathBuf>,
    pub(crate) proxy_rotation_enabled: bool,
    pub(crate) proxy_rotation_strategy: RotationStrategy,
    pub(crate) proxy_max_failures: u32,
    pub(crate) proxy_cooldown_seconds: u64,

    // Scraping limits
    pub(crate) max_crawl_depth: u32,
    pub(crate) max_crawl_pages: usize,
    pub(crate) max_concurrent_requests: usize,
    pub(crate) request_timeout_ms: u64,
    pub(crate) job_retention_hours: u64,

    /// Disable the private-range checks of the safety gate.
    /// Only meant for local fixtures; scheme checks stay active.
    pub(crate) allow_internal_targets: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            headless: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            viewport_width: DEFAULT_VIEWPORT_WIDTH,
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            browser_pool_size: DEFAULT_BROWSER_POOL_SIZE,
            chrome_executable: None,
            proxy_url: None,
            proxy_list_file: None,
            proxy_rotation_enabled: false,
            proxy_rotation_strategy: RotationStrategy::RoundRobin,
            proxy_max_failures: DEFAULT_PROXY_MAX_FAILURES,
            proxy_cooldown_seconds: DEFAULT_PROXY_COOLDOWN_SECS,
            max_crawl_depth: MAX_CRAWL_DEPTH,
            max_crawl_pages: MAX_CRAWL_PAGES,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            job_retention_hours: DEFAULT_JOB_RETENTION_HOURS,
            allow_internal_targets: false,
        }
    }
}
