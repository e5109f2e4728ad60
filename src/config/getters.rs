//! Getter methods for `ServiceConfig`

use std::path::PathBuf;
use std::time::Duration;

use super::types::ServiceConfig;
use crate::proxy_pool::RotationStrategy;

impl ServiceConfig {
    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn viewport(&self) -> (u32, u32) {
        (self.viewport_width, self.viewport_height)
    }

    #[must_use]
    pub fn browser_pool_size(&self) -> usize {
        self.browser_pool_size
    }

    #[must_use]
    pub fn chrome_executable(&self) -> Option<&PathBuf> {
        self.chrome_executable.as_ref()
    }

    #[must_use]
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }

    #[must_use]
    pub fn proxy_list_file(&self) -> Option<&PathBuf> {
        self.proxy_list_file.as_ref()
    }

    #[must_use]
    pub fn proxy_rotation_enabled(&self) -> bool {
        self.proxy_rotation_enabled
    }

    #[must_use]
    pub fn proxy_rotation_strategy(&self) -> RotationStrategy {
        self.proxy_rotation_strategy
    }

    #[must_use]
    pub fn proxy_max_failures(&self) -> u32 {
        self.proxy_max_failures
    }

    #[must_use]
    pub fn proxy_cooldown(&self) -> Duration {
        Duration::from_secs(self.proxy_cooldown_seconds)
    }

    /// Whether a proxy pool should be built at all
    #[must_use]
    pub fn proxies_configured(&self) -> bool {
        self.proxy_rotation_enabled && (self.proxy_url.is_some() || self.proxy_list_file.is_some())
    }

    #[must_use]
    pub fn max_crawl_depth(&self) -> u32 {
        self.max_crawl_depth
    }

    #[must_use]
    pub fn max_crawl_pages(&self) -> usize {
        self.max_crawl_pages
    }

    #[must_use]
    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    #[must_use]
    pub fn request_timeout_ms(&self) -> u64 {
        self.request_timeout_ms
    }

    #[must_use]
    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_hours * 3600)
    }

    #[must_use]
    pub fn allow_internal_targets(&self) -> bool {
        self.allow_internal_targets
    }
}
