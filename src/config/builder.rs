//! Fluent builder for `ServiceConfig`
//!
//! Every field has a default, so the builder starts from
//! `ServiceConfig::default()` and `build()` only validates ranges.

use std::path::PathBuf;

use super::types::ServiceConfig;
use crate::errors::{ScrapeError, ScrapeResult};
use crate::proxy_pool::RotationStrategy;

#[derive(Debug, Clone, Default)]
pub struct ServiceConfigBuilder {
    config: ServiceConfig,
}

impl ServiceConfig {
    /// Create a builder for configuring a `ServiceConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }
}

impl ServiceConfigBuilder {
    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.viewport_width = width;
        self.config.viewport_height = height;
        self
    }

    #[must_use]
    pub fn browser_pool_size(mut self, size: usize) -> Self {
        self.config.browser_pool_size = size;
        self
    }

    #[must_use]
    pub fn chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_executable = Some(path.into());
        self
    }

    /// Single proxy URL; also enables rotation
    #[must_use]
    pub fn proxy_url(mut self, url: impl Into<String>) -> Self {
        self.config.proxy_url = Some(url.into());
        self.config.proxy_rotation_enabled = true;
        self
    }

    /// File of one proxy URL per line; also enables rotation
    #[must_use]
    pub fn proxy_list_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.proxy_list_file = Some(path.into());
        self.config.proxy_rotation_enabled = true;
        self
    }

    #[must_use]
    pub fn proxy_rotation_enabled(mut self, enabled: bool) -> Self {
        self.config.proxy_rotation_enabled = enabled;
        self
    }

    #[must_use]
    pub fn proxy_rotation_strategy(mut self, strategy: RotationStrategy) -> Self {
        self.config.proxy_rotation_strategy = strategy;
        self
    }

    #[must_use]
    pub fn proxy_max_failures(mut self, max_failures: u32) -> Self {
        self.config.proxy_max_failures = max_failures;
        self
    }

    #[must_use]
    pub fn proxy_cooldown_seconds(mut self, seconds: u64) -> Self {
        self.config.proxy_cooldown_seconds = seconds;
        self
    }

    #[must_use]
    pub fn max_crawl_depth(mut self, depth: u32) -> Self {
        self.config.max_crawl_depth = depth;
        self
    }

    #[must_use]
    pub fn max_crawl_pages(mut self, pages: usize) -> Self {
        self.config.max_crawl_pages = pages;
        self
    }

    #[must_use]
    pub fn max_concurrent_requests(mut self, concurrency: usize) -> Self {
        self.config.max_concurrent_requests = concurrency;
        self
    }

    #[must_use]
    pub fn request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.config.request_timeout_ms = timeout_ms;
        self
    }

    #[must_use]
    pub fn job_retention_hours(mut self, hours: u64) -> Self {
        self.config.job_retention_hours = hours;
        self
    }

    #[must_use]
    pub fn allow_internal_targets(mut self, allow: bool) -> Self {
        self.config.allow_internal_targets = allow;
        self
    }

    pub fn build(self) -> ScrapeResult<ServiceConfig> {
        let config = self.config;

        if config.browser_pool_size == 0 {
            return Err(ScrapeError::Config(
                "browser_pool_size must be at least 1".to_string(),
            ));
        }
        if config.max_concurrent_requests == 0 {
            return Err(ScrapeError::Config(
                "max_concurrent_requests must be at least 1".to_string(),
            ));
        }
        if config.request_timeout_ms == 0 {
            return Err(ScrapeError::Config(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if config.proxy_max_failures == 0 {
            return Err(ScrapeError::Config(
                "proxy_max_failures must be at least 1".to_string(),
            ));
        }
        if config.user_agent.trim().is_empty() {
            return Err(ScrapeError::Config("user_agent must not be empty".to_string()));
        }

        Ok(config)
    }
}
