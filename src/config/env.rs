//! Environment loader for `ServiceConfig`
//!
//! Variable names are the upper-cased field names, e.g. `BROWSER_POOL_SIZE`,
//! `PROXY_URL`, `PROXY_ROTATION_STRATEGY`. Unset variables keep defaults.

use std::path::PathBuf;
use std::str::FromStr;

use super::types::ServiceConfig;
use crate::errors::{ScrapeError, ScrapeResult};
use crate::proxy_pool::RotationStrategy;

impl ServiceConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> ScrapeResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// Split out from `from_env` so tests don't have to mutate the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> ScrapeResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = ServiceConfig::builder();
        let defaults = ServiceConfig::default();

        if let Some(v) = parse_var::<bool, _>(&lookup, "HEADLESS")? {
            builder = builder.headless(v);
        }
        if let Some(v) = lookup("USER_AGENT") {
            builder = builder.user_agent(v);
        }
        let width = parse_var::<u32, _>(&lookup, "VIEWPORT_WIDTH")?.unwrap_or(defaults.viewport_width);
        let height =
            parse_var::<u32, _>(&lookup, "VIEWPORT_HEIGHT")?.unwrap_or(defaults.viewport_height);
        builder = builder.viewport(width, height);
        if let Some(v) = parse_var::<usize, _>(&lookup, "BROWSER_POOL_SIZE")? {
            builder = builder.browser_pool_size(v);
        }
        if let Some(v) = lookup("CHROME_EXECUTABLE") {
            builder = builder.chrome_executable(PathBuf::from(v));
        }

        if let Some(v) = lookup("PROXY_URL").filter(|v| !v.trim().is_empty()) {
            builder = builder.proxy_url(v);
        }
        if let Some(v) = lookup("PROXY_LIST_FILE").filter(|v| !v.trim().is_empty()) {
            builder = builder.proxy_list_file(PathBuf::from(v));
        }
        // Explicit switch wins over the implicit enable of the two setters above
        builder = builder.proxy_rotation_enabled(
            parse_var::<bool, _>(&lookup, "PROXY_ROTATION_ENABLED")?.unwrap_or(false),
        );
        if let Some(v) = parse_var::<RotationStrategy, _>(&lookup, "PROXY_ROTATION_STRATEGY")? {
            builder = builder.proxy_rotation_strategy(v);
        }
        if let Some(v) = parse_var::<u32, _>(&lookup, "PROXY_MAX_FAILURES")? {
            builder = builder.proxy_max_failures(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "PROXY_COOLDOWN_SECONDS")? {
            builder = builder.proxy_cooldown_seconds(v);
        }

        if let Some(v) = parse_var::<u32, _>(&lookup, "MAX_CRAWL_DEPTH")? {
            builder = builder.max_crawl_depth(v);
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "MAX_CRAWL_PAGES")? {
            builder = builder.max_crawl_pages(v);
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "MAX_CONCURRENT_REQUESTS")? {
            builder = builder.max_concurrent_requests(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "REQUEST_TIMEOUT_MS")? {
            builder = builder.request_timeout_ms(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "JOB_RETENTION_HOURS")? {
            builder = builder.job_retention_hours(v);
        }
        if let Some(v) = parse_var::<bool, _>(&lookup, "ALLOW_INTERNAL_TARGETS")? {
            builder = builder.allow_internal_targets(v);
        }

        builder.build()
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> ScrapeResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .to_ascii_lowercase()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ScrapeError::Config(format!("Invalid value for {key} ({raw:?}): {e}"))),
    }
}
