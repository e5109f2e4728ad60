//! Error taxonomy for fetch, crawl and batch operations
//!
//! Per-page failures (`FetchTimeout`, `FetchFailed`) are isolated by the
//! frontier and batch boundaries and turned into counters or records.
//! `SafetyBlocked` is surfaced verbatim and never retried or proxied around.
//! `ResourceUnavailable` comes from engine launch and is fatal.

use thiserror::Error;

/// Result type alias for extraction operations
pub type ScrapeResult<T> = Result<T, ScrapeError>;

#[derive(Debug, Clone, Error)]
pub enum ScrapeError {
    /// Target URL rejected by the safety gate
    #[error("URL blocked by safety gate: {url}: {reason}")]
    SafetyBlocked { url: String, reason: String },

    /// Browser engine could not be launched or is gone
    #[error("Browser engine unavailable: {0}")]
    ResourceUnavailable(String),

    /// Navigation or content read exceeded the per-fetch timeout
    #[error("Timed out after {timeout_ms}ms fetching {url}")]
    FetchTimeout { url: String, timeout_ms: u64 },

    /// Any other single-page failure
    #[error("Failed to fetch {url}: {message}")]
    FetchFailed { url: String, message: String },

    /// A page action could not be executed
    #[error("Action {index} failed: {message}")]
    InvalidAction { index: usize, message: String },

    /// Operation stopped by its cancellation token
    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// Job store read or write failed
    #[error("Job store error: {0}")]
    Store(String),
}

impl ScrapeError {
    pub(crate) fn fetch_failed(url: &str, err: impl std::fmt::Display) -> Self {
        Self::FetchFailed {
            url: url.to_string(),
            // {:#} keeps the anyhow context chain
            message: format!("{err:#}"),
        }
    }

    /// Whether a caller issuing a fresh request could reasonably succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::FetchTimeout { .. } | Self::FetchFailed { .. } | Self::ResourceUnavailable(_)
        )
    }

    /// Short machine-readable code used in batch records and job errors
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SafetyBlocked { .. } => "SSRF_BLOCKED",
            Self::ResourceUnavailable(_) => "RESOURCE_UNAVAILABLE",
            Self::FetchTimeout { .. } => "TIMEOUT",
            Self::FetchFailed { .. } => "FETCH_FAILED",
            Self::InvalidAction { .. } => "ACTION_FAILED",
            Self::Cancelled => "CANCELLED",
            Self::JobNotFound(_) => "JOB_NOT_FOUND",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safety_blocked_is_never_retryable() {
        let err = ScrapeError::SafetyBlocked {
            url: "http://localhost".to_string(),
            reason: "Blocked hostname: localhost".to_string(),
        };
        assert!(!err.is_retryable());
        assert_eq!(err.code(), "SSRF_BLOCKED");
    }

    #[test]
    fn test_fetch_failures_are_retryable() {
        let timeout = ScrapeError::FetchTimeout {
            url: "https://example.com".to_string(),
            timeout_ms: 10,
        };
        assert!(timeout.is_retryable());
        assert!(timeout.to_string().contains("10ms"));

        let failed = ScrapeError::fetch_failed("https://example.com", anyhow::anyhow!("reset"));
        assert!(failed.is_retryable());
        assert!(!ScrapeError::Cancelled.is_retryable());
    }
}
