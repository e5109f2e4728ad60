//! Timeout wrapper for page operations
//!
//! Keeps content reads and captures from hanging past the caller's
//! per-fetch timeout.

use std::future::Future;
use std::time::Duration;

use log::debug;

use crate::errors::{ScrapeError, ScrapeResult};

/// Run a page operation under the fetch timeout
///
/// Driver failures become `FetchFailed`; running out of time becomes
/// `FetchTimeout` for `url`.
pub async fn with_page_timeout<F, T>(
    operation: F,
    url: &str,
    timeout_ms: u64,
    operation_name: &str,
) -> ScrapeResult<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), operation).await {
        Ok(result) => result.map_err(|e| ScrapeError::fetch_failed(url, e)),
        Err(_) => {
            debug!("{operation_name} timeout after {timeout_ms}ms on {url}");
            Err(ScrapeError::FetchTimeout {
                url: url.to_string(),
                timeout_ms,
            })
        }
    }
}
