//! Bounded concurrent batch executor
//!
//! Runs up to `concurrency` fetches at once. Every input URL yields exactly
//! one [`BatchRecord`], in input order; one URL failing never affects its
//! siblings and nothing is retried.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::errors::{ScrapeError, ScrapeResult};
use crate::fetch::{FetchOptions, PageFetcher, ScrapeData};

/// Outcome of one URL in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRecord {
    pub url: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ScrapeData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error code, see [`ScrapeError::code`]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl BatchRecord {
    fn from_result(url: &str, result: ScrapeResult<ScrapeData>) -> Self {
        match result {
            Ok(data) => Self {
                url: url.to_string(),
                success: true,
                data: Some(data),
                error: None,
                code: None,
            },
            Err(e) => Self {
                url: url.to_string(),
                success: false,
                data: None,
                error: Some(e.to_string()),
                code: Some(e.code().to_string()),
            },
        }
    }
}

/// Fetch every URL with at most `concurrency` fetches in flight
///
/// URLs not yet started when `cancel` fires are recorded as cancelled;
/// fetches already running finish on their own timeout.
pub async fn run_batch(
    urls: &[String],
    options: &FetchOptions,
    fetcher: &dyn PageFetcher,
    concurrency: usize,
    cancel: &CancellationToken,
) -> Vec<BatchRecord> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));

    log::info!(
        "Running batch of {} URLs with concurrency {}",
        urls.len(),
        concurrency.max(1)
    );

    let fetches = urls.iter().map(|url| {
        let semaphore = semaphore.clone();
        async move {
            let result: ScrapeResult<ScrapeData> = async {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|e| ScrapeError::ResourceUnavailable(format!("Semaphore error: {e}")))?;
                if cancel.is_cancelled() {
                    return Err(ScrapeError::Cancelled);
                }
                fetcher
                    .fetch_page(url, options, cancel)
                    .await
                    .map(|page| page.data)
            }
            .await;

            if let Err(e) = &result {
                log::warn!("Batch fetch failed for {url}: {e}");
            }
            BatchRecord::from_result(url, result)
        }
    });

    let records = join_all(fetches).await;

    let succeeded = records.iter().filter(|r| r.success).count();
    log::info!(
        "Batch finished: {} succeeded, {} failed",
        succeeded,
        records.len() - succeeded
    );
    records
}
