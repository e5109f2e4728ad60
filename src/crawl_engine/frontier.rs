//! Breadth-first crawl loop
//!
//! One call to [`run_crawl`] drives one job from `running` to a terminal
//! status. Per-page failures are counted and never end the loop early.

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;
use url::{Origin, Url};

use super::content_validator::validate_page_content;
use super::crawl_types::{CrawlOptions, CrawlPageResult, CrawlSummary, FrontierEntry};
use super::link_processor::{CrawlState, normalize_url, process_page_links};
use super::url_filter::UrlFilter;
use crate::errors::{ScrapeError, ScrapeResult};
use crate::fetch::PageFetcher;
use crate::jobs::{JobStatus, JobStore, JobUpdate};

/// Crawl from `start_url`, reporting progress to `store` under `job_id`
///
/// The job must already exist in the store. Returns the summary that was
/// persisted as the job's final state. `Err` is only returned when the store
/// itself fails while recording that final state.
pub async fn run_crawl(
    job_id: &str,
    start_url: &str,
    options: &CrawlOptions,
    fetcher: &dyn PageFetcher,
    store: &dyn JobStore,
    cancel: &CancellationToken,
) -> ScrapeResult<CrawlSummary> {
    let (start, origin) = match parse_start_url(start_url) {
        Ok(parsed) => parsed,
        Err(e) => {
            return fail_job(job_id, store, format!("Invalid start URL {start_url}: {e:#}")).await;
        }
    };

    let filter = match UrlFilter::new(&options.include_patterns, &options.exclude_patterns) {
        Ok(filter) => filter,
        Err(e) => return fail_job(job_id, store, e.to_string()).await,
    };

    let fetch_options = options.page_fetch_options();
    let mut state = CrawlState::new(FrontierEntry::new(start.clone(), 0), origin, options.max_depth);
    let mut pages: Vec<CrawlPageResult> = Vec::new();
    let mut visit_order = Vec::new();
    let mut failed = 0usize;
    let mut invalid = 0usize;
    let mut status = JobStatus::Completed;

    info!(
        "Crawl {} started at {} (limit {}, depth {})",
        job_id, start, options.limit, options.max_depth
    );
    persist(store, job_id, JobUpdate::status(JobStatus::Running).counters(1, 0, 0)).await;

    while pages.len() < options.limit {
        if cancel.is_cancelled() {
            info!("Crawl {} cancelled after {} pages", job_id, pages.len());
            status = JobStatus::Cancelled;
            break;
        }

        let Some(entry) = state.pop_front() else {
            break;
        };

        if state.is_visited(&entry.url) || entry.depth > options.max_depth {
            continue;
        }
        if !filter.allows(&entry.url) {
            debug!("Skipping {} (URL pattern)", entry.url);
            continue;
        }

        state.mark_visited(&entry.url);
        visit_order.push(entry.url.clone());

        match fetcher.fetch_page(&entry.url, &fetch_options, cancel).await {
            Ok(page) => {
                let verdict =
                    validate_page_content(&page.html, &page.visible_text, &entry.url, page.status_code);
                if verdict.is_valid {
                    pages.push(CrawlPageResult {
                        url: entry.url.clone(),
                        depth: entry.depth,
                        data: page.data,
                    });
                    persist(
                        store,
                        job_id,
                        JobUpdate::status(JobStatus::Running).counters(
                            state.pending() + pages.len(),
                            pages.len(),
                            failed,
                        ),
                    )
                    .await;
                } else {
                    invalid += 1;
                    warn!(
                        "Dropping {} from results: {}",
                        entry.url,
                        verdict.reason.as_deref().unwrap_or("invalid content")
                    );
                }

                // Challenge pages may still link to real content
                process_page_links(&page.links, &entry, &mut state);
            }
            Err(ScrapeError::Cancelled) => {
                status = JobStatus::Cancelled;
                break;
            }
            Err(e @ ScrapeError::SafetyBlocked { .. }) if entry.depth == 0 => {
                warn!("Crawl {} start URL rejected: {}", job_id, e);
                return fail_job(job_id, store, e.to_string()).await;
            }
            Err(e) => {
                error!("Crawl page failed: {} ({})", entry.url, e);
                failed += 1;
                persist(
                    store,
                    job_id,
                    JobUpdate::status(JobStatus::Running).counters(
                        state.pending() + pages.len(),
                        pages.len(),
                        failed,
                    ),
                )
                .await;
            }
        }
    }

    let results = pages
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ScrapeError::Store(format!("Failed to serialize crawl results: {e}")))?;

    store
        .update(
            job_id,
            JobUpdate::finished(status)
                .counters(pages.len(), pages.len(), failed)
                .results(results),
        )
        .await?;

    info!(
        "Crawl {} finished: {:?}, {} pages, {} failed, {} invalid",
        job_id,
        status,
        pages.len(),
        failed,
        invalid
    );

    Ok(CrawlSummary {
        status,
        pages,
        failed,
        invalid,
        visited: visit_order,
        error: None,
    })
}

fn parse_start_url(start_url: &str) -> anyhow::Result<(String, Origin)> {
    let parsed = Url::parse(start_url)?;
    Ok((normalize_url(parsed.as_str())?, parsed.origin()))
}

async fn fail_job(
    job_id: &str,
    store: &dyn JobStore,
    reason: String,
) -> ScrapeResult<CrawlSummary> {
    error!("Crawl {} failed: {}", job_id, reason);
    store
        .update(job_id, JobUpdate::finished(JobStatus::Failed).error(reason.clone()))
        .await?;
    Ok(CrawlSummary {
        status: JobStatus::Failed,
        pages: Vec::new(),
        failed: 0,
        invalid: 0,
        visited: Vec::new(),
        error: Some(reason),
    })
}

/// Progress writes are advisory; a failing store must not stop the crawl
async fn persist(store: &dyn JobStore, job_id: &str, update: JobUpdate) {
    if let Err(e) = store.update(job_id, update).await {
        warn!("Failed to record progress for crawl {}: {}", job_id, e);
    }
}
