//! Extraction service facade
//!
//! Wires the safety gate, proxy pool, browser pool, fetcher and job store
//! together and exposes the fetch, map, crawl and batch operations. Crawl and
//! batch jobs run as background tasks, one task per job, each with its own
//! cancellation token.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::batch::{BatchRecord, run_batch};
use crate::browser::{BrowserDriver, ChromiumDriver};
use crate::browser_pool::{BrowserPool, BrowserPoolConfig, PoolStats};
use crate::config::ServiceConfig;
use crate::crawl_engine::{CrawlOptions, run_crawl};
use crate::errors::{ScrapeError, ScrapeResult};
use crate::fetch::{BrowserPageFetcher, FetchOptions, PageFetcher, ScrapeData};
use crate::jobs::{CrawlJobState, InMemoryJobStore, JobKind, JobStatus, JobStore, JobUpdate};
use crate::mapper::{HttpSiteFiles, MapOptions, SiteFiles, SiteMapper};
use crate::proxy_pool::{ProxyPool, ProxyPoolStats};
use crate::url_safety::{SafetyGate, SystemResolver};

/// `crawl_` / `batch_` followed by 16 hex characters
fn new_job_id(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{prefix}_{}", &hex[..16])
}

pub struct ExtractionService {
    config: ServiceConfig,
    fetcher: Arc<dyn PageFetcher>,
    mapper: SiteMapper,
    store: Arc<dyn JobStore>,
    pool: Option<Arc<BrowserPool>>,
    proxy_pool: Arc<ProxyPool>,
    /// Set when the service owns an in-memory store that needs cleanup
    memory_store: Option<Arc<InMemoryJobStore>>,
    cleanup_task: Mutex<Option<JoinHandle<()>>>,
    /// Cancellation tokens of jobs that are still running
    running: Arc<DashMap<String, CancellationToken>>,
}

impl std::fmt::Debug for ExtractionService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionService")
            .field("running_jobs", &self.running.len())
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl ExtractionService {
    /// Service backed by a local Chromium and an in-memory job store
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        let gate = SafetyGate::new(Arc::new(SystemResolver), config.allow_internal_targets());
        Self::with_driver(config, Arc::new(ChromiumDriver), gate)
    }

    /// Service using a custom browser driver and safety gate
    #[must_use]
    pub fn with_driver(config: ServiceConfig, driver: Arc<dyn BrowserDriver>, gate: SafetyGate) -> Self {
        let proxy_pool = Arc::new(ProxyPool::from_config(&config));
        let pool = Arc::new(BrowserPool::new(
            BrowserPoolConfig::from(&config),
            driver,
            Arc::clone(&proxy_pool),
        ));
        let fetcher: Arc<dyn PageFetcher> =
            Arc::new(BrowserPageFetcher::new(Arc::clone(&pool), gate.clone()));
        let mapper = SiteMapper::new(site_files(&config, &gate), Arc::clone(&fetcher), gate);
        let memory_store = Arc::new(InMemoryJobStore::new());

        Self {
            config,
            fetcher,
            mapper,
            store: memory_store.clone(),
            pool: Some(pool),
            proxy_pool,
            memory_store: Some(memory_store),
            cleanup_task: Mutex::new(None),
            running: Arc::new(DashMap::new()),
        }
    }

    /// Service over an arbitrary fetcher and job store; no browser pool is
    /// managed
    #[must_use]
    pub fn with_components(
        config: ServiceConfig,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn JobStore>,
    ) -> Self {
        let proxy_pool = Arc::new(ProxyPool::from_config(&config));
        let gate = SafetyGate::new(Arc::new(SystemResolver), config.allow_internal_targets());
        let mapper = SiteMapper::new(site_files(&config, &gate), Arc::clone(&fetcher), gate);
        Self {
            config,
            fetcher,
            mapper,
            store,
            pool: None,
            proxy_pool,
            memory_store: None,
            cleanup_task: Mutex::new(None),
            running: Arc::new(DashMap::new()),
        }
    }

    /// Read robots.txt and sitemaps from `files` instead of over HTTP
    #[must_use]
    pub fn with_site_files(mut self, files: Arc<dyn SiteFiles>) -> Self {
        self.mapper = self.mapper.with_files(files);
        self
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Launch the browser engine and start job retention cleanup
    ///
    /// Engine launch failure is fatal and returned as `ResourceUnavailable`.
    pub async fn initialize(&self) -> ScrapeResult<()> {
        if let Some(pool) = &self.pool {
            pool.initialize().await?;
        }

        if let Some(store) = &self.memory_store {
            let mut cleanup = self.cleanup_task.lock();
            if cleanup.is_none() {
                *cleanup = Some(Arc::clone(store).start_cleanup_task(self.config.job_retention()));
            }
        }

        info!(
            proxies = self.proxy_pool.proxy_count(),
            pool_size = self.config.browser_pool_size(),
            "Extraction service ready"
        );
        Ok(())
    }

    /// Fetch options with the configured request timeout
    #[must_use]
    pub fn default_fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout_ms: self.config.request_timeout_ms(),
            ..FetchOptions::default()
        }
    }

    /// Fetch one page and return the requested formats
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> ScrapeResult<ScrapeData> {
        let page = self
            .fetcher
            .fetch_page(url, options, &CancellationToken::new())
            .await?;
        Ok(page.data)
    }

    /// List the URLs of the site `url` belongs to
    pub async fn map(&self, url: &str, options: &MapOptions) -> ScrapeResult<Vec<String>> {
        self.mapper.map(url, options, &CancellationToken::new()).await
    }

    /// Start a background crawl and return its job id
    ///
    /// `limit` and `max_depth` are capped by the service configuration.
    pub async fn start_crawl(&self, url: &str, mut options: CrawlOptions) -> ScrapeResult<String> {
        options.limit = options.limit.min(self.config.max_crawl_pages());
        options.max_depth = options.max_depth.min(self.config.max_crawl_depth());

        let job_id = new_job_id("crawl");
        let request = serde_json::json!({ "url": url, "options": &options });
        self.store.create(&job_id, JobKind::Crawl, 1, request).await?;

        let cancel = CancellationToken::new();
        self.running.insert(job_id.clone(), cancel.clone());

        let fetcher = Arc::clone(&self.fetcher);
        let store = Arc::clone(&self.store);
        let running = Arc::clone(&self.running);
        let start_url = url.to_string();
        let task_id = job_id.clone();

        tokio::spawn(async move {
            if let Err(e) = run_crawl(
                &task_id,
                &start_url,
                &options,
                fetcher.as_ref(),
                store.as_ref(),
                &cancel,
            )
            .await
            {
                warn!(job_id = %task_id, "Crawl could not record its final state: {e}");
            }
            running.remove(&task_id);
        });

        info!(job_id = %job_id, url, "Crawl started");
        Ok(job_id)
    }

    pub async fn get_crawl_status(&self, job_id: &str) -> ScrapeResult<CrawlJobState> {
        self.job_state(job_id).await
    }

    pub async fn get_batch_status(&self, job_id: &str) -> ScrapeResult<CrawlJobState> {
        self.job_state(job_id).await
    }

    async fn job_state(&self, job_id: &str) -> ScrapeResult<CrawlJobState> {
        self.store
            .get(job_id)
            .await?
            .ok_or_else(|| ScrapeError::JobNotFound(job_id.to_string()))
    }

    /// Request cancellation of a running crawl
    ///
    /// Returns false when the job exists but already finished.
    pub async fn cancel_crawl(&self, job_id: &str) -> ScrapeResult<bool> {
        self.cancel_job(job_id).await
    }

    pub async fn cancel_batch(&self, job_id: &str) -> ScrapeResult<bool> {
        self.cancel_job(job_id).await
    }

    async fn cancel_job(&self, job_id: &str) -> ScrapeResult<bool> {
        let token = self.running.get(job_id).map(|entry| entry.value().clone());
        match token {
            Some(token) => {
                info!(job_id, "Cancellation requested");
                token.cancel();
                Ok(true)
            }
            None => self.job_state(job_id).await.map(|_| false),
        }
    }

    /// Fetch every URL with the configured concurrency and wait for all
    pub async fn run_batch(&self, urls: &[String], options: &FetchOptions) -> Vec<BatchRecord> {
        run_batch(
            urls,
            options,
            self.fetcher.as_ref(),
            self.config.max_concurrent_requests(),
            &CancellationToken::new(),
        )
        .await
    }

    /// Start a background batch job and return its id
    pub async fn start_batch(&self, urls: Vec<String>, options: FetchOptions) -> ScrapeResult<String> {
        let job_id = new_job_id("batch");
        let request = serde_json::json!({ "urls": &urls, "options": &options });
        self.store
            .create(&job_id, JobKind::Batch, urls.len(), request)
            .await?;

        let cancel = CancellationToken::new();
        self.running.insert(job_id.clone(), cancel.clone());

        let fetcher = Arc::clone(&self.fetcher);
        let store = Arc::clone(&self.store);
        let running = Arc::clone(&self.running);
        let concurrency = self.config.max_concurrent_requests();
        let task_id = job_id.clone();

        tokio::spawn(async move {
            if let Err(e) = store
                .update(&task_id, JobUpdate::status(JobStatus::Running))
                .await
            {
                warn!(job_id = %task_id, "Failed to mark batch running: {e}");
            }

            let records = run_batch(&urls, &options, fetcher.as_ref(), concurrency, &cancel).await;
            if let Err(e) = finish_batch(store.as_ref(), &task_id, &records, cancel.is_cancelled()).await {
                warn!(job_id = %task_id, "Batch could not record its final state: {e}");
            }
            running.remove(&task_id);
        });

        info!(job_id = %job_id, "Batch started");
        Ok(job_id)
    }

    #[must_use]
    pub fn proxy_stats(&self) -> ProxyPoolStats {
        self.proxy_pool.stats()
    }

    #[must_use]
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.pool.as_ref().map(|pool| pool.stats())
    }

    /// Ids of jobs whose background task has not finished
    #[must_use]
    pub fn running_jobs(&self) -> Vec<String> {
        self.running.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Cancel running jobs, stop cleanup and close the browser
    pub async fn shutdown(&self) -> ScrapeResult<()> {
        for entry in self.running.iter() {
            entry.value().cancel();
        }
        if let Some(task) = self.cleanup_task.lock().take() {
            task.abort();
        }
        if let Some(pool) = &self.pool {
            pool.shutdown().await?;
        }
        info!("Extraction service shut down");
        Ok(())
    }
}

fn site_files(config: &ServiceConfig, gate: &SafetyGate) -> Arc<dyn SiteFiles> {
    Arc::new(HttpSiteFiles::new(
        gate.clone(),
        config.user_agent(),
        Duration::from_millis(config.request_timeout_ms()),
    ))
}

async fn finish_batch(
    store: &dyn JobStore,
    job_id: &str,
    records: &[BatchRecord],
    cancelled: bool,
) -> ScrapeResult<()> {
    let succeeded = records.iter().filter(|r| r.success).count();
    let results = records
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ScrapeError::Store(format!("Failed to serialize batch results: {e}")))?;

    let status = if cancelled {
        JobStatus::Cancelled
    } else {
        JobStatus::Completed
    };
    store
        .update(
            job_id,
            JobUpdate::finished(status)
                .counters(records.len(), succeeded, records.len() - succeeded)
                .results(results),
        )
        .await
}
