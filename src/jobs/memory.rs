//! In-process job store with retention cleanup

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;

use super::JobStore;
use super::types::{CrawlJobState, JobKind, JobUpdate};
use crate::errors::{ScrapeError, ScrapeResult};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Job store backed by a concurrent map
///
/// Jobs live for the lifetime of the process unless a cleanup task is
/// started, in which case terminal jobs older than the retention period are
/// dropped.
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    jobs: DashMap<String, CrawlJobState>,
}

impl InMemoryJobStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Remove terminal jobs created more than `retention` ago
    pub fn cleanup_expired(&self, retention: Duration) -> usize {
        let now = Utc::now();
        let initial_count = self.jobs.len();

        self.jobs.retain(|job_id, job| {
            let age = now
                .signed_duration_since(job.created_at)
                .to_std()
                .unwrap_or(Duration::ZERO);
            let should_keep = !job.status.is_terminal() || age < retention;
            if !should_keep {
                log::debug!("Removing expired job {}: {:?} (age: {:?})", job_id, job.status, age);
            }
            should_keep
        });

        let cleaned = initial_count.saturating_sub(self.jobs.len());
        if cleaned > 0 {
            log::debug!("Cleaned up {cleaned} expired jobs");
        }
        cleaned
    }

    /// Start background cleanup task (call once at initialization)
    ///
    /// Runs every 60 seconds until the returned handle is aborted.
    pub fn start_cleanup_task(self: Arc<Self>, retention: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                self.cleanup_expired(retention);
            }
        })
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn create(
        &self,
        id: &str,
        kind: JobKind,
        total: usize,
        config: serde_json::Value,
    ) -> ScrapeResult<CrawlJobState> {
        match self.jobs.entry(id.to_string()) {
            Entry::Occupied(_) => Err(ScrapeError::Store(format!("Job {id} already exists"))),
            Entry::Vacant(slot) => {
                let state = CrawlJobState::new(id, kind, total, config);
                slot.insert(state.clone());
                Ok(state)
            }
        }
    }

    async fn update(&self, id: &str, update: JobUpdate) -> ScrapeResult<()> {
        let mut job = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| ScrapeError::JobNotFound(id.to_string()))?;
        job.apply(update);
        Ok(())
    }

    async fn get(&self, id: &str) -> ScrapeResult<Option<CrawlJobState>> {
        Ok(self.jobs.get(id).map(|job| job.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::JobStatus;

    #[tokio::test]
    async fn test_create_update_get() {
        let store = InMemoryJobStore::new();
        store
            .create("crawl_a", JobKind::Crawl, 1, serde_json::Value::Null)
            .await
            .expect("created");
        store
            .update("crawl_a", JobUpdate::status(JobStatus::Running).counters(3, 1, 0))
            .await
            .expect("updated");

        let job = store.get("crawl_a").await.expect("read").expect("present");
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.total, 3);
        assert!(store.get("missing").await.expect("read").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_create_and_missing_update_fail() {
        let store = InMemoryJobStore::new();
        store
            .create("batch_a", JobKind::Batch, 2, serde_json::Value::Null)
            .await
            .expect("created");
        assert!(matches!(
            store.create("batch_a", JobKind::Batch, 2, serde_json::Value::Null).await,
            Err(ScrapeError::Store(_))
        ));
        assert!(matches!(
            store.update("nope", JobUpdate::default()).await,
            Err(ScrapeError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_cleanup_keeps_running_jobs() {
        let store = InMemoryJobStore::new();
        for id in ["done", "running"] {
            store
                .create(id, JobKind::Crawl, 1, serde_json::Value::Null)
                .await
                .expect("created");
        }
        store
            .update("done", JobUpdate::finished(JobStatus::Completed))
            .await
            .expect("updated");

        assert_eq!(store.cleanup_expired(Duration::from_secs(3600)), 0);
        assert_eq!(store.cleanup_expired(Duration::ZERO), 1);
        assert_eq!(store.len(), 1);
        assert!(store.get("running").await.expect("read").is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_create_has_one_winner() {
        let store = Arc::new(InMemoryJobStore::new());
        let tasks: Vec<_> = (0..16)
            .map(|total| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .create("crawl_race", JobKind::Crawl, total, serde_json::Value::Null)
                        .await
                })
            })
            .collect();

        let mut winners = Vec::new();
        for task in tasks {
            if let Ok(state) = task.await.expect("task joined") {
                winners.push(state.total);
            }
        }

        assert_eq!(winners.len(), 1);
        let stored = store.get("crawl_race").await.expect("read").expect("present");
        assert_eq!(stored.total, winners[0]);
        assert_eq!(store.len(), 1);
    }
}
