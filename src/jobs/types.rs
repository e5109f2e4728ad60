//! Job records shared by crawl and batch jobs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a crawl or batch job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Crawl,
    Batch,
}

/// Persisted state of one job
///
/// Counters are absolute values written by the single worker that owns the
/// job, so repeated updates with the same numbers are harmless.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJobState {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub results: Vec<serde_json::Value>,
    pub error: Option<String>,
    /// Request that started the job, kept for inspection
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl CrawlJobState {
    #[must_use]
    pub fn new(id: impl Into<String>, kind: JobKind, total: usize, config: serde_json::Value) -> Self {
        Self {
            id: id.into(),
            kind,
            status: JobStatus::Pending,
            total,
            completed: 0,
            failed: 0,
            results: Vec::new(),
            error: None,
            config,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Apply a partial update; absent fields are left untouched
    pub fn apply(&mut self, update: JobUpdate) {
        let JobUpdate {
            status,
            total,
            completed,
            failed,
            results,
            error,
            completed_at,
        } = update;

        if let Some(status) = status {
            self.status = status;
        }
        if let Some(total) = total {
            self.total = total;
        }
        if let Some(completed) = completed {
            self.completed = completed;
        }
        if let Some(failed) = failed {
            self.failed = failed;
        }
        if let Some(results) = results {
            self.results = results;
        }
        if let Some(error) = error {
            self.error = Some(error);
        }
        if let Some(completed_at) = completed_at {
            self.completed_at = Some(completed_at);
        }
    }
}

/// Partial update of a job record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub total: Option<usize>,
    pub completed: Option<usize>,
    pub failed: Option<usize>,
    pub results: Option<Vec<serde_json::Value>>,
    pub error: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobUpdate {
    #[must_use]
    pub fn status(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Terminal update stamped with the current time
    #[must_use]
    pub fn finished(status: JobStatus) -> Self {
        Self {
            status: Some(status),
            completed_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn counters(mut self, total: usize, completed: usize, failed: usize) -> Self {
        self.total = Some(total);
        self.completed = Some(completed);
        self.failed = Some(failed);
        self
    }

    #[must_use]
    pub fn results(mut self, results: Vec<serde_json::Value>) -> Self {
        self.results = Some(results);
        self
    }

    #[must_use]
    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
