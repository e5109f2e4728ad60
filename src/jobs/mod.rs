//! Job persistence seam for crawl and batch jobs
//!
//! The frontier and batch workers only issue partial updates through
//! [`JobStore`]; durable storage is left to implementations.

mod memory;
mod types;

use async_trait::async_trait;

use crate::errors::ScrapeResult;

pub use memory::InMemoryJobStore;
pub use types::{CrawlJobState, JobKind, JobStatus, JobUpdate};

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Create a pending job record
    async fn create(
        &self,
        id: &str,
        kind: JobKind,
        total: usize,
        config: serde_json::Value,
    ) -> ScrapeResult<CrawlJobState>;

    /// Apply a partial update; unknown ids yield `JobNotFound`
    async fn update(&self, id: &str, update: JobUpdate) -> ScrapeResult<()>;

    async fn get(&self, id: &str) -> ScrapeResult<Option<CrawlJobState>>;
}
