//! Link processing and queue management
//!
//! This module owns the frontier queue and the visited set, and decides
//! which discovered links are enqueued.

use std::collections::{HashSet, VecDeque};

use log::{debug, warn};
use url::{Origin, Url};

use super::crawl_types::FrontierEntry;

pub use crate::utils::normalize_url;

/// Whether `url` shares scheme, host and port with the crawl's start URL
#[must_use]
pub fn same_origin(url: &str, origin: &Origin) -> bool {
    Url::parse(url).is_ok_and(|parsed| &parsed.origin() == origin)
}

/// Frontier queue plus the bookkeeping that guarantees termination
///
/// Every URL is dequeued at most once: it is marked visited before it is
/// fetched, and a URL already visited or already waiting is never enqueued
/// again.
pub struct CrawlState {
    pub queue: VecDeque<FrontierEntry>,
    pub max_depth: u32,
    origin: Origin,
    visited: HashSet<String>,
    queued: HashSet<String>,
}

impl CrawlState {
    #[must_use]
    pub fn new(start: FrontierEntry, origin: Origin, max_depth: u32) -> Self {
        let mut queued = HashSet::new();
        queued.insert(start.url.clone());
        Self {
            queue: VecDeque::from([start]),
            max_depth,
            origin,
            visited: HashSet::new(),
            queued,
        }
    }

    /// Next entry in breadth-first order
    pub fn pop_front(&mut self) -> Option<FrontierEntry> {
        let entry = self.queue.pop_front()?;
        self.queued.remove(&entry.url);
        Some(entry)
    }

    /// Record a URL as visited; false when it already was
    pub fn mark_visited(&mut self, url: &str) -> bool {
        self.visited.insert(url.to_string())
    }

    #[must_use]
    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

/// Enqueue same-origin links found on `current` at `current.depth + 1`
///
/// Returns how many entries were added. Nothing is enqueued once the page is
/// already at the maximum depth.
pub fn process_page_links(
    links: &[String],
    current: &FrontierEntry,
    state: &mut CrawlState,
) -> usize {
    if current.depth >= state.max_depth {
        return 0;
    }

    let mut added = 0;
    for link in links {
        let normalized = match normalize_url(link) {
            Ok(url) => url,
            Err(e) => {
                warn!(
                    target: "simplecrawl::links",
                    "Failed to normalize URL {}: {}, skipping",
                    link, e
                );
                continue;
            }
        };

        if !same_origin(&normalized, &state.origin)
            || state.visited.contains(&normalized)
            || state.queued.contains(&normalized)
        {
            continue;
        }

        state.queued.insert(normalized.clone());
        state.queue.push_back(current.child(normalized));
        added += 1;
    }

    debug!(
        target: "simplecrawl::links",
        "Found {} links on {}, {} enqueued",
        links.len(),
        current.url,
        added
    );
    added
}
