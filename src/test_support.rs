//! In-crate fakes for unit tests

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use crate::browser::{NavigationTimeout, PageSession, WaitUntil};
use crate::errors::{ScrapeError, ScrapeResult};
use crate::fetch::{FetchOptions, FetchedPage, PageFetcher, ScrapeData};
use crate::url_safety::HostResolver;

/// Resolves nothing; only literal addresses and hostname rules can block
pub struct OfflineResolver;

impl HostResolver for OfflineResolver {
    fn resolve(&self, _host: &str) -> Vec<IpAddr> {
        Vec::new()
    }
}

/// Page that serves fixed HTML and records the interactions it receives
pub struct FakePage {
    html: String,
    calls: Mutex<Vec<String>>,
    waits: Mutex<Vec<WaitUntil>>,
    failing_selectors: HashSet<String>,
    evaluate_result: serde_json::Value,
    navigation_timeout: bool,
    redirect: Option<String>,
}

impl FakePage {
    pub fn new(html: &str) -> Self {
        Self {
            html: html.to_string(),
            calls: Mutex::new(Vec::new()),
            waits: Mutex::new(Vec::new()),
            failing_selectors: HashSet::new(),
            evaluate_result: serde_json::Value::Bool(true),
            navigation_timeout: false,
            redirect: None,
        }
    }

    pub fn failing_selector(mut self, selector: &str) -> Self {
        self.failing_selectors.insert(selector.to_string());
        self
    }

    pub fn evaluate_result(mut self, value: serde_json::Value) -> Self {
        self.evaluate_result = value;
        self
    }

    pub fn navigation_timeout(mut self) -> Self {
        self.navigation_timeout = true;
        self
    }

    /// Navigation ends up at `url` instead of the requested address
    pub fn redirect_to(mut self, url: &str) -> Self {
        self.redirect = Some(url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    /// Load condition of each navigation, in order
    pub fn waits(&self) -> Vec<WaitUntil> {
        self.waits.lock().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    fn check_selector(&self, selector: &str) -> Result<()> {
        if self.failing_selectors.contains(selector) {
            bail!("No element matches {selector}");
        }
        Ok(())
    }
}

#[async_trait]
impl PageSession for FakePage {
    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration) -> Result<Option<u16>> {
        self.record(format!("goto {url}"));
        self.waits.lock().push(wait_until);
        if self.navigation_timeout {
            return Err(NavigationTimeout {
                url: url.to_string(),
                after: timeout,
            }
            .into());
        }
        Ok(Some(200))
    }

    async fn current_url(&self) -> Result<Option<String>> {
        if let Some(redirect) = &self.redirect {
            return Ok(Some(redirect.clone()));
        }
        let calls = self.calls.lock();
        Ok(calls
            .iter()
            .rev()
            .find_map(|call| call.strip_prefix("goto "))
            .map(str::to_string))
    }

    async fn content(&self) -> Result<String> {
        Ok(self.html.clone())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
        Ok(self.evaluate_result.clone())
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        self.record(format!("screenshot full={full_page}"));
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn click(&self, selector: &str, click_count: u32) -> Result<()> {
        self.check_selector(selector)?;
        self.record(format!("click {selector} x{click_count}"));
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str, _clear: bool) -> Result<()> {
        self.check_selector(selector)?;
        self.record(format!("type {selector} {text}"));
        Ok(())
    }

    async fn press_key(&self, key: &str, selector: Option<&str>) -> Result<()> {
        if let Some(selector) = selector {
            self.check_selector(selector)?;
        }
        self.record(format!("press {key}"));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.record("close".to_string());
        Ok(())
    }
}

enum Fixture {
    Page { text: String, links: Vec<String> },
    Fail,
    Blocked,
    Timeout,
}

/// Fetcher serving canned pages keyed by URL
#[derive(Default)]
pub struct FakeFetcher {
    fixtures: HashMap<String, Fixture>,
    delays: HashMap<String, Duration>,
    fetched: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, text: &str, links: &[&str]) -> Self {
        self.fixtures.insert(
            url.to_string(),
            Fixture::Page {
                text: text.to_string(),
                links: links.iter().map(|l| (*l).to_string()).collect(),
            },
        );
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.fixtures.insert(url.to_string(), Fixture::Fail);
        self
    }

    pub fn blocked(mut self, url: &str) -> Self {
        self.fixtures.insert(url.to_string(), Fixture::Blocked);
        self
    }

    pub fn timing_out(mut self, url: &str) -> Self {
        self.fixtures.insert(url.to_string(), Fixture::Timeout);
        self
    }

    pub fn delay_for(mut self, url: &str, millis: u64) -> Self {
        self.delays.insert(url.to_string(), Duration::from_millis(millis));
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().len()
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for FakeFetcher {
    async fn fetch_page(
        &self,
        url: &str,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> ScrapeResult<FetchedPage> {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        self.fetched.lock().push(url.to_string());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match self.fixtures.get(url) {
            Some(Fixture::Page { text, links }) => {
                let anchors: String = links
                    .iter()
                    .map(|l| format!(r#"<a href="{l}">link</a>"#))
                    .collect();
                Ok(FetchedPage {
                    url: url.to_string(),
                    status_code: Some(200),
                    html: format!("<html><body><p>{text}</p>{anchors}</body></html>"),
                    links: links.clone(),
                    visible_text: text.clone(),
                    data: ScrapeData {
                        markdown: Some(text.clone()),
                        extraction_method: Some("htmd".to_string()),
                        ..ScrapeData::default()
                    },
                })
            }
            Some(Fixture::Blocked) => Err(ScrapeError::SafetyBlocked {
                url: url.to_string(),
                reason: "Blocked IP address".to_string(),
            }),
            Some(Fixture::Timeout) => Err(ScrapeError::FetchTimeout {
                url: url.to_string(),
                timeout_ms: options.timeout_ms,
            }),
            Some(Fixture::Fail) | None => Err(ScrapeError::fetch_failed(url, "connection reset")),
        }
    }
}
