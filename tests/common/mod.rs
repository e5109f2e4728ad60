//! Test utilities shared by the simplecrawl integration tests
//!
//! Provides an in-memory browser driver that serves canned HTML, a canned
//! page fetcher, and a static DNS resolver, so nothing here needs a real
//! browser or network access.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

use simplecrawl::browser::{
    BrowserDriver, BrowserEngine, BrowsingContext, ContextOptions, LaunchOptions,
    NavigationTimeout, PageSession, WaitUntil,
};
use simplecrawl::fetch::{FetchOptions, FetchedPage, PageFetcher, ScrapeData};
use simplecrawl::mapper::SiteFiles;
use simplecrawl::url_safety::HostResolver;
use simplecrawl::{ScrapeError, ScrapeResult};

/// Creates a test HTML document with a title, a paragraph and links
pub fn create_test_html(title: &str, body: &str, links: &[&str]) -> String {
    let anchors: String = links
        .iter()
        .map(|href| format!(r#"<li><a href="{href}">{href}</a></li>"#))
        .collect();
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><title>{title}</title></head>
<body>
    <h1>{title}</h1>
    <p>{body}</p>
    <ul>{anchors}</ul>
</body>
</html>"#
    )
}

/// Readable filler long enough to pass content validation
pub const ARTICLE_TEXT: &str = "Rust gives you memory safety without a garbage collector, \
     and this sentence exists so the page has plenty of visible text.";

// =============================================================================
// Fake browser driver
// =============================================================================

/// Counters recorded by the fake driver
#[derive(Default)]
pub struct DriverLog {
    pub launches: AtomicUsize,
    pub contexts_created: AtomicUsize,
    pub contexts_closed: AtomicUsize,
    pub clears: AtomicUsize,
    pub engine_closes: AtomicUsize,
    pub context_options: Mutex<Vec<ContextOptions>>,
    pub navigations: Mutex<Vec<String>>,
}

impl DriverLog {
    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn contexts_created(&self) -> usize {
        self.contexts_created.load(Ordering::SeqCst)
    }

    pub fn contexts_closed(&self) -> usize {
        self.contexts_closed.load(Ordering::SeqCst)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }
}

#[derive(Default)]
struct Site {
    pages: HashMap<String, String>,
    hanging: HashSet<String>,
    redirects: HashMap<String, String>,
}

/// Browser driver serving HTML from a map of URL to document
#[derive(Clone, Default)]
pub struct FakeDriver {
    pub log: Arc<DriverLog>,
    site: Arc<Mutex<Site>>,
    fail_launch: bool,
    fail_clear: bool,
    hang_clear: bool,
    hang_new_page: bool,
    fail_proxy_contexts: bool,
}

impl FakeDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(self, url: &str, html: String) -> Self {
        self.site.lock().pages.insert(url.to_string(), html);
        self
    }

    /// Navigation to `url` never settles and hits the caller's timeout
    pub fn with_hanging_page(self, url: &str) -> Self {
        self.site.lock().hanging.insert(url.to_string());
        self
    }

    /// Navigating to `from` lands on `to`, as a server-side redirect would
    pub fn with_redirect(self, from: &str, to: &str) -> Self {
        self.site
            .lock()
            .redirects
            .insert(from.to_string(), to.to_string());
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn failing_clear(mut self) -> Self {
        self.fail_clear = true;
        self
    }

    /// Wiping a context never finishes
    pub fn hanging_clear(mut self) -> Self {
        self.hang_clear = true;
        self
    }

    /// Opening a page never finishes
    pub fn hanging_new_page(mut self) -> Self {
        self.hang_new_page = true;
        self
    }

    pub fn failing_proxy_contexts(mut self) -> Self {
        self.fail_proxy_contexts = true;
        self
    }
}

#[async_trait]
impl BrowserDriver for FakeDriver {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Arc<dyn BrowserEngine>> {
        self.log.launches.fetch_add(1, Ordering::SeqCst);
        if self.fail_launch {
            bail!("chromium executable not found");
        }
        Ok(Arc::new(FakeEngine {
            driver: self.clone(),
        }))
    }
}

struct FakeEngine {
    driver: FakeDriver,
}

#[async_trait]
impl BrowserEngine for FakeEngine {
    async fn new_context(&self, options: ContextOptions) -> Result<Box<dyn BrowsingContext>> {
        if self.driver.fail_proxy_contexts && options.proxy.is_some() {
            bail!("proxy refused connection");
        }
        let log = &self.driver.log;
        let n = log.contexts_created.fetch_add(1, Ordering::SeqCst) + 1;
        log.context_options.lock().push(options);
        Ok(Box::new(FakeContext {
            id: format!("ctx-{n}"),
            driver: self.driver.clone(),
        }))
    }

    async fn close(&self) -> Result<()> {
        self.driver.log.engine_closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeContext {
    id: String,
    driver: FakeDriver,
}

#[async_trait]
impl BrowsingContext for FakeContext {
    fn id(&self) -> &str {
        &self.id
    }

    async fn new_page(&self) -> Result<Box<dyn PageSession>> {
        if self.driver.hang_new_page {
            std::future::pending::<()>().await;
        }
        Ok(Box::new(FakeBrowserPage {
            driver: self.driver.clone(),
            current: Mutex::new(None),
        }))
    }

    async fn clear_state(&self) -> Result<()> {
        self.driver.log.clears.fetch_add(1, Ordering::SeqCst);
        if self.driver.hang_clear {
            std::future::pending::<()>().await;
        }
        if self.driver.fail_clear {
            bail!("storage clear rejected");
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.driver.log.contexts_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakeBrowserPage {
    driver: FakeDriver,
    current: Mutex<Option<String>>,
}

#[async_trait]
impl PageSession for FakeBrowserPage {
    async fn goto(&self, url: &str, _wait_until: WaitUntil, timeout: Duration) -> Result<Option<u16>> {
        self.driver.log.navigations.lock().push(url.to_string());
        let hanging = self.driver.site.lock().hanging.contains(url);
        if hanging {
            tokio::time::sleep(timeout).await;
            return Err(NavigationTimeout {
                url: url.to_string(),
                after: timeout,
            }
            .into());
        }
        let landed = {
            let site = self.driver.site.lock();
            let landed = site.redirects.get(url).map_or(url, String::as_str);
            if !site.pages.contains_key(landed) {
                bail!("net::ERR_NAME_NOT_RESOLVED at {landed}");
            }
            landed.to_string()
        };
        *self.current.lock() = Some(landed);
        Ok(Some(200))
    }

    async fn current_url(&self) -> Result<Option<String>> {
        Ok(self.current.lock().clone())
    }

    async fn content(&self) -> Result<String> {
        let current = self.current.lock().clone();
        let url = current.ok_or_else(|| anyhow!("no document loaded"))?;
        self.driver
            .site
            .lock()
            .pages
            .get(&url)
            .cloned()
            .ok_or_else(|| anyhow!("document vanished"))
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value> {
        Ok(serde_json::Value::Bool(true))
    }

    async fn screenshot(&self, _full_page: bool) -> Result<Vec<u8>> {
        Ok(vec![0x89, b'P', b'N', b'G'])
    }

    async fn click(&self, _selector: &str, _click_count: u32) -> Result<()> {
        Ok(())
    }

    async fn type_text(&self, _selector: &str, _text: &str, _clear: bool) -> Result<()> {
        Ok(())
    }

    async fn press_key(&self, _key: &str, _selector: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Canned page fetcher
// =============================================================================

enum Response {
    Page { text: String, links: Vec<String> },
    Timeout,
    Fail,
}

/// Fetcher answering from a URL map; unknown URLs fail
#[derive(Default)]
pub struct CannedFetcher {
    responses: HashMap<String, Response>,
    fetched: Mutex<Vec<String>>,
}

impl CannedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, text: &str, links: &[&str]) -> Self {
        self.responses.insert(
            url.to_string(),
            Response::Page {
                text: text.to_string(),
                links: links.iter().map(|l| (*l).to_string()).collect(),
            },
        );
        self
    }

    pub fn timing_out(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), Response::Timeout);
        self
    }

    pub fn failing(mut self, url: &str) -> Self {
        self.responses.insert(url.to_string(), Response::Fail);
        self
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl PageFetcher for CannedFetcher {
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

        match self.responses.get(url) {
            Some(Response::Page { text, links }) => Ok(FetchedPage {
                url: url.to_string(),
                status_code: Some(200),
                html: format!("<html><body><p>{text}</p></body></html>"),
                links: links.clone(),
                visible_text: text.clone(),
                data: ScrapeData {
                    markdown: Some(text.clone()),
                    ..ScrapeData::default()
                },
            }),
            Some(Response::Timeout) => {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(ScrapeError::FetchTimeout {
                    url: url.to_string(),
                    timeout_ms: options.timeout_ms,
                })
            }
            Some(Response::Fail) | None => Err(ScrapeError::FetchFailed {
                url: url.to_string(),
                message: "connection reset".to_string(),
            }),
        }
    }
}

// =============================================================================
// Static site files
// =============================================================================

/// robots.txt and sitemap bodies keyed by URL; unknown URLs are 404s
#[derive(Default)]
pub struct FakeSiteFiles {
    files: HashMap<String, Vec<u8>>,
    requested: Mutex<Vec<String>>,
}

impl FakeSiteFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, url: &str, body: &str) -> Self {
        self.files.insert(url.to_string(), body.as_bytes().to_vec());
        self
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl SiteFiles for FakeSiteFiles {
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        self.requested.lock().push(url.to_string());
        Ok(self.files.get(url).cloned())
    }
}

/// `<urlset>` listing `locs`
pub fn urlset(locs: &[&str]) -> String {
    let entries: String = locs
        .iter()
        .map(|loc| format!("<url><loc>{loc}</loc></url>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</urlset>"#
    )
}

/// `<sitemapindex>` pointing at `locs`
pub fn sitemap_index(locs: &[&str]) -> String {
    let entries: String = locs
        .iter()
        .map(|loc| format!("<sitemap><loc>{loc}</loc></sitemap>"))
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">{entries}</sitemapindex>"#
    )
}

// =============================================================================
// DNS
// =============================================================================

/// Resolver answering from a fixed table; unknown hosts resolve to nothing
#[derive(Default)]
pub struct StaticResolver {
    table: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    pub fn new(entries: &[(&str, &str)]) -> Self {
        let mut table: HashMap<String, Vec<IpAddr>> = HashMap::new();
        for (host, ip) in entries {
            let ip: IpAddr = ip.parse().expect("valid IP literal in test table");
            table.entry((*host).to_string()).or_default().push(ip);
        }
        Self { table }
    }
}

impl HostResolver for StaticResolver {
    fn resolve(&self, host: &str) -> Vec<IpAddr> {
        self.table.get(host).cloned().unwrap_or_default()
    }
}
