//! Single-page fetch through the safety gate and the browser pool

pub mod options;
pub mod page_timeout;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actions::{execute_actions, validate_actions, wait_for_selector};
use crate::browser::{NavigationTimeout, PageSession};
use crate::browser_pool::{AcquireOptions, BrowserPool, ContextHandle, ReleaseOutcome};
use crate::errors::{ScrapeError, ScrapeResult};
use crate::page_extractor::{EXTRACTION_METHOD, ParsedPage, html_to_markdown};
use crate::url_safety::SafetyGate;

pub use crate::browser::WaitUntil;
pub use options::{FetchOptions, FetchedPage, OutputFormat, ScrapeData};
pub use page_timeout::with_page_timeout;

/// Fetches and extracts one page
///
/// The crawl engine and batch executor depend on this seam rather than on
/// the browser pool directly.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(
        &self,
        url: &str,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> ScrapeResult<FetchedPage>;
}

pub struct BrowserPageFetcher {
    pool: Arc<BrowserPool>,
    gate: SafetyGate,
}

impl BrowserPageFetcher {
    pub fn new(pool: Arc<BrowserPool>, gate: SafetyGate) -> Self {
        Self { pool, gate }
    }

    async fn fetch_in_context(
        &self,
        handle: &ContextHandle,
        url: &str,
        options: &FetchOptions,
    ) -> ScrapeResult<FetchedPage> {
        let page = with_page_timeout(handle.new_page(), url, options.timeout_ms, "Page open").await?;

        let result = render_page(page.as_ref(), url, options, &self.gate).await;

        if let Err(e) = with_page_timeout(page.close(), url, options.timeout_ms, "Page close").await {
            debug!("Failed to close page for {url}: {e}");
        }
        result
    }
}

#[async_trait]
impl PageFetcher for BrowserPageFetcher {
    async fn fetch_page(
        &self,
        url: &str,
        options: &FetchOptions,
        cancel: &CancellationToken,
    ) -> ScrapeResult<FetchedPage> {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        validate_actions(&options.actions)?;
        self.gate.check_async(url).await.into_result(url)?;

        info!(url, formats = ?options.formats, "Fetching page");

        let acquire = AcquireOptions {
            use_proxy: options.use_proxy,
            extra_headers: options.headers.clone(),
        };
        let handle = self.pool.acquire(&acquire).await?;

        let result = self.fetch_in_context(&handle, url, options).await;

        let outcome = match &result {
            Ok(_) => ReleaseOutcome::Success,
            Err(e) => {
                warn!(url, "Fetch failed: {e}");
                ReleaseOutcome::Failure
            }
        };
        self.pool.release(handle, outcome).await;

        result
    }
}

/// Navigate, wait, run actions and extract the requested formats
///
/// The address the page lands on after redirects goes through `gate`
/// before anything is read from it.
pub async fn render_page(
    page: &dyn PageSession,
    url: &str,
    options: &FetchOptions,
    gate: &SafetyGate,
) -> ScrapeResult<FetchedPage> {
    let timeout = Duration::from_millis(options.timeout_ms);

    let status_code = page
        .goto(url, options.wait_until, timeout)
        .await
        .map_err(|e| navigation_error(url, options.timeout_ms, e))?;

    check_landing(page, url, options.timeout_ms, gate).await?;

    if let Some(selector) = &options.wait_for_selector {
        wait_for_selector(page, selector, timeout)
            .await
            .map_err(|e| {
                debug!("waitForSelector failed on {url}: {e:#}");
                ScrapeError::FetchTimeout {
                    url: url.to_string(),
                    timeout_ms: options.timeout_ms,
                }
            })?;
    }

    let action_screenshots = execute_actions(page, &options.actions).await?;

    let html = with_page_timeout(page.content(), url, options.timeout_ms, "Content read").await?;

    let screenshot = if options.wants(OutputFormat::Screenshot) {
        let bytes =
            with_page_timeout(page.screenshot(true), url, options.timeout_ms, "Screenshot").await?;
        Some(BASE64.encode(bytes))
    } else {
        None
    };

    let mut fetched = extract_page(url, status_code, html, options)?;
    fetched.data.screenshot = screenshot;
    if !options.actions.is_empty() {
        fetched.data.action_screenshots = Some(action_screenshots);
    }
    Ok(fetched)
}

/// Build the requested formats from rendered HTML
pub fn extract_page(
    url: &str,
    status_code: Option<u16>,
    html: String,
    options: &FetchOptions,
) -> ScrapeResult<FetchedPage> {
    let parsed = ParsedPage::parse(&html, url);
    let links = parsed.links();

    let markdown = if options.wants(OutputFormat::Markdown) {
        Some(
            html_to_markdown(&html, options.exclude_tags.as_deref())
                .map_err(|e| ScrapeError::fetch_failed(url, e))?,
        )
    } else {
        None
    };

    let data = ScrapeData {
        markdown,
        html: options.wants(OutputFormat::Html).then(|| html.clone()),
        screenshot: None,
        links: options.wants(OutputFormat::Links).then(|| links.clone()),
        // A rendered page without a recorded status was served successfully
        metadata: options
            .wants(OutputFormat::Metadata)
            .then(|| parsed.metadata(status_code.unwrap_or(200))),
        media: options.wants(OutputFormat::Media).then(|| parsed.media()),
        action_screenshots: None,
        extraction_method: Some(EXTRACTION_METHOD.to_string()),
    };

    Ok(FetchedPage {
        url: url.to_string(),
        status_code,
        visible_text: parsed.visible_text(),
        links,
        html,
        data,
    })
}

/// Re-run the safety gate when navigation ended somewhere else
async fn check_landing(
    page: &dyn PageSession,
    url: &str,
    timeout_ms: u64,
    gate: &SafetyGate,
) -> ScrapeResult<()> {
    let landed = with_page_timeout(page.current_url(), url, timeout_ms, "URL read").await?;
    let Some(landed) = landed else {
        return Ok(());
    };
    if landed == url {
        return Ok(());
    }

    debug!("{url} redirected to {landed}");
    gate.check_async(&landed).await.into_result(&landed).inspect_err(|_| {
        warn!(url, landed = landed.as_str(), "Redirect target blocked by safety gate");
    })
}

fn navigation_error(url: &str, timeout_ms: u64, err: anyhow::Error) -> ScrapeError {
    if err.downcast_ref::<NavigationTimeout>().is_some() {
        ScrapeError::FetchTimeout {
            url: url.to_string(),
            timeout_ms,
        }
    } else {
        ScrapeError::fetch_failed(url, err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakePage, OfflineResolver};

    fn gate() -> SafetyGate {
        SafetyGate::new(Arc::new(OfflineResolver), false)
    }

    const ARTICLE: &str = r#"
        <html lang="en"><head><title>Guide</title></head>
        <body>
            <nav><a href="/">Home</a></nav>
            <h1>Guide</h1>
            <p>Read the <a href="/docs/setup#intro">setup notes</a>.</p>
            <img src="/diagram.png" alt="Diagram">
        </body></html>
    "#;

    #[test]
    fn test_extract_only_requested_formats() {
        let options = FetchOptions::default().with_formats([OutputFormat::Links, OutputFormat::Metadata]);
        let page = extract_page("https://example.com/guide", None, ARTICLE.to_string(), &options)
            .expect("extraction");

        assert!(page.data.markdown.is_none());
        assert!(page.data.html.is_none());
        assert_eq!(
            page.data.links.as_deref(),
            Some(&["https://example.com/".to_string(), "https://example.com/docs/setup".to_string()][..])
        );
        let metadata = page.data.metadata.expect("metadata requested");
        assert_eq!(metadata.title.as_deref(), Some("Guide"));
        assert_eq!(metadata.status_code, 200);
        assert_eq!(page.data.extraction_method.as_deref(), Some("htmd"));
    }

    #[test]
    fn test_links_always_available_to_crawler() {
        let page = extract_page(
            "https://example.com/guide",
            Some(200),
            ARTICLE.to_string(),
            &FetchOptions::default(),
        )
        .expect("extraction");
        assert!(page.data.links.is_none());
        assert_eq!(page.links.len(), 2);
        assert!(page.visible_text.contains("setup notes"));
    }

    #[tokio::test]
    async fn test_render_runs_actions_and_screenshots() {
        let page = FakePage::new(ARTICLE);
        let options = FetchOptions {
            formats: vec![OutputFormat::Markdown, OutputFormat::Screenshot, OutputFormat::Media],
            actions: vec![crate::actions::PageAction::Screenshot { full_page: false }],
            ..FetchOptions::default()
        };

        let fetched = render_page(&page, "https://example.com/guide", &options, &gate())
            .await
            .expect("render");

        assert!(fetched.data.screenshot.is_some());
        assert_eq!(fetched.data.action_screenshots.as_ref().map(Vec::len), Some(1));
        assert!(fetched.data.markdown.as_deref().unwrap_or_default().contains("Guide"));
        assert_eq!(fetched.data.media.as_ref().map(Vec::len), Some(1));
        assert_eq!(page.calls()[0], "goto https://example.com/guide");
    }

    #[tokio::test]
    async fn test_load_condition_reaches_navigation() {
        let page = FakePage::new(ARTICLE);
        let options = FetchOptions {
            wait_until: WaitUntil::DomContentLoaded,
            ..FetchOptions::default()
        };
        render_page(&page, "https://example.com/guide", &options, &gate())
            .await
            .expect("render");
        assert_eq!(page.waits(), vec![WaitUntil::DomContentLoaded]);
    }

    #[tokio::test]
    async fn test_navigation_timeout_maps_to_fetch_timeout() {
        let page = FakePage::new(ARTICLE).navigation_timeout();
        let options = FetchOptions {
            timeout_ms: 50,
            ..FetchOptions::default()
        };
        let err = render_page(&page, "https://slow.example.com", &options, &gate())
            .await
            .expect_err("navigation times out");
        assert!(matches!(err, ScrapeError::FetchTimeout { timeout_ms: 50, .. }));
    }

    #[tokio::test]
    async fn test_redirect_into_private_range_is_blocked() {
        let page = FakePage::new(ARTICLE).redirect_to("http://169.254.169.254/latest/meta-data/");
        let err = render_page(&page, "https://example.com/go", &FetchOptions::default(), &gate())
            .await
            .expect_err("landing address is internal");

        assert!(
            matches!(err, ScrapeError::SafetyBlocked { ref url, .. } if url.starts_with("http://169.254.169.254"))
        );
        assert_eq!(page.calls(), vec!["goto https://example.com/go".to_string()]);
    }

    #[tokio::test]
    async fn test_redirect_to_public_host_is_followed() {
        let page = FakePage::new(ARTICLE).redirect_to("https://www.example.com/guide");
        let fetched = render_page(&page, "https://example.com/guide", &FetchOptions::default(), &gate())
            .await
            .expect("public redirect allowed");
        assert!(fetched.data.markdown.is_some());
    }
}
