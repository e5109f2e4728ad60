//! chromiumoxide backend for the driver traits
//!
//! One `Browser` process per engine; each browsing context is a CDP
//! `BrowserContext` so cookies and storage never leak between contexts.
//! Proxies are bound per context via `proxyServer`; credentials are answered
//! through the Fetch domain on every page of that context.
//!
//! Reuse wipes cookies for the whole context and site data (storage, cache,
//! service workers) for every origin a page of the context has visited.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::Browser;
use chromiumoxide::cdp::browser_protocol::browser::{BrowserContextId, CloseParams};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    AuthChallengeResponse, AuthChallengeResponseResponse, ContinueRequestParams,
    ContinueWithAuthParams, EnableParams, EventAuthRequired, EventRequestPaused,
};
use chromiumoxide::cdp::browser_protocol::network::{
    Headers, SetExtraHttpHeadersParams, SetUserAgentOverrideParams,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, CaptureScreenshotParams, EventDomContentEventFired,
};
use chromiumoxide::cdp::browser_protocol::storage::{ClearCookiesParams, ClearDataForOriginParams};
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use futures::StreamExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use url::Url;

use super::driver::{
    BrowserDriver, BrowserEngine, BrowsingContext, ContextOptions, LaunchOptions,
    NavigationTimeout, PageSession, WaitUntil,
};
use crate::browser_setup;

const READY_STATE_SCRIPT: &str = r"
    (function() {
        return {
            readyState: document.readyState,
            bodyExists: document.body !== null
        };
    })()
";

/// Everything `Storage.clearDataForOrigin` knows except cookies, which are
/// cleared context-wide
const SITE_DATA_TYPES: &str = "file_systems,indexeddb,local_storage,shader_cache,websql,service_workers,cache_storage";

const STATUS_SCRIPT: &str = r"
    (function() {
        const nav = performance.getEntriesByType('navigation')[0];
        return nav && nav.responseStatus ? nav.responseStatus : null;
    })()
";

/// Launches Chromium through [`browser_setup::launch_browser`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ChromiumDriver;

#[async_trait]
impl BrowserDriver for ChromiumDriver {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn BrowserEngine>> {
        let profile_dir = std::env::temp_dir().join(format!(
            "simplecrawl_chrome_{}",
            uuid::Uuid::new_v4().simple()
        ));

        let (browser, handler, user_data_dir) =
            browser_setup::launch_browser(options, Some(profile_dir)).await?;

        Ok(Arc::new(ChromiumEngine {
            browser: Arc::new(browser),
            handler: Mutex::new(Some(handler)),
            user_data_dir,
        }))
    }
}

pub struct ChromiumEngine {
    browser: Arc<Browser>,
    handler: Mutex<Option<JoinHandle<()>>>,
    user_data_dir: PathBuf,
}

impl ChromiumEngine {
    fn cleanup_temp_dir(&self) {
        if let Err(e) = std::fs::remove_dir_all(&self.user_data_dir) {
            debug!(
                "Failed to clean up temp directory {}: {}",
                self.user_data_dir.display(),
                e
            );
        }
    }
}

#[async_trait]
impl BrowserEngine for ChromiumEngine {
    async fn new_context(&self, options: ContextOptions) -> Result<Box<dyn BrowsingContext>> {
        let mut params = CreateBrowserContextParams::default();
        params.dispose_on_detach = Some(true);
        if let Some(proxy) = &options.proxy {
            params.proxy_server = Some(proxy.server.clone());
        }

        let created = self
            .browser
            .execute(params)
            .await
            .context("Failed to create browser context")?;
        let id = created.result.browser_context_id.clone();
        debug!("Created browser context {}", id.inner());

        Ok(Box::new(ChromiumContext {
            id_str: id.inner().clone(),
            id,
            browser: Arc::clone(&self.browser),
            options,
            visited: Arc::new(Mutex::new(HashSet::new())),
        }))
    }

    async fn close(&self) -> Result<()> {
        info!("Closing browser engine");
        if let Err(e) = self.browser.execute(CloseParams::default()).await {
            warn!("Browser close command failed: {}", e);
        }
        if let Some(handler) = self.handler.lock().take() {
            handler.abort();
        }
        self.cleanup_temp_dir();
        Ok(())
    }
}

impl Drop for ChromiumEngine {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.lock().take() {
            handler.abort();
        }
    }
}

struct ChromiumContext {
    id: BrowserContextId,
    id_str: String,
    browser: Arc<Browser>,
    options: ContextOptions,
    /// Origins loaded by this context's pages since the last wipe
    visited: Arc<Mutex<HashSet<String>>>,
}

impl ChromiumContext {
    async fn blank_page(&self) -> Result<Page> {
        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(self.id.clone())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build target params: {e}"))?;

        self.browser
            .new_page(target)
            .await
            .context("Failed to create page")
    }
}

#[async_trait]
impl BrowsingContext for ChromiumContext {
    fn id(&self) -> &str {
        &self.id_str
    }

    async fn new_page(&self) -> Result<Box<dyn PageSession>> {
        let page = self.blank_page().await?;

        page.execute(SetUserAgentOverrideParams::new(
            self.options.user_agent.clone(),
        ))
        .await
        .context("Failed to set user agent")?;

        let (width, height) = self.options.viewport;
        page.execute(SetDeviceMetricsOverrideParams::new(
            i64::from(width),
            i64::from(height),
            1.0,
            false,
        ))
        .await
        .context("Failed to set viewport")?;

        if !self.options.extra_headers.is_empty() {
            let headers = serde_json::to_value(&self.options.extra_headers)?;
            page.execute(SetExtraHttpHeadersParams::new(Headers::new(headers)))
                .await
                .context("Failed to set extra headers")?;
        }

        if let Some(proxy) = &self.options.proxy
            && let Some(username) = &proxy.username
        {
            install_proxy_auth(
                &page,
                username.clone(),
                proxy.password.clone().unwrap_or_default(),
            )
            .await?;
        }

        Ok(Box::new(ChromiumPage {
            page,
            visited: Arc::clone(&self.visited),
        }))
    }

    async fn clear_state(&self) -> Result<()> {
        self.browser
            .execute(ClearCookiesParams {
                browser_context_id: Some(self.id.clone()),
            })
            .await
            .context("Failed to clear cookies")?;

        let origins: Vec<String> = self.visited.lock().drain().collect();
        if origins.is_empty() {
            return Ok(());
        }

        // Storage commands act on the partition of the target they are sent
        // to, so they go through a page inside this context
        let page = self.blank_page().await?;
        let mut cleared = Ok(());
        for origin in origins {
            let params = ClearDataForOriginParams::new(origin.clone(), SITE_DATA_TYPES);
            if let Err(e) = page.execute(params).await {
                cleared = Err(anyhow::anyhow!("Failed to clear site data for {origin}: {e}"));
                break;
            }
        }
        if let Err(e) = page.close().await {
            debug!("Failed to close storage wipe page: {}", e);
        }
        cleared
    }

    async fn close(&self) -> Result<()> {
        self.browser
            .execute(DisposeBrowserContextParams::new(self.id.clone()))
            .await
            .context("Failed to dispose browser context")?;
        debug!("Disposed browser context {}", self.id_str);
        Ok(())
    }
}

/// Answer proxy auth challenges and release paused requests for one page
async fn install_proxy_auth(page: &Page, username: String, password: String) -> Result<()> {
    let mut auth_events = page
        .event_listener::<EventAuthRequired>()
        .await
        .context("Failed to listen for auth challenges")?;
    let mut paused_events = page
        .event_listener::<EventRequestPaused>()
        .await
        .context("Failed to listen for paused requests")?;

    page.execute(EnableParams::builder().handle_auth_requests(true).build())
        .await
        .context("Failed to enable fetch domain")?;

    let auth_page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = auth_events.next().await {
            let response = AuthChallengeResponse {
                response: AuthChallengeResponseResponse::ProvideCredentials,
                username: Some(username.clone()),
                password: Some(password.clone()),
            };
            if let Err(e) = auth_page
                .execute(ContinueWithAuthParams::new(
                    event.request_id.clone(),
                    response,
                ))
                .await
            {
                debug!("continueWithAuth failed: {}", e);
            }
        }
    });

    let paused_page = page.clone();
    tokio::spawn(async move {
        while let Some(event) = paused_events.next().await {
            if let Err(e) = paused_page
                .execute(ContinueRequestParams::new(event.request_id.clone()))
                .await
            {
                debug!("continueRequest failed: {}", e);
            }
        }
    });

    Ok(())
}

struct ChromiumPage {
    page: Page,
    visited: Arc<Mutex<HashSet<String>>>,
}

impl ChromiumPage {
    /// Poll until `document.readyState === 'complete'`, then let late requests settle
    async fn wait_for_idle(&self, deadline: Instant) {
        let poll_interval = Duration::from_millis(100);
        while Instant::now() < deadline {
            if let Ok(value) = self.evaluate(READY_STATE_SCRIPT).await {
                let ready = value.get("readyState").and_then(|v| v.as_str()) == Some("complete");
                let body = value
                    .get("bodyExists")
                    .and_then(serde_json::Value::as_bool)
                    .unwrap_or(false);
                if ready && body {
                    let settle = Duration::from_millis(500)
                        .min(deadline.saturating_duration_since(Instant::now()));
                    tokio::time::sleep(settle).await;
                    return;
                }
            }
            tokio::time::sleep(poll_interval).await;
        }
        debug!("Idle wait hit deadline, proceeding");
    }

    async fn record_origin(&self) {
        if let Ok(Some(url)) = self.page.url().await
            && let Some(origin) = site_origin(&url)
        {
            self.visited.lock().insert(origin);
        }
    }

    async fn element(&self, selector: &str) -> Result<chromiumoxide::Element> {
        self.page
            .find_element(selector)
            .await
            .with_context(|| format!("No element matches selector {selector}"))
    }
}

#[async_trait]
impl PageSession for ChromiumPage {
    async fn goto(
        &self,
        url: &str,
        wait_until: WaitUntil,
        timeout: Duration,
    ) -> Result<Option<u16>> {
        let deadline = Instant::now() + timeout;

        let navigation = async {
            match wait_until {
                WaitUntil::Load => {
                    self.page
                        .goto(url)
                        .await
                        .with_context(|| format!("Navigation to {url} failed"))?;
                }
                WaitUntil::DomContentLoaded => {
                    let mut dom_ready = self
                        .page
                        .event_listener::<EventDomContentEventFired>()
                        .await
                        .context("Failed to listen for DOMContentLoaded")?;
                    // Whichever comes first; `goto` itself settles on load
                    tokio::select! {
                        navigated = self.page.goto(url) => {
                            navigated.with_context(|| format!("Navigation to {url} failed"))?;
                        }
                        _ = dom_ready.next() => {}
                    }
                }
                WaitUntil::NetworkIdle => {
                    self.page
                        .goto(url)
                        .await
                        .with_context(|| format!("Navigation to {url} failed"))?;
                    self.wait_for_idle(deadline).await;
                }
            }
            Ok::<_, anyhow::Error>(())
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(anyhow::Error::new(NavigationTimeout {
                    url: url.to_string(),
                    after: timeout,
                }));
            }
        }

        self.record_origin().await;

        let status = self
            .evaluate(STATUS_SCRIPT)
            .await
            .ok()
            .and_then(|v| v.as_u64())
            .and_then(|s| u16::try_from(s).ok());
        Ok(status)
    }

    async fn current_url(&self) -> Result<Option<String>> {
        self.page.url().await.context("Failed to read page URL")
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .context("Failed to read page content")
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| anyhow::anyhow!("Script evaluation failed: {e}"))?;
        Ok(result
            .into_value::<serde_json::Value>()
            .unwrap_or(serde_json::Value::Null))
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        let params = CaptureScreenshotParams {
            format: Some(CaptureScreenshotFormat::Png),
            capture_beyond_viewport: Some(full_page),
            ..Default::default()
        };
        self.page
            .screenshot(params)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to capture screenshot: {e}"))
    }

    async fn click(&self, selector: &str, click_count: u32) -> Result<()> {
        let element = self.element(selector).await?;
        for _ in 0..click_count.max(1) {
            element
                .click()
                .await
                .with_context(|| format!("Failed to click {selector}"))?;
        }
        Ok(())
    }

    async fn type_text(&self, selector: &str, text: &str, clear: bool) -> Result<()> {
        let element = self.element(selector).await?;
        if clear {
            let script = format!(
                "(function() {{ const el = document.querySelector({}); if (el) {{ el.value = ''; }} }})()",
                serde_json::to_string(selector)?
            );
            self.evaluate(&script).await?;
        }
        element
            .click()
            .await
            .with_context(|| format!("Failed to focus {selector}"))?;
        element
            .type_str(text)
            .await
            .with_context(|| format!("Failed to type into {selector}"))?;
        Ok(())
    }

    async fn press_key(&self, key: &str, selector: Option<&str>) -> Result<()> {
        let element = self.element(selector.unwrap_or("body")).await?;
        if selector.is_some() {
            element.focus().await.context("Failed to focus element")?;
        }
        element
            .press_key(key)
            .await
            .with_context(|| format!("Failed to press {key}"))?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.page
            .clone()
            .close()
            .await
            .context("Failed to close page")
    }
}

/// `scheme://host[:port]` for http(s) pages; nothing for opaque origins
fn site_origin(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    Some(parsed.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_site_origin() {
        assert_eq!(
            site_origin("https://docs.example.com/guide?x=1#top").as_deref(),
            Some("https://docs.example.com")
        );
        assert_eq!(
            site_origin("http://example.com:8080/").as_deref(),
            Some("http://example.com:8080")
        );
        assert_eq!(site_origin("about:blank"), None);
        assert_eq!(site_origin("data:text/html,hi"), None);
    }
}
