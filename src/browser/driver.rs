//! Browser automation seam
//!
//! The pool, fetcher and crawl engine only talk to these traits. The
//! chromium backend lives in [`super::chromium`]; tests plug in fakes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::proxy_pool::ProxyEndpoint;

/// Flags always passed to the engine process
pub const BASE_LAUNCH_ARGS: &[&str] = &["--no-sandbox", "--disable-setuid-sandbox"];

#[derive(Debug, Clone)]
pub struct LaunchOptions {
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            user_agent: crate::utils::DEFAULT_USER_AGENT.to_string(),
            viewport: (
                crate::utils::DEFAULT_VIEWPORT_WIDTH,
                crate::utils::DEFAULT_VIEWPORT_HEIGHT,
            ),
            args: BASE_LAUNCH_ARGS.iter().map(|s| (*s).to_string()).collect(),
        }
    }
}

/// Identity of a new browsing context
#[derive(Debug, Clone, Default)]
pub struct ContextOptions {
    pub user_agent: String,
    pub viewport: (u32, u32),
    pub proxy: Option<ProxyEndpoint>,
    pub extra_headers: BTreeMap<String, String>,
}

/// Navigation milestone `goto` waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaitUntil {
    Load,
    #[serde(rename = "domcontentloaded")]
    DomContentLoaded,
    #[default]
    #[serde(rename = "networkidle")]
    NetworkIdle,
}

/// Returned (inside `anyhow::Error`) when `goto` exceeds its timeout
#[derive(Debug, Clone, Error)]
#[error("navigation to {url} timed out after {after:?}")]
pub struct NavigationTimeout {
    pub url: String,
    pub after: Duration,
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn BrowserEngine>>;
}

/// One running engine process
#[async_trait]
pub trait BrowserEngine: Send + Sync {
    async fn new_context(&self, options: ContextOptions) -> Result<Box<dyn BrowsingContext>>;

    async fn close(&self) -> Result<()>;
}

/// Isolated cookie/storage scope inside an engine
#[async_trait]
pub trait BrowsingContext: Send + Sync {
    fn id(&self) -> &str;

    async fn new_page(&self) -> Result<Box<dyn PageSession>>;

    /// Best-effort wipe of cookies and storage before reuse
    async fn clear_state(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;
}

#[async_trait]
pub trait PageSession: Send + Sync {
    /// Navigate and return the main document's HTTP status, when known
    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout: Duration)
    -> Result<Option<u16>>;

    /// Address of the loaded document, after any redirects
    async fn current_url(&self) -> Result<Option<String>>;

    async fn content(&self) -> Result<String>;

    /// Evaluate a script; `undefined` comes back as `Value::Null`
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// PNG bytes
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>>;

    async fn click(&self, selector: &str, click_count: u32) -> Result<()>;

    async fn type_text(&self, selector: &str, text: &str, clear: bool) -> Result<()>;

    async fn press_key(&self, key: &str, selector: Option<&str>) -> Result<()>;

    async fn close(&self) -> Result<()>;
}
