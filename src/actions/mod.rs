//! Page interactions run between navigation and extraction
//!
//! Actions arrive as JSON objects tagged by `type` and are decoded once into
//! [`PageAction`]. The executor runs them in order and stops at the first
//! failure, reporting its index.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::browser::PageSession;
use crate::errors::{ScrapeError, ScrapeResult};

const DEFAULT_WAIT_TIMEOUT_MS: u64 = 30_000;
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    #[default]
    Down,
    Left,
    Right,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PageAction {
    /// Sleep for `milliseconds`, wait for `selector`, or wait for the document to finish loading
    Wait {
        #[serde(default)]
        milliseconds: Option<u64>,
        #[serde(default)]
        selector: Option<String>,
        #[serde(default = "default_wait_timeout")]
        timeout: u64,
    },
    Click {
        selector: String,
        #[serde(default = "default_click_count", alias = "clickCount")]
        click_count: u32,
    },
    /// Scroll the window, or the element matching `selector`.
    /// Without `amount` one viewport (or element box) is scrolled.
    Scroll {
        #[serde(default)]
        direction: ScrollDirection,
        #[serde(default)]
        amount: Option<i64>,
        #[serde(default)]
        selector: Option<String>,
    },
    #[serde(alias = "write")]
    Type {
        selector: String,
        text: String,
        #[serde(default)]
        clear: bool,
    },
    Press {
        key: String,
        #[serde(default)]
        selector: Option<String>,
    },
    Screenshot {
        #[serde(default = "default_full_page", alias = "fullPage")]
        full_page: bool,
    },
}

fn default_wait_timeout() -> u64 {
    DEFAULT_WAIT_TIMEOUT_MS
}

fn default_click_count() -> u32 {
    1
}

fn default_full_page() -> bool {
    true
}

impl PageAction {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Wait { .. } => "wait",
            Self::Click { .. } => "click",
            Self::Scroll { .. } => "scroll",
            Self::Type { .. } => "type",
            Self::Press { .. } => "press",
            Self::Screenshot { .. } => "screenshot",
        }
    }

    fn validate(&self) -> Result<(), String> {
        match self {
            Self::Click { selector, .. } | Self::Type { selector, .. } if selector.trim().is_empty() => {
                Err(format!("{} action requires a non-empty selector", self.kind()))
            }
            Self::Press { key, .. } if key.trim().is_empty() => {
                Err("press action requires a key".to_string())
            }
            Self::Click { click_count: 0, .. } => Err("click_count must be at least 1".to_string()),
            Self::Wait {
                selector: Some(selector),
                ..
            } if selector.trim().is_empty() => Err("wait selector must not be empty".to_string()),
            _ => Ok(()),
        }
    }
}

/// Reject malformed actions before any navigation happens
pub fn validate_actions(actions: &[PageAction]) -> ScrapeResult<()> {
    for (index, action) in actions.iter().enumerate() {
        action
            .validate()
            .map_err(|message| ScrapeError::InvalidAction { index, message })?;
    }
    Ok(())
}

/// Run actions in order; returns base64 PNGs captured by screenshot actions
pub async fn execute_actions(
    page: &dyn PageSession,
    actions: &[PageAction],
) -> ScrapeResult<Vec<String>> {
    let mut screenshots = Vec::new();

    for (index, action) in actions.iter().enumerate() {
        let result = match action {
            PageAction::Wait {
                milliseconds,
                selector,
                timeout,
            } => execute_wait(page, *milliseconds, selector.as_deref(), *timeout).await,
            PageAction::Click {
                selector,
                click_count,
            } => page.click(selector, *click_count).await,
            PageAction::Scroll {
                direction,
                amount,
                selector,
            } => match scroll_script(*direction, *amount, selector.as_deref()) {
                Ok(script) => page.evaluate(&script).await.map(|_| ()),
                Err(e) => Err(e),
            },
            PageAction::Type {
                selector,
                text,
                clear,
            } => page.type_text(selector, text, *clear).await,
            PageAction::Press { key, selector } => page.press_key(key, selector.as_deref()).await,
            PageAction::Screenshot { full_page } => page
                .screenshot(*full_page)
                .await
                .map(|bytes| screenshots.push(BASE64.encode(bytes))),
        };

        result.map_err(|e| ScrapeError::InvalidAction {
            index,
            message: format!("{} failed: {e:#}", action.kind()),
        })?;
        debug!(index, kind = action.kind(), "Action executed");
    }

    Ok(screenshots)
}

async fn execute_wait(
    page: &dyn PageSession,
    milliseconds: Option<u64>,
    selector: Option<&str>,
    timeout_ms: u64,
) -> Result<()> {
    let timeout = Duration::from_millis(timeout_ms);
    match (milliseconds, selector) {
        (Some(ms), _) => {
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(())
        }
        (None, Some(selector)) => wait_for_selector(page, selector, timeout).await,
        (None, None) => wait_for_ready_state(page, timeout).await,
    }
}

/// Poll until `selector` matches an element or `timeout` elapses
pub async fn wait_for_selector(
    page: &dyn PageSession,
    selector: &str,
    timeout: Duration,
) -> Result<()> {
    let script = format!(
        "document.querySelector({}) !== null",
        serde_json::to_string(selector)?
    );
    poll_until_true(page, &script, timeout)
        .await
        .with_context(|| format!("Selector {selector} did not appear"))
}

async fn wait_for_ready_state(page: &dyn PageSession, timeout: Duration) -> Result<()> {
    poll_until_true(page, "document.readyState === 'complete'", timeout)
        .await
        .context("Document did not finish loading")
}

async fn poll_until_true(page: &dyn PageSession, script: &str, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        if page.evaluate(script).await?.as_bool() == Some(true) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            anyhow::bail!("timed out after {}ms", timeout.as_millis());
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn scroll_script(
    direction: ScrollDirection,
    amount: Option<i64>,
    selector: Option<&str>,
) -> Result<String> {
    let amount_js = amount.map_or_else(|| "null".to_string(), |a| a.to_string());
    let (axis, sign) = match direction {
        ScrollDirection::Down => ("y", ""),
        ScrollDirection::Up => ("y", "-"),
        ScrollDirection::Right => ("x", ""),
        ScrollDirection::Left => ("x", "-"),
    };

    Ok(match selector {
        Some(selector) => format!(
            r"(function() {{
                const el = document.querySelector({sel});
                if (!el) {{ throw new Error('No element matches selector'); }}
                const amount = {amount_js};
                if ('{axis}' === 'y') {{
                    el.scrollTop += {sign}(amount || el.clientHeight);
                }} else {{
                    el.scrollLeft += {sign}(amount || el.clientWidth);
                }}
                return true;
            }})()",
            sel = serde_json::to_string(selector)?
        ),
        None => format!(
            r"(function() {{
                const amount = {amount_js};
                if ('{axis}' === 'y') {{
                    window.scrollBy(0, {sign}(amount || window.innerHeight));
                }} else {{
                    window.scrollBy({sign}(amount || window.innerWidth), 0);
                }}
                return true;
            }})()"
        ),
    })
}
