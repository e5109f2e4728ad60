//! Plain HTTP access to robots.txt and sitemap files
//!
//! These are static files, so they are fetched directly rather than
//! rendered in a browsing context.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use reqwest::header::{ACCEPT, LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use tokio::sync::OnceCell;
use url::Url;

use crate::url_safety::SafetyGate;

/// Sitemaps are capped at 50 MB uncompressed by the sitemap protocol
pub const MAX_SITE_FILE_BYTES: usize = 50 * 1024 * 1024;

const MAX_REDIRECTS: usize = 5;

/// Source of robots.txt and sitemap bodies
#[async_trait]
pub trait SiteFiles: Send + Sync {
    /// Body of `url`, or `None` when the server answers with a non-success status
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

/// [`SiteFiles`] over reqwest
///
/// Redirects are followed by hand so every hop passes the safety gate.
pub struct HttpSiteFiles {
    client: OnceCell<Client>,
    gate: SafetyGate,
    user_agent: String,
    timeout: Duration,
}

impl HttpSiteFiles {
    #[must_use]
    pub fn new(gate: SafetyGate, user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: OnceCell::new(),
            gate,
            user_agent: user_agent.into(),
            timeout,
        }
    }

    async fn client(&self) -> Result<&Client> {
        self.client
            .get_or_try_init(|| async {
                Client::builder()
                    .redirect(Policy::none())
                    .build()
                    .context("Failed to build HTTP client")
            })
            .await
    }
}

#[async_trait]
impl SiteFiles for HttpSiteFiles {
    async fn fetch(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let client = self.client().await?;
        let mut current = url.to_string();

        for _ in 0..=MAX_REDIRECTS {
            let response = client
                .get(&current)
                .timeout(self.timeout)
                .header(USER_AGENT, &self.user_agent)
                .header(ACCEPT, "application/xml,text/xml,text/plain;q=0.9,*/*;q=0.1")
                .send()
                .await
                .with_context(|| format!("Failed to fetch {current}"))?;

            let status = response.status();
            if status.is_redirection() {
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .with_context(|| format!("Redirect from {current} without a usable Location"))?;
                let next = Url::parse(&current)?.join(location)?.to_string();
                self.gate.check_async(&next).await.into_result(&next)?;
                log::debug!("{current} redirected to {next}");
                current = next;
                continue;
            }

            if !status.is_success() {
                log::debug!("{current} answered {status}");
                return Ok(None);
            }
            return read_capped(response, &current).await.map(Some);
        }

        bail!("Too many redirects fetching {url}")
    }
}

/// Stream a body, refusing anything past [`MAX_SITE_FILE_BYTES`]
async fn read_capped(response: reqwest::Response, url: &str) -> Result<Vec<u8>> {
    let expected = response.content_length().unwrap_or(0);
    if expected > MAX_SITE_FILE_BYTES as u64 {
        bail!("{url} is {expected} bytes, over the {MAX_SITE_FILE_BYTES} byte limit");
    }

    let mut body = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.with_context(|| format!("Failed to read body of {url}"))?;
        if body.len() + chunk.len() > MAX_SITE_FILE_BYTES {
            bail!("{url} exceeded the {MAX_SITE_FILE_BYTES} byte limit");
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}
