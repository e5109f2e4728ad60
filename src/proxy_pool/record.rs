//! Proxy entries: parsing and per-proxy health state

use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;
use url::Url;

/// Egress identity handed to the browser pool
///
/// `server` never carries credentials; it is also the key used when
/// outcomes are reported back to the pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProxyEndpoint {
    pub server: String,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl ProxyEndpoint {
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.username.is_some()
    }
}

/// Parse `scheme://[user:pass@]host[:port]` into an endpoint
///
/// Accepts `http`, `https`, `socks4` and `socks5` schemes.
pub fn parse_proxy_url(raw: &str) -> Result<ProxyEndpoint> {
    let parsed = Url::parse(raw.trim()).with_context(|| format!("Invalid proxy URL: {raw}"))?;

    let scheme = parsed.scheme();
    if !matches!(scheme, "http" | "https" | "socks4" | "socks5") {
        anyhow::bail!("Unsupported proxy scheme '{scheme}' in {raw}");
    }

    let host = parsed
        .host_str()
        .filter(|h| !h.is_empty())
        .with_context(|| format!("Proxy URL has no host: {raw}"))?;

    let server = match parsed.port() {
        Some(port) => format!("{scheme}://{host}:{port}"),
        None => format!("{scheme}://{host}"),
    };

    let username = Some(parsed.username())
        .filter(|u| !u.is_empty())
        .map(str::to_string);
    let password = parsed.password().map(str::to_string);

    Ok(ProxyEndpoint {
        server,
        username,
        password,
    })
}

/// Health counters for one proxy
#[derive(Debug, Clone)]
pub struct ProxyRecord {
    pub endpoint: ProxyEndpoint,
    pub success_count: u64,
    pub failure_count: u64,
    pub last_used: Option<Instant>,
    pub cooldown_until: Option<Instant>,
}

impl ProxyRecord {
    pub(crate) fn new(endpoint: ProxyEndpoint) -> Self {
        Self {
            endpoint,
            success_count: 0,
            failure_count: 0,
            last_used: None,
            cooldown_until: None,
        }
    }

    #[must_use]
    pub fn in_cooldown_at(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    #[must_use]
    pub fn is_healthy_at(&self, now: Instant) -> bool {
        !self.in_cooldown_at(now)
    }

    #[must_use]
    pub fn failure_rate(&self) -> f64 {
        let total = self.success_count + self.failure_count;
        if total == 0 {
            0.0
        } else {
            self.failure_count as f64 / total as f64
        }
    }
}
