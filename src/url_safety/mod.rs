//! SSRF gate consulted before every fetch
//!
//! A URL passes when its scheme is http/https, its host is not a known
//! internal or metadata hostname, and neither the literal host nor any
//! address it resolves to falls in a private, loopback, link-local,
//! multicast, reserved, carrier-grade-NAT or metadata range.
//!
//! Hosts that fail to resolve pass the gate; the navigation fails later on
//! its own.

pub mod ranges;

use std::net::{IpAddr, ToSocketAddrs};
use std::sync::Arc;

use tracing::{debug, warn};
use url::{Host, Url};

use crate::errors::{ScrapeError, ScrapeResult};

pub use ranges::is_blocked_ip;

/// Literal hostnames rejected without resolution
pub const BLOCKED_HOSTNAMES: &[&str] = &[
    "localhost",
    "localhost.localdomain",
    "metadata.google.internal",
    "metadata.google.com",
    "instance-data",
];

/// Resolves a hostname to candidate addresses
///
/// Injected so tests can run the gate without touching DNS.
pub trait HostResolver: Send + Sync {
    fn resolve(&self, host: &str) -> Vec<IpAddr>;
}

/// Resolver backed by the operating system (`getaddrinfo`)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

impl HostResolver for SystemResolver {
    fn resolve(&self, host: &str) -> Vec<IpAddr> {
        match (host, 0u16).to_socket_addrs() {
            Ok(addrs) => addrs.map(|a| a.ip()).collect(),
            Err(e) => {
                debug!("Could not resolve {host}: {e}");
                Vec::new()
            }
        }
    }
}

/// Outcome of a gate check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyVerdict {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl SafetyVerdict {
    fn pass() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn block(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }

    /// Turn a blocked verdict into `ScrapeError::SafetyBlocked`
    pub fn into_result(self, url: &str) -> ScrapeResult<()> {
        if self.allowed {
            Ok(())
        } else {
            Err(ScrapeError::SafetyBlocked {
                url: url.to_string(),
                reason: self.reason.unwrap_or_else(|| "blocked".to_string()),
            })
        }
    }
}

#[derive(Clone)]
pub struct SafetyGate {
    resolver: Arc<dyn HostResolver>,
    allow_internal: bool,
}

impl std::fmt::Debug for SafetyGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyGate")
            .field("allow_internal", &self.allow_internal)
            .finish_non_exhaustive()
    }
}

impl Default for SafetyGate {
    fn default() -> Self {
        Self::new(Arc::new(SystemResolver), false)
    }
}

impl SafetyGate {
    pub fn new(resolver: Arc<dyn HostResolver>, allow_internal: bool) -> Self {
        Self {
            resolver,
            allow_internal,
        }
    }

    /// Check a URL; synchronous and may block on DNS
    #[must_use]
    pub fn check(&self, raw: &str) -> SafetyVerdict {
        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => return SafetyVerdict::block(format!("Invalid URL: {e}")),
        };

        if !matches!(url.scheme(), "http" | "https") {
            return SafetyVerdict::block(format!(
                "Invalid URL scheme: {}. Only http and https are allowed.",
                url.scheme()
            ));
        }

        let verdict = match url.host() {
            None => SafetyVerdict::block("URL must have a hostname"),
            Some(Host::Ipv4(ip)) => self.check_ip(IpAddr::V4(ip), None),
            Some(Host::Ipv6(ip)) => self.check_ip(IpAddr::V6(ip), None),
            Some(Host::Domain(domain)) => self.check_domain(domain),
        };

        if !verdict.allowed {
            warn!(
                url = raw,
                reason = verdict.reason.as_deref().unwrap_or_default(),
                "URL blocked by safety gate"
            );
        }
        verdict
    }

    /// `check` on the blocking thread pool, for use from async code
    pub async fn check_async(&self, raw: &str) -> SafetyVerdict {
        let gate = self.clone();
        let url = raw.to_string();
        match tokio::task::spawn_blocking(move || gate.check(&url)).await {
            Ok(verdict) => verdict,
            Err(e) => SafetyVerdict::block(format!("URL validation error: {e}")),
        }
    }

    fn check_domain(&self, domain: &str) -> SafetyVerdict {
        let lower = domain.trim_end_matches('.').to_ascii_lowercase();
        if BLOCKED_HOSTNAMES.contains(&lower.as_str()) {
            return SafetyVerdict::block(format!("Blocked hostname: {domain}"));
        }

        for ip in self.resolver.resolve(&lower) {
            let verdict = self.check_ip(ip, Some(domain));
            if !verdict.allowed {
                return verdict;
            }
        }
        SafetyVerdict::pass()
    }

    fn check_ip(&self, ip: IpAddr, resolved_from: Option<&str>) -> SafetyVerdict {
        if self.allow_internal || !is_blocked_ip(ip) {
            return SafetyVerdict::pass();
        }
        match resolved_from {
            Some(host) => {
                SafetyVerdict::block(format!("Hostname resolves to blocked IP: {host} -> {ip}"))
            }
            None => SafetyVerdict::block(format!(
                "Access to internal/private IP addresses is not allowed: {ip}"
            )),
        }
    }
}

/// Check a URL with the system resolver and no internal allowance
#[must_use]
pub fn check_url(raw: &str) -> SafetyVerdict {
    SafetyGate::default().check(raw)
}
