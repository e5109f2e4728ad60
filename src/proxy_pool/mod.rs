//! Egress proxy rotation with per-proxy health tracking
//!
//! Proxies are loaded once at construction and never removed. A proxy that
//! accumulates `max_failures` failures is put into a time-based cooldown;
//! there is no success-based reset. When every proxy is cooling down,
//! `next()` degrades to the one that recovers soonest instead of failing.

pub mod record;

use std::path::Path;
use std::str::FromStr;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;

pub use record::{ProxyEndpoint, ProxyRecord, parse_proxy_url};

/// How `next()` walks the proxy list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RotationStrategy {
    #[default]
    RoundRobin,
    Random,
}

impl FromStr for RotationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "round_robin" | "roundrobin" | "round-robin" => Ok(Self::RoundRobin),
            "random" => Ok(Self::Random),
            other => Err(format!("unknown rotation strategy '{other}'")),
        }
    }
}

/// Snapshot of one proxy for `ProxyPool::stats`
#[derive(Debug, Clone, Serialize)]
pub struct ProxyStat {
    pub server: String,
    pub success_count: u64,
    pub failure_count: u64,
    pub failure_rate: f64,
    pub is_healthy: bool,
    pub in_cooldown: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProxyPoolStats {
    pub total: usize,
    pub healthy: usize,
    pub proxies: Vec<ProxyStat>,
}

#[derive(Debug)]
struct PoolState {
    records: Vec<ProxyRecord>,
    cursor: usize,
}

/// Thread-safe proxy pool
///
/// All record mutation happens under one `parking_lot::Mutex`; the lock is
/// never held across an await point.
#[derive(Debug)]
pub struct ProxyPool {
    state: Mutex<PoolState>,
    strategy: RotationStrategy,
    max_failures: u32,
    cooldown: Duration,
}

impl ProxyPool {
    pub fn new(
        endpoints: Vec<ProxyEndpoint>,
        strategy: RotationStrategy,
        max_failures: u32,
        cooldown: Duration,
    ) -> Self {
        let records: Vec<ProxyRecord> = endpoints.into_iter().map(ProxyRecord::new).collect();

        if records.is_empty() {
            info!("Proxy pool empty: no proxies configured");
        } else {
            info!(
                count = records.len(),
                ?strategy,
                "Proxy pool initialized"
            );
        }

        Self {
            state: Mutex::new(PoolState { records, cursor: 0 }),
            strategy,
            max_failures: max_failures.max(1),
            cooldown,
        }
    }

    /// Pool with no proxies; `has_proxies()` is false
    #[must_use]
    pub fn empty() -> Self {
        Self::new(Vec::new(), RotationStrategy::RoundRobin, 1, Duration::ZERO)
    }

    /// Build the pool described by the service configuration
    ///
    /// Returns an empty pool unless rotation is enabled and a proxy URL or
    /// list file is set. A list file takes precedence over a single URL.
    #[must_use]
    pub fn from_config(config: &ServiceConfig) -> Self {
        if !config.proxies_configured() {
            debug!("Proxy rotation not enabled or no proxies configured");
            return Self::empty();
        }

        let endpoints = if let Some(path) = config.proxy_list_file() {
            load_proxy_file(path)
        } else if let Some(url) = config.proxy_url() {
            match parse_proxy_url(url) {
                Ok(endpoint) => vec![endpoint],
                Err(e) => {
                    warn!("Skipping unparseable proxy URL: {e:#}");
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        Self::new(
            endpoints,
            config.proxy_rotation_strategy(),
            config.proxy_max_failures(),
            config.proxy_cooldown(),
        )
    }

    #[must_use]
    pub fn has_proxies(&self) -> bool {
        !self.state.lock().records.is_empty()
    }

    #[must_use]
    pub fn proxy_count(&self) -> usize {
        self.state.lock().records.len()
    }

    #[must_use]
    pub fn healthy_count(&self) -> usize {
        let now = Instant::now();
        self.state
            .lock()
            .records
            .iter()
            .filter(|r| r.is_healthy_at(now))
            .count()
    }

    /// Pick the next proxy, or `None` when the pool is empty
    pub fn next(&self) -> Option<ProxyEndpoint> {
        let mut state = self.state.lock();
        let count = state.records.len();
        if count == 0 {
            return None;
        }

        let now = Instant::now();
        let mut rng = rand::rng();

        for _ in 0..count {
            let idx = match self.strategy {
                RotationStrategy::Random => rng.random_range(0..count),
                RotationStrategy::RoundRobin => {
                    let idx = state.cursor;
                    state.cursor = (state.cursor + 1) % count;
                    idx
                }
            };

            let record = &mut state.records[idx];
            if record.is_healthy_at(now) {
                record.last_used = Some(now);
                debug!(server = %record.endpoint.server, "Proxy selected");
                return Some(record.endpoint.clone());
            }
        }

        // Every candidate hit a cooling proxy: fall back to the earliest recovery
        let earliest = state
            .records
            .iter_mut()
            .min_by_key(|r| r.cooldown_until)?;
        earliest.last_used = Some(now);
        warn!(
            using = %earliest.endpoint.server,
            "All proxies in cooldown, using earliest recovering proxy"
        );
        Some(earliest.endpoint.clone())
    }

    pub fn report_success(&self, server: &str) {
        let mut state = self.state.lock();
        if let Some(record) = state.records.iter_mut().find(|r| r.endpoint.server == server) {
            record.success_count += 1;
            debug!(server, total_success = record.success_count, "Proxy success");
        }
    }

    pub fn report_failure(&self, server: &str) {
        let mut state = self.state.lock();
        let Some(record) = state.records.iter_mut().find(|r| r.endpoint.server == server) else {
            return;
        };

        record.failure_count += 1;
        warn!(server, total_failures = record.failure_count, "Proxy failure");

        if record.failure_count >= u64::from(self.max_failures) {
            record.cooldown_until = Some(Instant::now() + self.cooldown);
            warn!(
                server,
                cooldown_secs = self.cooldown.as_secs(),
                "Proxy cooldown started"
            );
        }
    }

    #[must_use]
    pub fn stats(&self) -> ProxyPoolStats {
        let now = Instant::now();
        let state = self.state.lock();
        let proxies: Vec<ProxyStat> = state
            .records
            .iter()
            .map(|r| ProxyStat {
                server: r.endpoint.server.clone(),
                success_count: r.success_count,
                failure_count: r.failure_count,
                failure_rate: (r.failure_rate() * 100.0).round() / 100.0,
                is_healthy: r.is_healthy_at(now),
                in_cooldown: r.in_cooldown_at(now),
            })
            .collect();

        ProxyPoolStats {
            total: proxies.len(),
            healthy: proxies.iter().filter(|p| p.is_healthy).count(),
            proxies,
        }
    }
}

/// Read one proxy URL per line, skipping blanks, `#` comments and bad lines
///
/// A missing or unreadable file yields an empty list; startup continues.
pub fn load_proxy_file(path: &Path) -> Vec<ProxyEndpoint> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            error!("Failed to read proxy list {}: {e}", path.display());
            return Vec::new();
        }
    };

    let endpoints: Vec<ProxyEndpoint> = contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| match parse_proxy_url(line) {
            Ok(endpoint) => Some(endpoint),
            Err(e) => {
                warn!("Skipping unparseable proxy entry: {e:#}");
                None
            }
        })
        .collect();

    info!(
        "Loaded {} proxies from {}",
        endpoints.len(),
        path.display()
    );
    endpoints
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(servers: &[&str]) -> Vec<ProxyEndpoint> {
        servers
            .iter()
            .map(|s| parse_proxy_url(s).expect("valid proxy"))
            .collect()
    }

    #[test]
    fn test_empty_pool_returns_none() {
        let pool = ProxyPool::empty();
        assert!(!pool.has_proxies());
        assert!(pool.next().is_none());
    }

    #[test]
    fn test_round_robin_is_cyclic() {
        let pool = ProxyPool::new(
            endpoints(&["http://a:1", "http://b:1", "http://c:1"]),
            RotationStrategy::RoundRobin,
            3,
            Duration::from_secs(60),
        );

        let picked: Vec<String> = (0..6)
            .filter_map(|_| pool.next())
            .map(|e| e.server)
            .collect();
        assert_eq!(
            picked,
            ["http://a:1", "http://b:1", "http://c:1", "http://a:1", "http://b:1", "http://c:1"]
        );
    }

    #[test]
    fn test_cooldown_skips_proxy() {
        let pool = ProxyPool::new(
            endpoints(&["http://a:1", "http://b:1"]),
            RotationStrategy::RoundRobin,
            3,
            Duration::from_secs(60),
        );

        for _ in 0..3 {
            pool.report_failure("http://a:1");
        }

        for _ in 0..5 {
            assert_eq!(pool.next().map(|e| e.server).as_deref(), Some("http://b:1"));
        }
        assert_eq!(pool.healthy_count(), 1);
    }

    #[test]
    fn test_all_cooling_falls_back_to_earliest() {
        let pool = ProxyPool::new(
            endpoints(&["http://a:1", "http://b:1"]),
            RotationStrategy::RoundRobin,
            1,
            Duration::from_secs(60),
        );

        pool.report_failure("http://b:1");
        std::thread::sleep(Duration::from_millis(5));
        pool.report_failure("http://a:1");

        assert_eq!(pool.healthy_count(), 0);
        assert_eq!(pool.next().map(|e| e.server).as_deref(), Some("http://b:1"));
    }

    #[test]
    fn test_stats_rounding_and_flags() {
        let pool = ProxyPool::new(
            endpoints(&["http://a:1"]),
            RotationStrategy::Random,
            2,
            Duration::from_secs(60),
        );
        pool.report_success("http://a:1");
        pool.report_success("http://a:1");
        pool.report_failure("http://a:1");

        let stats = pool.stats();
        assert_eq!(stats.total, 1);
        assert_eq!(stats.healthy, 1);
        assert!((stats.proxies[0].failure_rate - 0.33).abs() < 1e-9);
        assert!(!stats.proxies[0].in_cooldown);
    }

    #[test]
    fn test_unknown_server_report_is_ignored() {
        let pool = ProxyPool::new(
            endpoints(&["http://a:1"]),
            RotationStrategy::RoundRobin,
            1,
            Duration::from_secs(60),
        );
        pool.report_failure("http://unknown:1");
        assert_eq!(pool.healthy_count(), 1);
    }

    #[test]
    fn test_rotation_strategy_parse() {
        assert_eq!("round_robin".parse(), Ok(RotationStrategy::RoundRobin));
        assert_eq!("Random".parse(), Ok(RotationStrategy::Random));
        assert!("weighted".parse::<RotationStrategy>().is_err());
    }
}
