//! Configuration loading: builder validation, environment lookup, serde

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use simplecrawl::proxy_pool::RotationStrategy;
use simplecrawl::{ScrapeError, ServiceConfig};

fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_full_environment_is_applied() {
    let config = ServiceConfig::from_lookup(env(&[
        ("HEADLESS", "false"),
        ("USER_AGENT", "FixtureBot/2.0"),
        ("VIEWPORT_WIDTH", "1280"),
        ("VIEWPORT_HEIGHT", "720"),
        ("BROWSER_POOL_SIZE", "2"),
        ("CHROME_EXECUTABLE", "/opt/chromium/chrome"),
        ("PROXY_LIST_FILE", "/etc/simplecrawl/proxies.txt"),
        ("PROXY_ROTATION_ENABLED", "TRUE"),
        ("PROXY_ROTATION_STRATEGY", "Round_Robin"),
        ("PROXY_COOLDOWN_SECONDS", "60"),
        ("MAX_CRAWL_DEPTH", "4"),
        ("MAX_CRAWL_PAGES", "250"),
        ("MAX_CONCURRENT_REQUESTS", "3"),
        ("REQUEST_TIMEOUT_MS", "15000"),
        ("JOB_RETENTION_HOURS", "2"),
        ("ALLOW_INTERNAL_TARGETS", "true"),
    ]))
    .unwrap();

    assert!(!config.headless());
    assert_eq!(config.user_agent(), "FixtureBot/2.0");
    assert_eq!(config.viewport(), (1280, 720));
    assert_eq!(config.browser_pool_size(), 2);
    assert_eq!(config.chrome_executable(), Some(&PathBuf::from("/opt/chromium/chrome")));
    assert!(config.proxies_configured());
    assert_eq!(config.proxy_rotation_strategy(), RotationStrategy::RoundRobin);
    assert_eq!(config.proxy_cooldown(), Duration::from_secs(60));
    assert_eq!(config.max_crawl_depth(), 4);
    assert_eq!(config.max_crawl_pages(), 250);
    assert_eq!(config.max_concurrent_requests(), 3);
    assert_eq!(config.request_timeout_ms(), 15_000);
    assert_eq!(config.job_retention(), Duration::from_secs(7200));
    assert!(config.allow_internal_targets());
}

#[test]
fn test_blank_proxy_url_is_ignored() {
    let config = ServiceConfig::from_lookup(env(&[
        ("PROXY_URL", "   "),
        ("PROXY_ROTATION_ENABLED", "true"),
    ]))
    .unwrap();
    assert!(config.proxy_url().is_none());
    assert!(!config.proxies_configured());
}

#[test]
fn test_unknown_strategy_is_config_error() {
    let err = ServiceConfig::from_lookup(env(&[("PROXY_ROTATION_STRATEGY", "weighted")])).unwrap_err();
    match err {
        ScrapeError::Config(msg) => {
            assert!(msg.contains("PROXY_ROTATION_STRATEGY"));
            assert!(msg.contains("weighted"));
        }
        other => panic!("expected config error, got {other:?}"),
    }
}

#[test]
fn test_builder_rejects_zero_limits() {
    assert!(ServiceConfig::builder().max_concurrent_requests(0).build().is_err());
    assert!(ServiceConfig::builder().request_timeout_ms(0).build().is_err());
    assert!(ServiceConfig::builder().proxy_max_failures(0).build().is_err());
    assert!(ServiceConfig::builder().user_agent("  ").build().is_err());
}

#[test]
fn test_zero_pool_size_from_environment_fails_validation() {
    let err = ServiceConfig::from_lookup(env(&[("BROWSER_POOL_SIZE", "0")])).unwrap_err();
    assert_eq!(err.code(), "CONFIG_ERROR");
}

#[test]
fn test_partial_json_keeps_defaults() {
    let config: ServiceConfig =
        serde_json::from_str(r#"{"browser_pool_size": 8, "proxy_rotation_strategy": "random"}"#).unwrap();
    assert_eq!(config.browser_pool_size(), 8);
    assert_eq!(config.proxy_rotation_strategy(), RotationStrategy::Random);
    assert_eq!(config.request_timeout_ms(), 30_000);
    assert_eq!(config.max_crawl_depth(), 10);
}
