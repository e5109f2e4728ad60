// simplecrawl: fetch a page or crawl a site from the command line.
//
//   simplecrawl fetch <url>
//   simplecrawl crawl <url> [limit] [depth]
//
// Configuration comes from the environment (BROWSER_POOL_SIZE, PROXY_URL, ...).
// With no arguments the service starts and idles until Ctrl-C.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use simplecrawl::{CrawlOptions, ExtractionService, OutputFormat, ServiceConfig};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = ServiceConfig::from_env()?;
    let service = ExtractionService::new(config);
    service.initialize().await?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let outcome = run(&service, &args).await;

    service.shutdown().await?;
    outcome
}

async fn run(service: &ExtractionService, args: &[String]) -> Result<()> {
    match args {
        [] => {
            tracing::info!("No command given; waiting for Ctrl-C");
            tokio::signal::ctrl_c().await?;
            Ok(())
        }
        [cmd, url] if cmd == "fetch" => {
            let mut options = service.default_fetch_options();
            options.formats = vec![OutputFormat::Markdown, OutputFormat::Metadata, OutputFormat::Links];
            let data = service.fetch(url, &options).await?;
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        [cmd, url, rest @ ..] if cmd == "crawl" && rest.len() <= 2 => {
            let mut options = CrawlOptions::default();
            if let Some(limit) = rest.first() {
                options.limit = limit.parse().context("limit must be a number")?;
            }
            if let Some(depth) = rest.get(1) {
                options.max_depth = depth.parse().context("depth must be a number")?;
            }

            let job_id = service.start_crawl(url, options).await?;
            let state = loop {
                let state = service.get_crawl_status(&job_id).await?;
                if state.status.is_terminal() {
                    break state;
                }
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {
                        service.cancel_crawl(&job_id).await?;
                    }
                    () = tokio::time::sleep(Duration::from_millis(500)) => {}
                }
            };
            println!("{}", serde_json::to_string_pretty(&state)?);
            Ok(())
        }
        _ => bail!("usage: simplecrawl [fetch <url> | crawl <url> [limit] [depth]]"),
    }
}
