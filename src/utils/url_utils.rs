//! URL helpers shared by the crawl engine and the page extractor.

use anyhow::Result;
use url::Url;

/// Normalize a URL string by stripping fragment anchors.
///
/// Fragment identifiers (#foo) are client-side navigation markers that don't
/// represent different HTTP resources, so `/page#a` and `/page#b` dedupe to
/// the same frontier entry.
pub fn normalize_url(url: &str) -> Result<String> {
    let mut parsed = Url::parse(url)
        .map_err(|e| anyhow::anyhow!("Failed to parse URL for normalization: {e}"))?;
    parsed.set_fragment(None);
    Ok(parsed.to_string())
}
