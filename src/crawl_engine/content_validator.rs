//! Content validation for detecting challenge and empty pages
//!
//! A page is kept out of crawl results when the server answered with an
//! error status, when it has almost no visible text, or when it looks like a
//! bot-challenge interstitial. Validation never stops traversal: links found
//! on an invalid page are still followed.

use log::{debug, warn};

/// Pages with less visible text than this are treated as empty
pub const MIN_VISIBLE_TEXT_CHARS: usize = 50;

/// Challenge phrases only count on pages shorter than this; long articles
/// routinely quote them
pub const CHALLENGE_MAX_TEXT_CHARS: usize = 5000;

/// Phrases and markers served by bot-protection interstitials
pub const CHALLENGE_INDICATORS: &[&str] = &[
    "Enable JavaScript and cookies to continue",
    "Just a moment...",
    "Checking your browser",
    "Verifying you are human",
    "needs to review the security of your connection",
    "Please enable cookies",
    "Please turn JavaScript on",
    "Attention Required! | Cloudflare",
    "cf-browser-verification",
    "cf_clearance",
    "_cf_bm",
];

/// Result of content validation
#[derive(Debug, Clone)]
pub struct ContentValidationResult {
    /// Whether the content passed validation
    pub is_valid: bool,
    /// Reason for validation failure (if any)
    pub reason: Option<String>,
    /// Confidence score (0.0 = definitely invalid, 1.0 = definitely valid)
    pub confidence: f32,
}

impl ContentValidationResult {
    /// Create a valid result
    #[must_use]
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            reason: None,
            confidence: 1.0,
        }
    }

    /// Create an invalid result with reason
    #[must_use]
    pub fn invalid(reason: String, confidence: f32) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
            confidence,
        }
    }
}

/// Return the first challenge indicator found in `content`, case-insensitively
#[must_use]
pub fn find_challenge_indicator(content: &str) -> Option<&'static str> {
    let lowered = content.to_lowercase();
    CHALLENGE_INDICATORS
        .iter()
        .find(|indicator| lowered.contains(&indicator.to_lowercase()))
        .copied()
}

/// Classify a fetched page
///
/// # Arguments
/// * `html` - Rendered HTML, searched for challenge markers such as cookie names
/// * `visible_text` - Text a reader would see, used for the length checks
/// * `url` - Page URL (for logging)
/// * `http_status` - Navigation status, when the engine reported one
#[must_use]
pub fn validate_page_content(
    html: &str,
    visible_text: &str,
    url: &str,
    http_status: Option<u16>,
) -> ContentValidationResult {
    if let Some(status) = http_status {
        if status >= 400 {
            warn!("HTTP error status {} for {}", status, url);
            return ContentValidationResult::invalid(format!("HTTP error: {status}"), 0.95);
        }
    }

    let text_len = visible_text.trim().chars().count();

    if text_len < MIN_VISIBLE_TEXT_CHARS {
        debug!("Only {} visible characters on {}", text_len, url);
        return ContentValidationResult::invalid(
            format!("Content too short: {text_len} characters"),
            0.8,
        );
    }

    if text_len < CHALLENGE_MAX_TEXT_CHARS {
        let indicator =
            find_challenge_indicator(visible_text).or_else(|| find_challenge_indicator(html));
        if let Some(indicator) = indicator {
            warn!("Bot challenge detected on {}: {:?}", url, indicator);
            return ContentValidationResult::invalid(
                format!("Bot challenge detected: {indicator}"),
                0.9,
            );
        }
    }

    ContentValidationResult::valid()
}
