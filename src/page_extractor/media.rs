//! Image, video and audio references

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

use super::schema::{MediaItem, MediaKind};

static MEDIA_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("img, picture source, video, video source, audio, audio source, [style]")
        .expect("MEDIA_SELECTOR: hardcoded selector is valid")
});

static CSS_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"background(?:-image)?\s*:[^;]*url\(\s*['"]?([^'")]+)['"]?\s*\)"#)
        .expect("CSS_URL_RE: hardcoded regex is valid")
});

/// Collect media URLs in document order, resolved against `base_url`
#[must_use]
pub fn extract_media(html: &str, base_url: &str) -> Vec<MediaItem> {
    let document = Html::parse_document(html);
    extract_media_from_document(&document, base_url)
}

pub(crate) fn extract_media_from_document(document: &Html, base_url: &str) -> Vec<MediaItem> {
    let Ok(base) = Url::parse(base_url) else {
        return Vec::new();
    };

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    let mut push = |raw: &str, kind: MediaKind, alt: Option<&str>| {
        let raw = raw.trim();
        if raw.is_empty() || raw.starts_with("data:") {
            return;
        }
        let Ok(resolved) = base.join(raw) else {
            return;
        };
        if !matches!(resolved.scheme(), "http" | "https") {
            return;
        }
        let url = resolved.to_string();
        if seen.insert(url.clone()) {
            items.push(MediaItem {
                url,
                kind,
                alt: alt.map(str::trim).filter(|a| !a.is_empty()).map(str::to_string),
            });
        }
    };

    for element in document.select(&MEDIA_SELECTOR) {
        let attrs = element.value();
        let parent_kind = element
            .parent()
            .and_then(scraper::ElementRef::wrap)
            .map(|p| p.value().name().to_string());

        match attrs.name() {
            "img" => {
                if let Some(src) = attrs.attr("src") {
                    push(src, MediaKind::Image, attrs.attr("alt"));
                }
            }
            "video" | "audio" => {
                let kind = if attrs.name() == "video" {
                    MediaKind::Video
                } else {
                    MediaKind::Audio
                };
                if let Some(src) = attrs.attr("src") {
                    push(src, kind, None);
                }
                if let Some(poster) = attrs.attr("poster") {
                    push(poster, MediaKind::Image, None);
                }
            }
            "source" => {
                let kind = match parent_kind.as_deref() {
                    Some("video") => MediaKind::Video,
                    Some("audio") => MediaKind::Audio,
                    _ => MediaKind::Image,
                };
                if let Some(src) = attrs.attr("src") {
                    push(src, kind, None);
                }
                if let Some(srcset) = attrs.attr("srcset") {
                    for candidate in srcset.split(',') {
                        if let Some(url) = candidate.split_whitespace().next() {
                            push(url, kind, None);
                        }
                    }
                }
            }
            _ => {}
        }

        if let Some(style) = attrs.attr("style") {
            for capture in CSS_URL_RE.captures_iter(style) {
                push(&capture[1], MediaKind::Image, None);
            }
        }
    }

    items
}
