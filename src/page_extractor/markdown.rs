//! HTML to markdown and visible-text helpers

use std::sync::LazyLock;

use anyhow::{Context, Result};
use htmd::HtmlToMarkdown;
use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Html};

use crate::utils::DEFAULT_EXCLUDE_TAGS;

/// Reported as `extractionMethod` on every scrape
pub const EXTRACTION_METHOD: &str = "htmd";

static BLANK_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("BLANK_RUN_RE: hardcoded regex is valid"));

/// Tags never counted as visible text
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "head"];

/// Convert HTML to markdown, dropping `exclude_tags` (or the default set)
pub fn html_to_markdown(html: &str, exclude_tags: Option<&[String]>) -> Result<String> {
    let skip: Vec<&str> = match exclude_tags {
        Some(tags) => tags.iter().map(String::as_str).collect(),
        None => DEFAULT_EXCLUDE_TAGS.to_vec(),
    };

    let converter = HtmlToMarkdown::builder().skip_tags(skip).build();
    let markdown = converter
        .convert(html)
        .context("HTML to markdown conversion failed")?;

    let trimmed: Vec<&str> = markdown.lines().map(str::trim_end).collect();
    let collapsed = BLANK_RUN_RE.replace_all(&trimmed.join("\n"), "\n\n").into_owned();
    Ok(collapsed.trim().to_string())
}

/// Whitespace-collapsed text a reader would see
#[must_use]
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    visible_text_from_document(&document)
}

pub(crate) fn visible_text_from_document(document: &Html) -> String {
    let mut raw = String::new();
    collect_text(document.root_element(), &mut raw);
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => {
                out.push_str(text);
                out.push(' ');
            }
            Node::Element(el) if INVISIBLE_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_excludes_drop_navigation() {
        let html = r"
            <html><body>
                <nav>Home | About</nav>
                <h1>Title</h1>
                <p>Body text.</p>
                <script>var tracking = 1;</script>
                <footer>Copyright</footer>
            </body></html>
        ";
        let markdown = html_to_markdown(html, None).expect("conversion");
        assert!(markdown.contains("Title"));
        assert!(markdown.contains("Body text."));
        assert!(!markdown.contains("Home | About"));
        assert!(!markdown.contains("tracking"));
        assert!(!markdown.contains("Copyright"));
    }

    #[test]
    fn test_custom_excludes_replace_defaults() {
        let html = "<body><footer>Kept footer</footer><p>Text</p></body>";
        let markdown = html_to_markdown(html, Some(&["p".to_string()])).expect("conversion");
        assert!(markdown.contains("Kept footer"));
        assert!(!markdown.contains("Text"));
    }

    #[test]
    fn test_visible_text_skips_scripts() {
        let html = "<html><head><title>T</title></head><body><p>Hello\n   world</p><script>x()</script></body></html>";
        assert_eq!(visible_text(html), "Hello world");
    }
}
