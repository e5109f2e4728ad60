//! Include / exclude glob filtering of crawl URLs
//!
//! Patterns use shell glob syntax (`*`, `?`, `[abc]`, `[!abc]`) matched
//! against the whole URL; `*` also crosses `/`. Patterns are compiled to
//! regexes once per crawl.

use regex::Regex;

use crate::errors::{ScrapeError, ScrapeResult};

#[derive(Debug, Clone, Default)]
pub struct UrlFilter {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

impl UrlFilter {
    pub fn new(include: &[String], exclude: &[String]) -> ScrapeResult<Self> {
        Ok(Self {
            include: compile_all(include)?,
            exclude: compile_all(exclude)?,
        })
    }

    /// Exclude patterns are checked first; when include patterns exist the
    /// URL must match one of them
    #[must_use]
    pub fn allows(&self, url: &str) -> bool {
        if self.exclude.iter().any(|re| re.is_match(url)) {
            return false;
        }
        self.include.is_empty() || self.include.iter().any(|re| re.is_match(url))
    }
}

fn compile_all(patterns: &[String]) -> ScrapeResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&glob_to_regex(pattern))
                .map_err(|e| ScrapeError::Config(format!("Invalid URL pattern {pattern:?}: {e}")))
        })
        .collect()
}

/// Translate a shell glob into an anchored regex
#[must_use]
pub fn glob_to_regex(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    out.push('^');

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => match class_end(&chars, i) {
                Some(end) => {
                    out.push_str(&translate_class(&chars[i + 1..end]));
                    i = end;
                }
                // Unterminated class matches a literal bracket
                None => out.push_str("\\["),
            },
            c => out.push_str(&regex::escape(&c.to_string())),
        }
        i += 1;
    }

    out.push('$');
    out
}

fn translate_class(body: &[char]) -> String {
    let (negated, body) = match body.split_first() {
        Some((&'!', rest)) => (true, rest),
        _ => (false, body),
    };

    let mut class = String::from(if negated { "[^" } else { "[" });
    for (idx, &c) in body.iter().enumerate() {
        let is_range = c == '-' && idx > 0 && idx + 1 < body.len();
        if is_range {
            class.push('-');
        } else if matches!(c, '\\' | '[' | ']' | '^' | '&' | '~' | '-') {
            class.push('\\');
            class.push(c);
        } else {
            class.push(c);
        }
    }
    class.push(']');
    class
}

/// Index of the `]` closing the class opened at `start`
fn class_end(chars: &[char], start: usize) -> Option<usize> {
    let mut j = start + 1;
    if chars.get(j) == Some(&'!') {
        j += 1;
    }
    // A leading `]` is part of the class
    if chars.get(j) == Some(&']') {
        j += 1;
    }
    while j < chars.len() {
        if chars[j] == ']' {
            return Some(j);
        }
        j += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(include: &[&str], exclude: &[&str]) -> UrlFilter {
        let include: Vec<String> = include.iter().map(|p| (*p).to_string()).collect();
        let exclude: Vec<String> = exclude.iter().map(|p| (*p).to_string()).collect();
        UrlFilter::new(&include, &exclude).expect("patterns compile")
    }

    #[test]
    fn test_exclude_wins_over_include() {
        let f = filter(&["*/docs/*"], &["*/admin/*"]);
        assert!(!f.allows("https://example.com/admin/docs/x"));
        assert!(f.allows("https://example.com/docs/x"));
        assert!(!f.allows("https://example.com/blog/x"));
    }

    #[test]
    fn test_no_patterns_allows_everything() {
        assert!(UrlFilter::default().allows("https://example.com/anything"));
    }

    #[test]
    fn test_star_crosses_path_segments() {
        let f = filter(&["https://example.com/*.html"], &[]);
        assert!(f.allows("https://example.com/a/b/c.html"));
        assert!(!f.allows("https://example.com/a/b/c.htm"));
    }

    #[test]
    fn test_question_mark_and_classes() {
        let f = filter(&["*/v?/*", "*/page[0-9]"], &["*/page[!0-4]"]);
        assert!(f.allows("https://example.com/v2/intro"));
        assert!(f.allows("https://example.com/page3"));
        assert!(!f.allows("https://example.com/page7"));
        assert!(!f.allows("https://example.com/v10/intro"));
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let f = filter(&["*/search?q=(rust)+*"], &[]);
        assert!(f.allows("https://example.com/search?q=(rust)+async"));
        assert!(!f.allows("https://example.com/search?q=rust"));
    }

    #[test]
    fn test_unterminated_class_is_literal() {
        let f = filter(&["*/[draft"], &[]);
        assert!(f.allows("https://example.com/[draft"));
    }
}
