//! Sitemap and robots.txt parsing

use std::io::Cursor;

use sitemap::reader::{SiteMapEntity, SiteMapReader};

/// Locations listed by one sitemap document
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SitemapEntries {
    /// `<url><loc>` entries
    pub pages: Vec<String>,
    /// `<sitemap><loc>` entries of a sitemap index
    pub sitemaps: Vec<String>,
}

/// Read a `<urlset>` or `<sitemapindex>` document
///
/// Streams the XML, so large sitemaps are never held as a tree. Entries
/// without a valid absolute `<loc>` are skipped.
#[must_use]
pub fn parse_sitemap(xml: &[u8]) -> SitemapEntries {
    let mut entries = SitemapEntries::default();

    for entity in SiteMapReader::new(Cursor::new(xml)) {
        match entity {
            SiteMapEntity::Url(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    entries.pages.push(url.to_string());
                }
            }
            SiteMapEntity::SiteMap(entry) => {
                if let Some(url) = entry.loc.get_url() {
                    entries.sitemaps.push(url.to_string());
                }
            }
            _ => {}
        }
    }

    entries
}

/// `Sitemap:` lines of a robots.txt, in file order
#[must_use]
pub fn sitemaps_in_robots(robots_txt: &str) -> Vec<String> {
    robots_txt
        .lines()
        .filter_map(|line| {
            let (key, value) = line.trim().split_once(':')?;
            let value = value.trim();
            (key.trim().eq_ignore_ascii_case("sitemap") && !value.is_empty())
                .then(|| value.to_string())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlset() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <url><loc>https://example.com/</loc><lastmod>2024-01-01</lastmod></url>
  <url><loc>https://example.com/docs/intro</loc></url>
  <url><loc>not a url</loc></url>
</urlset>"#;

        let entries = parse_sitemap(xml);
        assert_eq!(
            entries.pages,
            vec!["https://example.com/", "https://example.com/docs/intro"]
        );
        assert!(entries.sitemaps.is_empty());
    }

    #[test]
    fn test_sitemap_index() {
        let xml = br#"<?xml version="1.0" encoding="UTF-8"?>
<sitemapindex xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
  <sitemap><loc>https://example.com/sitemap-posts.xml</loc></sitemap>
  <sitemap><loc>https://example.com/sitemap-pages.xml</loc></sitemap>
</sitemapindex>"#;

        let entries = parse_sitemap(xml);
        assert!(entries.pages.is_empty());
        assert_eq!(entries.sitemaps.len(), 2);
        assert_eq!(entries.sitemaps[1], "https://example.com/sitemap-pages.xml");
    }

    #[test]
    fn test_garbage_yields_nothing() {
        assert_eq!(parse_sitemap(b"<html><body>404</body></html>"), SitemapEntries::default());
        assert_eq!(parse_sitemap(b""), SitemapEntries::default());
    }

    #[test]
    fn test_robots_sitemap_lines() {
        let robots = "User-agent: *\nDisallow: /admin\nSitemap: https://example.com/sitemap.xml\n\
                      sitemap:https://cdn.example.com/extra.xml\nSitemap:\n";
        assert_eq!(
            sitemaps_in_robots(robots),
            vec!["https://example.com/sitemap.xml", "https://cdn.example.com/extra.xml"]
        );
        assert!(sitemaps_in_robots("User-agent: *\nAllow: /").is_empty());
    }
}
