//! C3: bounded recursive sitemap walking.
//!
//! A sitemap index can nest other sitemaps; §9 bounds that recursion to
//! `MAX_SITEMAP_DEPTH` levels and `MAX_SITEMAP_URLS` total `<loc>` entries so
//! a pathological or adversarial sitemap chain cannot stall a worker
//! indefinitely.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

use crate::error::FetchError;

/// Maximum nesting depth of `<sitemapindex>` → `<sitemap>` → `<urlset>`
/// expansion.
pub const MAX_SITEMAP_DEPTH: usize = 5;

/// Maximum number of page `<loc>` URLs collected across an entire walk,
/// regardless of depth.
pub const MAX_SITEMAP_URLS: usize = 50_000;

/// Result of walking one sitemap tree.
#[derive(Debug, Default)]
pub struct SitemapUrls {
    pub urls: Vec<String>,
    pub truncated: bool,
}

/// Extracts every `<loc>` text node from one XML document, without
/// distinguishing a `<urlset>` from a `<sitemapindex>` — both use the same
/// element name for their child entries.
fn extract_locs(xml: &str) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut locs = Vec::new();
    let mut in_loc = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"loc" => {
                in_loc = true;
            }
            Ok(Event::End(e)) if e.local_name().as_ref() == b"loc" => {
                in_loc = false;
            }
            Ok(Event::Text(t)) if in_loc => {
                if let Ok(text) = t.unescape() {
                    locs.push(text.into_owned());
                }
            }
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    locs
}

/// True iff `url` itself looks like a nested sitemap reference rather than a
/// page to crawl (heuristic: filename contains "sitemap" and ends in
/// `.xml`/`.xml.gz`), mirroring how sitemap indexes are conventionally laid
/// out.
fn looks_like_sitemap(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    lower.contains("sitemap") && (lower.ends_with(".xml") || lower.ends_with(".xml.gz"))
}

/// Recursively walks a sitemap tree starting from `root_xml`, fetching any
/// nested sitemap documents through `fetch` (an async closure over a URL
/// returning its body text). Stops early once [`MAX_SITEMAP_DEPTH`] or
/// [`MAX_SITEMAP_URLS`] is hit, recording that it did so in
/// [`SitemapUrls::truncated`].
pub async fn walk_sitemap<F, Fut>(root_xml: &str, mut fetch: F) -> SitemapUrls
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<String, FetchError>>,
{
    let mut result = SitemapUrls::default();
    let mut stack: Vec<(String, usize)> = extract_locs(root_xml)
        .into_iter()
        .map(|loc| (loc, 1))
        .collect();

    while let Some((entry, depth)) = stack.pop() {
        if result.urls.len() >= MAX_SITEMAP_URLS {
            result.truncated = true;
            break;
        }

        if !looks_like_sitemap(&entry) {
            result.urls.push(entry);
            continue;
        }

        if depth >= MAX_SITEMAP_DEPTH {
            result.truncated = true;
            continue;
        }

        let Ok(body) = fetch(entry).await else {
            continue;
        };

        for loc in extract_locs(&body) {
            stack.push((loc, depth + 1));
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_locs_from_urlset() {
        let xml = r#"<?xml version="1.0"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://example.gov.si/a</loc></url>
          <url><loc>https://example.gov.si/b</loc></url>
        </urlset>"#;
        let locs = extract_locs(xml);
        assert_eq!(
            locs,
            vec![
                "https://example.gov.si/a".to_string(),
                "https://example.gov.si/b".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn walks_nested_sitemap_index() {
        let root = r#"<sitemapindex>
          <sitemap><loc>https://example.gov.si/sitemap-pages.xml</loc></sitemap>
        </sitemapindex>"#;

        let result = walk_sitemap(root, |url| async move {
            assert_eq!(url, "https://example.gov.si/sitemap-pages.xml");
            Ok(r#"<urlset><url><loc>https://example.gov.si/page-1</loc></url></urlset>"#
                .to_string())
        })
        .await;

        assert_eq!(result.urls, vec!["https://example.gov.si/page-1".to_string()]);
        assert!(!result.truncated);
    }

    #[tokio::test]
    async fn stops_at_max_depth() {
        let root = r#"<sitemapindex><sitemap><loc>https://example.gov.si/sitemap-1.xml</loc></sitemap></sitemapindex>"#;

        let result = walk_sitemap(root, |url| async move {
            let n: usize = url
                .trim_start_matches("https://example.gov.si/sitemap-")
                .trim_end_matches(".xml")
                .parse()
                .unwrap();
            Ok(format!(
                r#"<sitemapindex><sitemap><loc>https://example.gov.si/sitemap-{}.xml</loc></sitemap></sitemapindex>"#,
                n + 1
            ))
        })
        .await;

        assert!(result.truncated);
        assert!(result.urls.is_empty());
    }
}
