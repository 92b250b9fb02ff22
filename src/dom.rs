//! C6: link, image, and binary-reference extraction from a fetched HTML
//! document.
//!
//! Beyond plain `<a href>` and `<img src>` attributes, many `.gov.si` pages
//! navigate through inline JavaScript on elements that aren't anchors at all
//! (`<div onclick="location.href='...'">`, `<span onclick="location.replace('...')">`);
//! `NAV_ASSIGN_RE`/`NAV_FUNC_RE` recover those targets the same way the
//! reference crawler does.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::error::ExtractError;
use crate::model::ImageRecord;
use crate::url_normalizer;

/// Extensions recognized as capturable images, per §4.6 — the reference
/// deployment's full allowlist, wider than just the common web formats.
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jfif", "pjpeg", "pjp", "png", "apng", "avif", "gif", "webp", "svg", "eps",
    "pdf", "ico", "cur", "tif", "tiff", "bmp",
];

/// Matches a direct `location`/`window.location[.href]` assignment; the URL
/// is the named `url` group.
static NAV_ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:window\.)?location(?:\.href)?\s*=\s*['"](?P<url>[^'"]+)['"]"#)
        .expect("navigation assign regex is valid")
});

/// Matches a `location[.href].<method>("url")` call — e.g.
/// `location.replace('/x')` or `location.assign('/x')`; the URL is the
/// named `url` group.
static NAV_FUNC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)location(?:\.href)?\.\w+\(\s*['"](?P<url>[^'"]+)['"]"#)
        .expect("navigation func regex is valid")
});

/// Everything pulled out of one HTML document. Binary-link classification
/// happens downstream in the engine (via [`crate::url_normalizer`]) once
/// these raw links are resolved against the page's base URL.
#[derive(Debug, Default, Clone)]
pub struct ExtractedPage {
    pub links: Vec<String>,
    pub images: Vec<ImageRecord>,
}

/// Abstraction over "turn an HTML document into links and images". Kept
/// concrete (a structured result type, not a generic DOM-tree handle) since
/// the engine has exactly one call site and never needs partial or lazy
/// traversal — see the design note in `SPEC_FULL.md` §9.
pub trait DomExtractor: Send + Sync {
    fn extract(&self, html: &str) -> Result<ExtractedPage, ExtractError>;
}

/// Default extractor, built on the `scraper` crate.
#[derive(Default)]
pub struct ScraperDomExtractor;

impl ScraperDomExtractor {
    fn selector(css: &str) -> Result<Selector, ExtractError> {
        Selector::parse(css).map_err(|e| ExtractError::BadSelector {
            selector: css.to_string(),
            message: format!("{e:?}"),
        })
    }
}

impl DomExtractor for ScraperDomExtractor {
    fn extract(&self, html: &str) -> Result<ExtractedPage, ExtractError> {
        let document = Html::parse_document(html);
        // Every anchor plus every element carrying an `onclick`, since
        // inline navigation isn't limited to `<a>` tags.
        let link_sel = Self::selector("a, [onclick]")?;
        let img_sel = Self::selector("img")?;

        let mut links = Vec::new();
        for element in document.select(&link_sel) {
            let href = element.value().attr("href");
            let onclick = element.value().attr("onclick");

            let target = match href {
                Some(href) if url_normalizer::is_url_like(href) => Some(href.to_string()),
                _ => onclick.and_then(navigation_target),
            };

            if let Some(target) = target {
                links.push(target);
            }
        }

        let mut images = Vec::new();
        for img in document.select(&img_sel) {
            if let Some(src) = img.value().attr("src") {
                if let Some(record) = classify_image(src) {
                    images.push(record);
                }
            }
        }

        Ok(ExtractedPage { links, images })
    }
}

/// Recovers a navigation target from an inline `onclick` handler, trying the
/// function-call pattern first since it's the more specific match.
fn navigation_target(onclick: &str) -> Option<String> {
    if let Some(caps) = NAV_FUNC_RE.captures(onclick) {
        return caps.name("url").map(|m| m.as_str().to_string());
    }
    if let Some(caps) = NAV_ASSIGN_RE.captures(onclick) {
        return caps.name("url").map(|m| m.as_str().to_string());
    }
    None
}

/// Builds the `ImageRecord` for a recognized image `src`: `filename` is the
/// basename with its extension stripped, `content_type` is the extension
/// itself, per §4.6 ("filename stem, guessed MIME"). Returns `None` if
/// `src`'s extension isn't in [`IMAGE_EXTENSIONS`].
fn classify_image(src: &str) -> Option<ImageRecord> {
    let without_query = src.split(['?', '#']).next().unwrap_or(src);
    let last_segment = without_query.rsplit('/').next().unwrap_or(without_query);
    let (stem, ext) = last_segment.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }

    let ext_lower = ext.to_ascii_lowercase();
    let matched = IMAGE_EXTENSIONS.iter().copied().find(|candidate| *candidate == ext_lower)?;

    Some(ImageRecord {
        filename: Some(stem.to_string()),
        content_type: Some(matched.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_plain_anchor_hrefs() {
        let html = r##"<html><body><a href="/about">About</a><a href="#">skip</a></body></html>"##;
        let page = ScraperDomExtractor.extract(html).unwrap();
        assert_eq!(page.links, vec!["/about".to_string()]);
    }

    #[test]
    fn recovers_navigation_from_non_anchor_onclick() {
        let html = r#"<html><body><div onclick="location.href='/news/1'">click</div></body></html>"#;
        let page = ScraperDomExtractor.extract(html).unwrap();
        assert_eq!(page.links, vec!["/news/1".to_string()]);
    }

    #[test]
    fn recovers_onclick_location_assignment() {
        let html = r#"<div onclick="location.href='/news/1'">click</div>"#;
        let document = Html::parse_document(html);
        let div_sel = Selector::parse("div").unwrap();
        let onclick = document
            .select(&div_sel)
            .next()
            .unwrap()
            .value()
            .attr("onclick")
            .unwrap();
        assert_eq!(navigation_target(onclick), Some("/news/1".to_string()));
    }

    #[test]
    fn recovers_location_method_call_navigation() {
        let wrapped = "location.replace('/docs/report.pdf')";
        assert_eq!(
            navigation_target(wrapped),
            Some("/docs/report.pdf".to_string())
        );

        let assign = "location.assign(\"/about\")";
        assert_eq!(navigation_target(assign), Some("/about".to_string()));
    }

    #[test]
    fn classifies_and_splits_image_filenames() {
        let record = classify_image("/img/logo.SVG").unwrap();
        assert_eq!(record.filename, Some("logo".to_string()));
        assert_eq!(record.content_type, Some("svg".to_string()));

        let with_query = classify_image("/assets/photo.jpg?w=100").unwrap();
        assert_eq!(with_query.filename, Some("photo".to_string()));
        assert_eq!(with_query.content_type, Some("jpg".to_string()));

        assert!(classify_image("/style.css").is_none());
    }
}
