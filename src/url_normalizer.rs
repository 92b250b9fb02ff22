//! C1: canonicalization, classification, and scope filtering for URLs.
//!
//! Canonical form lowercases scheme/host (handled by `url::Url` itself),
//! drops query and fragment, and appends a trailing `/` unless the last path
//! segment looks like a filename.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Extensions recognized as downloadable binary documents, per §4.1.
/// `.zip` has no corresponding [`crate::model::DataType`] variant — see
/// [`crate::model::DataType::from_extension`].
const BINARY_EXTENSIONS: &[&str] = &["pdf", "doc", "docx", "ppt", "pptx", "zip"];

/// Resolves `input` against `base` (or parses it standalone when `base` is
/// `None`) and rewrites it into canonical form. Returns `None` if the input
/// cannot be resolved into any URL at all.
pub fn canonicalize(input: &str, base: Option<&Url>) -> Option<Url> {
    let mut url = match base {
        Some(base) => base.join(input).ok()?,
        None => Url::parse(input).ok()?,
    };

    url.set_query(None);
    url.set_fragment(None);

    if !has_file_extension(&url) {
        let path = url.path().to_string();
        if !path.ends_with('/') {
            url.set_path(&format!("{path}/"));
        }
    }

    Some(url)
}

/// Idempotence check used by the test suite and available for callers that
/// want to assert §8 invariant 6 themselves.
pub fn is_canonical(url: &Url) -> bool {
    canonicalize(url.as_str(), None).as_ref() == Some(url)
}

/// True iff `s` is a full `http`/`https` URL, a root-relative path
/// (`/a/b`), a bare relative path (`about.html`), or a fragment (`#x`).
/// Rejects other schemes (`mailto:`, `javascript:`, `tel:`, ...).
pub fn is_url_like(s: &str) -> bool {
    if s.is_empty() || s == "#" {
        return false;
    }

    if let Some(idx) = s.find(':') {
        let scheme_candidate = &s[..idx];
        let chars_ok = !scheme_candidate.is_empty()
            && scheme_candidate
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '+' || c == '-' || c == '.');
        let looks_like_scheme =
            chars_ok && (s[idx..].starts_with("://") || !scheme_candidate.contains('.'));

        if looks_like_scheme {
            let scheme_lower = scheme_candidate.to_ascii_lowercase();
            if scheme_lower != "http" && scheme_lower != "https" {
                return false;
            }
        }
    }

    true
}

/// True iff the last `/`-segment of the path contains a `.`, i.e. looks like
/// a filename rather than a directory.
pub fn has_file_extension(url: &Url) -> bool {
    match url.path_segments().and_then(|mut segments| segments.next_back()) {
        Some(last) => last.contains('.'),
        None => false,
    }
}

/// Returns the lowercased extension (without the leading dot) if the URL's
/// path matches one of the recognized binary-document extensions.
pub fn binary_link_extension(url: &Url) -> Option<&'static str> {
    let last = url.path_segments().and_then(|mut s| s.next_back())?;
    let ext = last.rsplit('.').next()?.to_ascii_lowercase();
    BINARY_EXTENSIONS.iter().copied().find(|candidate| *candidate == ext)
}

/// True iff `url`'s host matches the configured scope regex (reference:
/// `.*\.gov\.si$`).
pub fn is_in_scope(url: &Url, scope: &Regex) -> bool {
    url.host_str().is_some_and(|host| scope.is_match(host))
}

/// Compiles the reference deployment's scope regex (`.*\.gov\.si$`).
pub static DEFAULT_SCOPE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r".*\.gov\.si$").expect("default scope regex is valid"));

static FULL_URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://(www\.)?[^./]+(\.[^./]+)+(/.*)?$").expect("full url regex is valid")
});

/// True iff `s` already looks like a complete, schemeful URL with a
/// multi-label host (`https://www.example.com/...`), as opposed to a
/// shortened link that still needs resolving.
fn looks_like_full_url(s: &str) -> bool {
    FULL_URL_RE.is_match(s)
}

/// *fix-shortened(u)*: resolves a shortened URL (one lacking a full
/// scheme+host, e.g. bare `gov.si`) by following redirects with a plain GET
/// and adopting wherever the server lands. Returns `u` unchanged on any
/// failure or if it already looks like a full URL.
pub async fn fix_shortened(client: &reqwest::Client, url: &str) -> String {
    if looks_like_full_url(url) {
        return url.to_string();
    }

    match client.get(url).send().await {
        Ok(response) => response.url().to_string(),
        Err(_) => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_query_and_fragment() {
        let url = canonicalize("https://Example.GOV.SI/a/b?x=1#frag", None).unwrap();
        assert_eq!(url.as_str(), "https://example.gov.si/a/b/");
    }

    #[test]
    fn keeps_file_extension_without_trailing_slash() {
        let url = canonicalize("https://example.gov.si/about.html", None).unwrap();
        assert_eq!(url.as_str(), "https://example.gov.si/about.html");
    }

    #[test]
    fn resolves_relative_against_base() {
        let base = Url::parse("https://example.gov.si/dir/page.html").unwrap();
        let url = canonicalize("../x", Some(&base)).unwrap();
        assert_eq!(url.as_str(), "https://example.gov.si/x/");
    }

    #[test]
    fn drops_default_port() {
        let url = canonicalize("https://example.gov.si:443/a", None).unwrap();
        assert!(url.port().is_none());
    }

    #[test]
    fn canonicalization_is_idempotent() {
        let inputs = [
            "https://Example.GOV.SI/a/b?x=1#frag",
            "https://example.gov.si/about.html",
            "https://example.gov.si/",
        ];
        for input in inputs {
            let once = canonicalize(input, None).unwrap();
            let twice = canonicalize(once.as_str(), None).unwrap();
            assert_eq!(once, twice);
            assert!(is_canonical(&once));
        }
    }

    #[test]
    fn classifies_url_like_strings() {
        assert!(is_url_like("https://example.gov.si/"));
        assert!(is_url_like("/about/us"));
        assert!(is_url_like("about.html"));
        assert!(is_url_like("#section"));
        assert!(!is_url_like("mailto:a@b.com"));
        assert!(!is_url_like("javascript:void(0)"));
        assert!(!is_url_like(""));
        assert!(!is_url_like("#"));
    }

    #[test]
    fn classifies_binary_links() {
        let pdf = Url::parse("https://example.gov.si/doc.PDF").unwrap();
        assert_eq!(binary_link_extension(&pdf), Some("pdf"));

        let zip = Url::parse("https://example.gov.si/archive.zip").unwrap();
        assert_eq!(binary_link_extension(&zip), Some("zip"));

        let html = Url::parse("https://example.gov.si/page.html").unwrap();
        assert_eq!(binary_link_extension(&html), None);
    }

    #[test]
    fn scope_matches_gov_si_suffix() {
        let in_scope = Url::parse("https://a.gov.si/").unwrap();
        let out_of_scope = Url::parse("https://other.example.com/").unwrap();
        assert!(is_in_scope(&in_scope, &DEFAULT_SCOPE));
        assert!(!is_in_scope(&out_of_scope, &DEFAULT_SCOPE));
    }

    #[test]
    fn full_url_detection() {
        assert!(looks_like_full_url("https://www.gov.si/about"));
        assert!(!looks_like_full_url("gov.si"));
        assert!(!looks_like_full_url("/about"));
    }
}
