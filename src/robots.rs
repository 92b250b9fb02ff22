//! C2: robots.txt acquisition, persistence-friendly parsing, and the
//! `can-fetch`/`crawl-delay` policy surface.
//!
//! `can-fetch` is delegated to the `robotstxt` crate's matcher; `crawl-delay`
//! extraction is hand-rolled since that crate only exposes allow/disallow
//! matching.

use crate::error::RobotsError;

/// Fixed crawler identity, confirmed against the reference deployment.
pub const USER_AGENT: &str = "fri-wier-besela";

/// A parsed robots.txt policy for one site. Cheap to rebuild from persisted
/// text, so the store only ever needs to keep the raw bytes around.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    raw: String,
    crawl_delay: Option<f64>,
}

impl RobotsPolicy {
    /// Parses `raw` robots.txt content, whether freshly fetched or read back
    /// from a `site.robots_content` column.
    pub fn parse(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let crawl_delay = extract_crawl_delay(&raw, USER_AGENT);
        Self { raw, crawl_delay }
    }

    /// An always-allow policy, used when a site has no robots.txt at all —
    /// per §4.2, `can-fetch` defaults to `true` in that case.
    pub fn permissive() -> Self {
        Self {
            raw: String::new(),
            crawl_delay: None,
        }
    }

    pub fn crawl_delay(&self) -> Option<f64> {
        self.crawl_delay
    }

    /// `Sitemap:` directives declared in the raw text, in the order they
    /// appear. Directives are global (not scoped to a user-agent group).
    pub fn sitemaps(&self) -> Vec<String> {
        extract_sitemaps(&self.raw)
    }

    /// True iff `url`'s path may be fetched by [`USER_AGENT`]. Defaults to
    /// `true` if the robots.txt text fails to parse sensibly.
    pub fn can_fetch(&self, url: &str) -> bool {
        if self.raw.is_empty() {
            return true;
        }
        let mut matcher = robotstxt::DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.raw, USER_AGENT, url)
    }
}

/// Fetches `https://{domain}/robots.txt`. A missing or non-2xx robots.txt is
/// not an error — it's reported as `Ok(None)` so the caller falls back to
/// [`RobotsPolicy::permissive`].
pub async fn fetch_robots_txt(
    client: &reqwest::Client,
    domain: &str,
) -> Result<Option<String>, RobotsError> {
    let url = format!("https://{domain}/robots.txt");
    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|source| RobotsError::Fetch {
            url: url.clone(),
            source,
        })?;

    if !response.status().is_success() {
        return Ok(None);
    }

    match response.text().await {
        Ok(text) => Ok(Some(text)),
        Err(_) => Ok(None),
    }
}

/// Scans robots.txt groups for a `Crawl-delay` directive, preferring one
/// scoped to `user_agent` over a wildcard (`*`) group.
fn extract_crawl_delay(raw: &str, user_agent: &str) -> Option<f64> {
    let agent_lower = user_agent.to_ascii_lowercase();
    let mut current_agents: Vec<String> = Vec::new();
    let mut group_started = false;
    let mut specific: Option<f64> = None;
    let mut wildcard: Option<f64> = None;

    for raw_line in raw.lines() {
        let line = raw_line.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim().to_ascii_lowercase();
        let value = value.trim();

        match key.as_str() {
            "user-agent" => {
                if group_started {
                    current_agents.clear();
                    group_started = false;
                }
                current_agents.push(value.to_ascii_lowercase());
            }
            "crawl-delay" => {
                group_started = true;
                if let Ok(delay) = value.parse::<f64>() {
                    if current_agents.iter().any(|a| *a == agent_lower) {
                        specific = specific.or(Some(delay));
                    } else if current_agents.iter().any(|a| a == "*") {
                        wildcard = wildcard.or(Some(delay));
                    }
                }
            }
            _ => {
                group_started = true;
            }
        }
    }

    specific.or(wildcard)
}

/// Collects every `Sitemap:` directive's URL, per §4.3 — these are
/// global directives, not scoped to any user-agent group.
fn extract_sitemaps(raw: &str) -> Vec<String> {
    raw.lines()
        .filter_map(|raw_line| {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            let (key, value) = line.split_once(':')?;
            if key.trim().eq_ignore_ascii_case("sitemap") {
                Some(value.trim().to_string())
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permissive_allows_everything() {
        let policy = RobotsPolicy::permissive();
        assert!(policy.can_fetch("https://example.gov.si/anything"));
        assert_eq!(policy.crawl_delay(), None);
    }

    #[test]
    fn disallow_rule_is_honored() {
        let policy = RobotsPolicy::parse("User-agent: *\nDisallow: /private\n");
        assert!(!policy.can_fetch("https://example.gov.si/private/page"));
        assert!(policy.can_fetch("https://example.gov.si/public/page"));
    }

    #[test]
    fn specific_agent_crawl_delay_wins_over_wildcard() {
        let raw = format!(
            "User-agent: *\nCrawl-delay: 10\n\nUser-agent: {USER_AGENT}\nCrawl-delay: 2\n"
        );
        let policy = RobotsPolicy::parse(raw);
        assert_eq!(policy.crawl_delay(), Some(2.0));
    }

    #[test]
    fn falls_back_to_wildcard_crawl_delay() {
        let policy = RobotsPolicy::parse("User-agent: *\nCrawl-delay: 7\n");
        assert_eq!(policy.crawl_delay(), Some(7.0));
    }

    #[test]
    fn extracts_sitemap_directives() {
        let policy = RobotsPolicy::parse(
            "User-agent: *\nDisallow: /private\nSitemap: https://example.gov.si/sitemap.xml\nSitemap: https://example.gov.si/sitemap-news.xml\n",
        );
        assert_eq!(
            policy.sitemaps(),
            vec![
                "https://example.gov.si/sitemap.xml".to_string(),
                "https://example.gov.si/sitemap-news.xml".to_string(),
            ]
        );
    }

    #[test]
    fn malformed_robots_defaults_to_allow() {
        let policy = RobotsPolicy::parse("not a robots file at all {{{");
        assert!(policy.can_fetch("https://example.gov.si/"));
    }
}
