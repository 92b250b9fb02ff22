//! C9: the crawl engine — the per-worker loop that orchestrates C1–C8 into
//! the page state machine, and the worker pool's lifecycle.
//!
//! Implementation note (recorded in full in `DESIGN.md`): the politeness
//! wait, DNS resolution, and site/robots bootstrap are performed *before*
//! the fetch, not after it. `SPEC_FULL.md` §4.9 groups them later in its
//! numbered list, but wait-and-claim has to gate the outbound request
//! itself for the politeness invariant (§8, P4) to hold — sequencing it
//! after the fetch would make it a no-op.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tokio::sync::watch;

use crate::db::{DedupIndex, FrontierStore, SiteStore};
use crate::dom::{DomExtractor, ScraperDomExtractor};
use crate::error::EngineError;
use crate::fetch::{mime_to_data_type, FetchBackend, FetchBody, ReqwestFetchBackend};
use crate::model::{DataType, Page};
use crate::politeness::{PolitenessScheduler, DEFAULT_DOMAIN_DELAY_SECS};
use crate::robots::{self, RobotsPolicy};
use crate::sitemap::{self, SitemapUrls};
use crate::url_normalizer;

/// How long an idle worker sleeps before checking whether the whole pool
/// can shut down.
const IDLE_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Per-fetch navigation timeout.
const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Collaborators shared by every worker task.
struct EngineShared {
    http_client: reqwest::Client,
    fetch_backend: Arc<dyn FetchBackend>,
    dom_extractor: Arc<dyn DomExtractor>,
    frontier: FrontierStore,
    dedup: DedupIndex,
    sites: SiteStore,
    politeness: PolitenessScheduler,
    scope: Regex,
}

/// The crawl engine: owns the worker pool and the collaborators each worker
/// shares.
pub struct CrawlEngine {
    shared: Arc<EngineShared>,
    n_workers: usize,
}

impl CrawlEngine {
    pub fn new(pool: PgPool, n_workers: usize) -> Result<Self, EngineError> {
        let http_client = reqwest::Client::builder()
            .user_agent(robots::USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .expect("reqwest client builds with static configuration");

        let shared = EngineShared {
            fetch_backend: Arc::new(ReqwestFetchBackend::new(http_client.clone())),
            dom_extractor: Arc::new(ScraperDomExtractor),
            frontier: FrontierStore::new(pool.clone()),
            dedup: DedupIndex::new(pool.clone()),
            sites: SiteStore::new(pool),
            politeness: PolitenessScheduler::new(),
            scope: url_normalizer::DEFAULT_SCOPE.clone(),
            http_client,
        };

        Ok(Self {
            shared: Arc::new(shared),
            n_workers,
        })
    }

    /// Seeds the frontier with the crawl's starting URLs, discarding any
    /// that are out of scope.
    pub async fn seed(&self, urls: impl IntoIterator<Item = String>) -> Result<usize, EngineError> {
        let mut inserted = 0;
        for raw in urls {
            let Some(canonical) = url_normalizer::canonicalize(&raw, None) else {
                tracing::warn!(url = %raw, "seed URL failed to parse, skipping");
                continue;
            };
            if !url_normalizer::is_in_scope(&canonical, &self.shared.scope) {
                tracing::warn!(url = %canonical, "seed URL is out of scope, skipping");
                continue;
            }
            if self.shared.frontier.add(None, canonical.as_str()).await? {
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    /// Runs the worker pool until the frontier is exhausted, or until a
    /// `SIGINT`/`SIGTERM` is observed, in which case in-flight workers are
    /// allowed to finish their current URL before returning.
    pub async fn run(&self) -> Result<(), EngineError> {
        let active: Arc<Vec<AtomicBool>> = Arc::new((0..self.n_workers).map(|_| AtomicBool::new(true)).collect());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let mut handles = Vec::with_capacity(self.n_workers);
        for id in 0..self.n_workers {
            let shared = self.shared.clone();
            let active = active.clone();
            let shutdown_rx = shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                worker_loop(id, shared, active, shutdown_rx).await;
            }));
        }

        tokio::spawn(async move {
            wait_for_shutdown_signal().await;
            tracing::info!("shutdown signal received, waiting for in-flight workers to finish");
            let _ = shutdown_tx.send(true);
        });

        for handle in handles {
            let _ = handle.await;
        }

        Ok(())
    }
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("installing SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = terminate.recv() => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn worker_loop(
    id: usize,
    shared: Arc<EngineShared>,
    active: Arc<Vec<AtomicBool>>,
    mut shutdown: watch::Receiver<bool>,
) {
    // Per-worker robots/site cache: reused across URLs of the same site
    // within this worker's run, per §5 ("each worker owns ... its own
    // robots parser instance").
    let mut site_cache: HashMap<String, (i64, RobotsPolicy)> = HashMap::new();

    loop {
        if *shutdown.borrow() {
            break;
        }

        match shared.frontier.pop().await {
            Ok(Some(page)) => {
                active[id].store(true, Ordering::SeqCst);
                let url = page.url.clone();
                if let Err(err) = process_page(&shared, page, &mut site_cache).await {
                    tracing::error!(worker = id, url = %url, error = %err, "failed to process page");
                }
            }
            Ok(None) => {
                active[id].store(false, Ordering::SeqCst);
                tokio::select! {
                    _ = tokio::time::sleep(IDLE_PROBE_INTERVAL) => {},
                    _ = shutdown.changed() => {},
                }
                if *shutdown.borrow() {
                    break;
                }
                if active.iter().all(|flag| !flag.load(Ordering::SeqCst)) {
                    tracing::info!(worker = id, "frontier idle across all workers, shutting down");
                    break;
                }
            }
            Err(err) => {
                tracing::error!(worker = id, error = %err, "frontier pop failed");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
}

/// Steps 1–10 of §4.9, executed for one popped frontier row.
async fn process_page(
    shared: &EngineShared,
    page: Page,
    site_cache: &mut HashMap<String, (i64, RobotsPolicy)>,
) -> Result<(), EngineError> {
    let mut page_id = page.id;

    // 1. fix-shortened
    let resolved = url_normalizer::fix_shortened(&shared.http_client, &page.url).await;
    let Some(requested) = url_normalizer::canonicalize(&resolved, None) else {
        tracing::warn!(url = %resolved, "could not canonicalize resolved URL, abandoning");
        shared.frontier.finalize_failed(page_id).await?;
        return Ok(());
    };

    let Some(domain) = requested.host_str().map(str::to_string) else {
        shared.frontier.finalize_failed(page_id).await?;
        return Ok(());
    };

    let Some(ip) = resolve_ip(&domain).await else {
        // §4.9 step 5 / §7: DNS failure abandons the URL without a state
        // change beyond what already happened — the row stays CRAWLING.
        tracing::warn!(%domain, "DNS resolution failed, abandoning URL");
        return Ok(());
    };

    let (site_id, policy, sitemap_urls) = ensure_site(shared, &domain, &ip, site_cache).await?;

    let delay = policy
        .crawl_delay()
        .map(Duration::from_secs_f64)
        .unwrap_or_else(|| Duration::from_secs_f64(DEFAULT_DOMAIN_DELAY_SECS));

    if !policy.can_fetch(requested.as_str()) {
        tracing::debug!(url = %requested, "disallowed by robots.txt");
        shared.frontier.finalize_failed(page_id).await?;
        return Ok(());
    }

    shared.politeness.wait_and_claim(&domain, &ip, delay).await;

    // 2. fetch
    let outcome = match shared.fetch_backend.fetch(requested.as_str()).await {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!(url = %requested, error = %err, "fetch failed");
            shared.frontier.finalize_failed(page_id).await?;
            return Ok(());
        }
    };

    let html = match outcome.body {
        FetchBody::Binary(_bytes) => {
            let data_type = outcome
                .content_type
                .as_deref()
                .and_then(mime_to_data_type)
                .or_else(|| url_normalizer::binary_link_extension(&requested).and_then(DataType::from_extension));

            if let Some(data_type) = data_type {
                shared
                    .frontier
                    .finalize_binary(page_id, Some(site_id), outcome.status as i32, data_type)
                    .await?;
            } else {
                shared.frontier.finalize_failed(page_id).await?;
            }
            return Ok(());
        }
        FetchBody::Html(html) => html,
    };

    // 3. dedup check
    let content_hash = hex_sha256(html.as_bytes());
    if let Some(original) = shared.dedup.find_by_hash(&content_hash).await? {
        shared
            .frontier
            .finalize_duplicate(page_id, Some(site_id), outcome.status as i32, &content_hash, original.id)
            .await?;
        return Ok(());
    }

    // 4. redirect handling
    let Some(final_canonical) = url_normalizer::canonicalize(&outcome.final_url, None) else {
        shared.frontier.finalize_failed(page_id).await?;
        return Ok(());
    };
    if final_canonical != requested {
        shared.frontier.finalize_redirect(page_id, outcome.status as i32).await?;
        let created = shared
            .frontier
            .create_empty(Some(site_id), final_canonical.as_str())
            .await?;
        page_id = created.id;
    }

    // 8. extract
    let extracted = shared.dom_extractor.extract(&html)?;

    let mut outbound_links = Vec::new();
    let mut binary_data_types = Vec::new();
    for link in extracted.links {
        let Some(canonical) = url_normalizer::canonicalize(&link, Some(&final_canonical)) else {
            continue;
        };
        if !url_normalizer::is_in_scope(&canonical, &shared.scope) {
            continue;
        }
        if let Some(ext) = url_normalizer::binary_link_extension(&canonical) {
            if let Some(data_type) = DataType::from_extension(ext) {
                binary_data_types.push(data_type);
            }
            continue;
        }
        if policy.can_fetch(canonical.as_str()) {
            outbound_links.push(canonical.to_string());
        }
    }
    outbound_links.extend(sitemap_urls.urls);

    // 10. finalize-html, attach images/data, enqueue discoveries
    shared
        .frontier
        .finalize_html(page_id, Some(site_id), outcome.status as i32, &html, &content_hash)
        .await?;
    shared.frontier.save_images(page_id, &extracted.images).await?;
    for data_type in binary_data_types {
        shared.frontier.save_page_data(page_id, data_type).await?;
    }
    for link in &outbound_links {
        shared.frontier.add(Some(site_id), link).await?;
    }

    Ok(())
}

/// §4.9 step 7: loads a known site's persisted robots.txt, or bootstraps an
/// unknown one by fetching robots.txt and walking its sitemaps under the
/// politeness gate.
async fn ensure_site(
    shared: &EngineShared,
    domain: &str,
    ip: &str,
    site_cache: &mut HashMap<String, (i64, RobotsPolicy)>,
) -> Result<(i64, RobotsPolicy, SitemapUrls), EngineError> {
    if let Some((site_id, policy)) = site_cache.get(domain) {
        return Ok((*site_id, policy.clone(), SitemapUrls::default()));
    }

    if let Some(site) = shared.sites.get(domain).await? {
        let policy = match &site.robots_content {
            Some(raw) if !raw.is_empty() => RobotsPolicy::parse(raw.clone()),
            _ => RobotsPolicy::permissive(),
        };
        site_cache.insert(domain.to_string(), (site.id, policy.clone()));
        return Ok((site.id, policy, SitemapUrls::default()));
    }

    shared
        .politeness
        .wait_and_claim(domain, ip, Duration::from_secs_f64(DEFAULT_DOMAIN_DELAY_SECS))
        .await;

    let raw_robots = robots::fetch_robots_txt(&shared.http_client, domain)
        .await
        .unwrap_or(None);
    let policy = raw_robots
        .clone()
        .map(RobotsPolicy::parse)
        .unwrap_or_else(RobotsPolicy::permissive);

    let site = shared.sites.save_robots(domain, raw_robots.as_deref()).await?;

    // §4.3: prefer the sitemap(s) robots.txt declares; fall back to the
    // conventional /sitemap.xml location when it declares none.
    let declared_sitemaps = policy.sitemaps();
    let sitemap_root = if declared_sitemaps.is_empty() {
        fetch_sitemap_root(shared, domain).await.map(|xml| (format!("https://{domain}/sitemap.xml"), xml))
    } else {
        fetch_first_ok(shared, &declared_sitemaps).await
    };

    let sitemap_urls = match sitemap_root {
        Some((_, xml)) => {
            let client = shared.http_client.clone();
            let fetch = |url: String| {
                let client = client.clone();
                async move {
                    client
                        .get(&url)
                        .send()
                        .await
                        .and_then(|r| r.error_for_status())
                        .map_err(|source| crate::error::FetchError::Request { url, source })?
                        .text()
                        .await
                        .map_err(|source| crate::error::FetchError::Request {
                            url: String::new(),
                            source,
                        })
                }
            };
            let urls = sitemap::walk_sitemap(&xml, fetch).await;
            shared.sites.save_sitemap(site.id, &xml).await?;
            urls
        }
        None => SitemapUrls::default(),
    };

    let filtered = SitemapUrls {
        urls: sitemap_urls
            .urls
            .into_iter()
            .filter_map(|u| url_normalizer::canonicalize(&u, None))
            .filter(|u| url_normalizer::is_in_scope(u, &shared.scope))
            .map(|u| u.to_string())
            .collect(),
        truncated: sitemap_urls.truncated,
    };

    site_cache.insert(domain.to_string(), (site.id, policy.clone()));

    Ok((site.id, policy, filtered))
}

async fn fetch_sitemap_root(shared: &EngineShared, domain: &str) -> Option<String> {
    let url = format!("https://{domain}/sitemap.xml");
    let response = shared.http_client.get(&url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    response.text().await.ok()
}

/// Fetches each declared sitemap URL in order, returning the first one that
/// responds successfully along with its body.
async fn fetch_first_ok(shared: &EngineShared, urls: &[String]) -> Option<(String, String)> {
    for url in urls {
        let Ok(response) = shared.http_client.get(url).send().await else {
            continue;
        };
        if !response.status().is_success() {
            continue;
        }
        if let Ok(text) = response.text().await {
            return Some((url.clone(), text));
        }
    }
    None
}

async fn resolve_ip(domain: &str) -> Option<String> {
    tokio::net::lookup_host((domain, 443))
        .await
        .ok()?
        .next()
        .map(|addr| addr.ip().to_string())
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_sha256_is_stable_and_lowercase() {
        let a = hex_sha256(b"hello world");
        let b = hex_sha256(b"hello world");
        assert_eq!(a, b);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn hex_sha256_differs_on_different_input() {
        assert_ne!(hex_sha256(b"a"), hex_sha256(b"b"));
    }
}
