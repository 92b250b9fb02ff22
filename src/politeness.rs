//! C4: shared politeness scheduling.
//!
//! Workers share one [`PolitenessScheduler`]. The wait-and-claim contract
//! from §4.4 is split in two: the wait duration is computed and the next
//! slot is reserved while holding the lock, but the actual sleep happens
//! after releasing it — reserving before sleeping is what keeps two workers
//! racing for the same domain or IP from both computing a zero wait.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Crawl-delay fallback used when a site's robots.txt specifies none,
/// matching the reference deployment's `default_domain_delay`.
pub const DEFAULT_DOMAIN_DELAY_SECS: f64 = 5.0;

/// Tracks the next moment each domain and each IP address are allowed to be
/// hit again.
pub struct PolitenessScheduler {
    domain_next_ok: Mutex<HashMap<String, Instant>>,
    ip_next_ok: Mutex<HashMap<String, Instant>>,
}

impl Default for PolitenessScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl PolitenessScheduler {
    pub fn new() -> Self {
        Self {
            domain_next_ok: Mutex::new(HashMap::new()),
            ip_next_ok: Mutex::new(HashMap::new()),
        }
    }

    /// Reserves the next slot for `(domain, ip)` under `delay`, then sleeps
    /// for however long was needed to honor both the domain's and the IP's
    /// cooldown. Safe to call concurrently from any number of workers.
    pub async fn wait_and_claim(&self, domain: &str, ip: &str, delay: Duration) {
        let wait = self.reserve(domain, ip, delay);
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
    }

    fn reserve(&self, domain: &str, ip: &str, delay: Duration) -> Duration {
        let now = Instant::now();

        let mut domains = self.domain_next_ok.lock().unwrap();
        let mut ips = self.ip_next_ok.lock().unwrap();

        let domain_ready = domains.get(domain).copied().unwrap_or(now);
        let ip_ready = ips.get(ip).copied().unwrap_or(now);
        let ready_at = domain_ready.max(ip_ready).max(now);

        domains.insert(domain.to_string(), ready_at + delay);
        ips.insert(ip.to_string(), ready_at + delay);

        ready_at.saturating_duration_since(now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[tokio::test]
    async fn first_claim_on_fresh_domain_does_not_wait() {
        let scheduler = PolitenessScheduler::new();
        let started = Instant::now();
        scheduler
            .wait_and_claim("a.gov.si", "10.0.0.1", Duration::from_millis(50))
            .await;
        assert!(started.elapsed() < Duration::from_millis(40));
    }

    #[tokio::test]
    async fn second_claim_on_same_domain_waits_out_delay() {
        let scheduler = PolitenessScheduler::new();
        scheduler
            .wait_and_claim("a.gov.si", "10.0.0.1", Duration::from_millis(80))
            .await;

        let started = Instant::now();
        scheduler
            .wait_and_claim("a.gov.si", "10.0.0.1", Duration::from_millis(80))
            .await;
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn shared_ip_across_domains_still_serializes() {
        let scheduler = Arc::new(PolitenessScheduler::new());
        scheduler
            .wait_and_claim("a.gov.si", "10.0.0.1", Duration::from_millis(80))
            .await;

        let started = Instant::now();
        scheduler
            .wait_and_claim("b.gov.si", "10.0.0.1", Duration::from_millis(80))
            .await;
        assert!(started.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn concurrent_claims_on_same_domain_never_both_see_zero_wait() {
        let scheduler = Arc::new(PolitenessScheduler::new());
        let delay = Duration::from_millis(100);

        let s1 = scheduler.clone();
        let t1 = tokio::spawn(async move {
            let started = Instant::now();
            s1.wait_and_claim("a.gov.si", "10.0.0.1", delay).await;
            started.elapsed()
        });
        let s2 = scheduler.clone();
        let t2 = tokio::spawn(async move {
            let started = Instant::now();
            s2.wait_and_claim("a.gov.si", "10.0.0.1", delay).await;
            started.elapsed()
        });

        let (e1, e2) = (t1.await.unwrap(), t2.await.unwrap());
        let longer = e1.max(e2);
        assert!(longer >= Duration::from_millis(80));
    }
}
