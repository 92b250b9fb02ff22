//! A5: the crawler entry point. Reads configuration from the environment,
//! connects to Postgres, seeds the frontier with the reference deployment's
//! starting domains, and runs the worker pool until the frontier drains or
//! a shutdown signal arrives.

use govsi_crawler::{Config, CrawlEngine};

/// Starting points for the `.gov.si` crawl, matching the reference
/// deployment's `seed_urls`.
const SEED_URLS: &[&str] = &[
    "https://www.gov.si",
    "https://evem.gov.si",
    "https://e-uprava.gov.si",
    "https://e-prostor.gov.si",
];

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(err) = run().await {
        tracing::error!(error = %err, "crawl run failed to start");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    tracing::info!(n_threads = config.n_threads, "starting crawl");

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections((config.n_threads as u32) + 1)
        .connect(&config.database_url())
        .await?;

    let engine = CrawlEngine::new(pool, config.n_threads)?;

    let inserted = engine
        .seed(SEED_URLS.iter().map(|s| s.to_string()))
        .await?;
    tracing::info!(inserted, "seeded frontier");

    engine.run().await?;
    tracing::info!("worker pool terminated");
    Ok(())
}
