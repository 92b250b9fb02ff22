//! Error types for the crawler, one enum per module boundary.
//!
//! Each component raises its own error; [`EngineError`] aggregates them so the
//! worker loop has a single type to match on at its top-level boundary.

use thiserror::Error;

/// Errors produced while loading configuration from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable `{0}`")]
    MissingVar(&'static str),

    #[error("environment variable `{0}` could not be parsed: {1}")]
    InvalidVar(&'static str, String),
}

/// Errors produced while fetching a URL through a [`crate::fetch::FetchBackend`].
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors produced while acquiring or parsing a site's `robots.txt`.
#[derive(Debug, Error)]
pub enum RobotsError {
    #[error("fetching robots.txt from {url} failed: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors produced while extracting links and images from a DOM.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("failed to parse selector `{selector}`: {message}")]
    BadSelector { selector: String, message: String },
}

/// Errors produced by the frontier store, dedup index, and site store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Top-level error surfaced at the engine's worker-loop boundary.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Robots(#[from] RobotsError),

    #[error(transparent)]
    Extract(#[from] ExtractError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("DNS resolution for {domain} failed")]
    DnsResolution { domain: String },
}
