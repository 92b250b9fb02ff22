//! A polite, multi-worker crawler that discovers and archives pages within
//! a configured set of allowed domains, honoring `robots.txt` and
//! deduplicating by content.
//!
//! The crate is organized around the data flow of one crawled URL: it is
//! popped from the [`db::FrontierStore`], canonicalized by
//! [`url_normalizer`], checked against [`robots`] and the politeness
//! schedule in [`politeness`], fetched through a [`fetch::FetchBackend`],
//! parsed by a [`dom::DomExtractor`], and its outcome persisted back through
//! the frontier store. [`engine::CrawlEngine`] orchestrates this loop across
//! a pool of worker tasks.

pub mod config;
pub mod db;
pub mod dom;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod model;
pub mod politeness;
pub mod robots;
pub mod sitemap;
pub mod url_normalizer;

pub use config::Config;
pub use engine::CrawlEngine;
pub use error::EngineError;
