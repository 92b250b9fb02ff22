//! Postgres-backed persistence: the frontier store (C7), the dedup index
//! (C8), and the site store (robots.txt/sitemap persistence for C2/C3).

pub mod dedup;
pub mod frontier;
pub mod site_store;

pub use dedup::DedupIndex;
pub use frontier::FrontierStore;
pub use site_store::SiteStore;

use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::model::{Page, PageType};

/// Shared row-to-`Page` mapping used by every query in this module that
/// reads back a `page` row.
pub(crate) fn page_from_row(row: &PgRow) -> Page {
    let page_type_code: String = row.get("page_type_code");
    Page {
        id: row.get("id"),
        site_id: row.get("site_id"),
        page_type: PageType::from_code(&page_type_code).unwrap_or(PageType::Failed),
        url: row.get("url"),
        html_content: row.get("html_content"),
        http_status_code: row.get("http_status_code"),
        html_content_hash: row.get("html_content_hash"),
        accessed_time: row.get("accessed_time"),
    }
}
