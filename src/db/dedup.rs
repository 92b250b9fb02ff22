//! C8: the content-hash dedup index. A lookup, not a write path — the
//! frontier store is the only thing that mutates `page` rows.

use sqlx::PgPool;

use super::page_from_row;
use crate::error::StoreError;
use crate::model::Page;

pub struct DedupIndex {
    pool: PgPool,
}

impl DedupIndex {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the first (lowest-id) `Page` whose `html_content_hash`
    /// matches `hash`, if any — the canonical page a duplicate should link
    /// to instead of storing its own body.
    pub async fn find_by_hash(&self, hash: &str) -> Result<Option<Page>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, site_id, page_type_code, url, html_content, http_status_code, html_content_hash, accessed_time
            FROM page
            WHERE html_content_hash = $1
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| page_from_row(&r)))
    }
}
