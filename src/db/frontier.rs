//! C7: the frontier store, i.e. the `page` table's state machine
//! (`FRONTIER -> CRAWLING -> {HTML|BINARY|DUPLICATE|FAILED}`).
//!
//! `pop` uses `SELECT ... FOR UPDATE SKIP LOCKED` rather than the reference
//! deployment's plain `FOR UPDATE` — with several workers popping
//! concurrently, `FOR UPDATE` alone makes every worker but one block on the
//! same row instead of moving on to the next one. `SKIP LOCKED` preserves
//! at-most-once delivery (a locked row is simply invisible to the competing
//! pop, never handed out twice) while letting workers actually run in
//! parallel.

use sqlx::PgPool;

use super::page_from_row;
use crate::error::StoreError;
use crate::model::{DataType, ImageRecord, Page};

pub struct FrontierStore {
    pool: PgPool,
}

impl FrontierStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Idempotent: inserting a URL already present in the frontier (under
    /// any status) is a no-op. Returns `true` iff a new row was created.
    pub async fn add(&self, site_id: Option<i64>, url: &str) -> Result<bool, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO page (site_id, page_type_code, url)
            VALUES ($1, 'FRONTIER', $2)
            ON CONFLICT (url) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(site_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    /// Claims the oldest (lowest-id) frontier entry, atomically transitioning
    /// it to `CRAWLING` so no other worker can claim it concurrently.
    pub async fn pop(&self) -> Result<Option<Page>, StoreError> {
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query(
            r#"
            SELECT id FROM page
            WHERE page_type_code = 'FRONTIER'
            ORDER BY id ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .fetch_optional(&mut *tx)
        .await?;

        let Some(claimed) = claimed else {
            tx.commit().await?;
            return Ok(None);
        };

        let id: i64 = sqlx::Row::get(&claimed, "id");

        let row = sqlx::query(
            r#"
            UPDATE page SET page_type_code = 'CRAWLING'
            WHERE id = $1
            RETURNING id, site_id, page_type_code, url, html_content, http_status_code, html_content_hash, accessed_time
            "#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Some(page_from_row(&row)))
    }

    /// *create-empty(u)*: ensures a `FRONTIER` row exists for the final URL
    /// of a followed redirect, returning the existing row if one was already
    /// there under any status.
    pub async fn create_empty(&self, site_id: Option<i64>, url: &str) -> Result<Page, StoreError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO page (site_id, page_type_code, url)
            VALUES ($1, 'FRONTIER', $2)
            ON CONFLICT (url) DO NOTHING
            RETURNING id, site_id, page_type_code, url, html_content, http_status_code, html_content_hash, accessed_time
            "#,
        )
        .bind(site_id)
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok(page_from_row(&row));
        }

        let row = sqlx::query(
            r#"SELECT id, site_id, page_type_code, url, html_content, http_status_code, html_content_hash, accessed_time
               FROM page WHERE url = $1"#,
        )
        .bind(url)
        .fetch_one(&self.pool)
        .await?;

        Ok(page_from_row(&row))
    }

    pub async fn finalize_html(
        &self,
        id: i64,
        site_id: Option<i64>,
        http_status: i32,
        html_content: &str,
        content_hash: &str,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            UPDATE page SET
                page_type_code = 'HTML',
                site_id = $2,
                html_content = $3,
                http_status_code = $4,
                html_content_hash = $5,
                accessed_time = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(site_id)
        .bind(html_content)
        .bind(http_status)
        .bind(content_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Records a page whose content matched an already-seen hash without
    /// storing the duplicate body again, and links it to the original page.
    pub async fn finalize_duplicate(
        &self,
        id: i64,
        site_id: Option<i64>,
        http_status: i32,
        content_hash: &str,
        original_page_id: i64,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE page SET
                page_type_code = 'DUPLICATE',
                site_id = $2,
                http_status_code = $3,
                html_content_hash = $4,
                accessed_time = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(site_id)
        .bind(http_status)
        .bind(content_hash)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO link (from_page, to_page) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(id)
            .bind(original_page_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Transitions the page to `BINARY` and records its single `PageData`
    /// row in the same transaction.
    pub async fn finalize_binary(
        &self,
        id: i64,
        site_id: Option<i64>,
        http_status: i32,
        data_type: DataType,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"UPDATE page SET page_type_code = 'BINARY', site_id = $2, http_status_code = $3, accessed_time = now() WHERE id = $1"#,
        )
        .bind(id)
        .bind(site_id)
        .bind(http_status)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO page_data (page_id, data_type_code) VALUES ($1, $2)")
            .bind(id)
            .bind(data_type.as_code())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    pub async fn finalize_failed(&self, id: i64) -> Result<(), StoreError> {
        sqlx::query(r#"UPDATE page SET page_type_code = 'FAILED', accessed_time = now() WHERE id = $1"#)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Redirect law (§4.9): the original request's row is recorded as an
    /// `HTML` page carrying the redirect's status code; the final URL gets
    /// its own frontier row via [`Self::create_empty`].
    pub async fn finalize_redirect(&self, id: i64, http_status: i32) -> Result<(), StoreError> {
        sqlx::query(
            r#"UPDATE page SET page_type_code = 'HTML', http_status_code = $2, accessed_time = now() WHERE id = $1"#,
        )
        .bind(id)
        .bind(http_status)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn save_images(&self, page_id: i64, images: &[ImageRecord]) -> Result<(), StoreError> {
        for image in images {
            sqlx::query(
                "INSERT INTO image (page_id, filename, content_type, accessed_time) VALUES ($1, $2, $3, now())",
            )
            .bind(page_id)
            .bind(&image.filename)
            .bind(&image.content_type)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    pub async fn save_page_data(&self, page_id: i64, data_type: DataType) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO page_data (page_id, data_type_code) VALUES ($1, $2)")
            .bind(page_id)
            .bind(data_type.as_code())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
