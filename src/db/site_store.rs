//! Per-domain `site` rows: robots.txt and sitemap text, persisted so a
//! restarted worker can reconstruct a [`crate::robots::RobotsPolicy`] without
//! refetching.

use sqlx::PgPool;

use crate::error::StoreError;
use crate::model::Site;

pub struct SiteStore {
    pool: PgPool,
}

impl SiteStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, domain: &str) -> Result<Option<Site>, StoreError> {
        let site = sqlx::query_as::<_, Site>(
            "SELECT id, domain, robots_content, sitemap_content FROM site WHERE domain = $1",
        )
        .bind(domain)
        .fetch_optional(&self.pool)
        .await?;

        Ok(site)
    }

    /// Creates the `site` row for `domain` if it doesn't exist yet, then
    /// records `robots_content`. Idempotent: re-fetching robots.txt for an
    /// already-known site just overwrites the column.
    pub async fn save_robots(
        &self,
        domain: &str,
        robots_content: Option<&str>,
    ) -> Result<Site, StoreError> {
        let site = sqlx::query_as::<_, Site>(
            r#"
            INSERT INTO site (domain, robots_content)
            VALUES ($1, $2)
            ON CONFLICT (domain) DO UPDATE SET robots_content = EXCLUDED.robots_content
            RETURNING id, domain, robots_content, sitemap_content
            "#,
        )
        .bind(domain)
        .bind(robots_content)
        .fetch_one(&self.pool)
        .await?;

        Ok(site)
    }

    pub async fn save_sitemap(&self, site_id: i64, sitemap_content: &str) -> Result<(), StoreError> {
        sqlx::query("UPDATE site SET sitemap_content = $1 WHERE id = $2")
            .bind(sitemap_content)
            .bind(site_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}
