//! Hero image repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{DisplayOrder, HeroImage, HeroImageInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait HeroImageRepository: Send + Sync {
    /// `display_order` must already be resolved
    async fn create(&self, input: &HeroImageInput, display_order: i32) -> Result<HeroImage>;

    async fn get_by_id(&self, id: i64) -> Result<Option<HeroImage>>;

    /// Images in display order; inactive ones only when `include_inactive`
    async fn list(&self, include_inactive: bool) -> Result<Vec<HeroImage>>;

    async fn update(
        &self,
        id: i64,
        input: &HeroImageInput,
        display_order: i32,
    ) -> Result<Option<HeroImage>>;

    /// Flip `is_active`
    async fn toggle_active(&self, id: i64) -> Result<Option<HeroImage>>;

    /// Apply all positions atomically. Returns `false`, changing nothing,
    /// when any id does not exist.
    async fn reorder(&self, orders: &[DisplayOrder]) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Highest display order in use, `None` when there are no images
    async fn max_display_order(&self) -> Result<Option<i32>>;
}

const HERO_COLUMNS: &str =
    "id, title, subtitle, image_url, link_url, display_order, is_active, created_at, updated_at";

macro_rules! row_to_hero {
    ($row:expr) => {
        HeroImage {
            id: $row.get("id"),
            title: $row.get("title"),
            subtitle: $row.get("subtitle"),
            image_url: $row.get("image_url"),
            link_url: $row.get("link_url"),
            display_order: $row.get("display_order"),
            is_active: $row.get("is_active"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

pub struct SqlxHeroImageRepository {
    pool: DynDatabasePool,
}

impl SqlxHeroImageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn HeroImageRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl HeroImageRepository for SqlxHeroImageRepository {
    async fn create(&self, input: &HeroImageInput, display_order: i32) -> Result<HeroImage> {
        let sql = r#"
            INSERT INTO hero_images
                (title, subtitle, image_url, link_url, display_order, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&input.title)
                .bind(&input.subtitle)
                .bind(&input.image_url)
                .bind(&input.link_url)
                .bind(display_order)
                .bind(input.is_active)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create hero image")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&input.title)
                .bind(&input.subtitle)
                .bind(&input.image_url)
                .bind(&input.link_url)
                .bind(display_order)
                .bind(input.is_active)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create hero image")?
                .last_insert_id() as i64,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Hero image not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<HeroImage>> {
        let sql = format!("SELECT {} FROM hero_images WHERE id = ?", HERO_COLUMNS);
        let image = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get hero image")?
                .map(|row| row_to_hero!(row)),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get hero image")?
                .map(|row| row_to_hero!(row)),
        };
        Ok(image)
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<HeroImage>> {
        let filter = if include_inactive { "" } else { "WHERE is_active = TRUE" };
        let sql = format!(
            "SELECT {} FROM hero_images {} ORDER BY display_order ASC, id ASC",
            HERO_COLUMNS, filter
        );
        let images = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list hero images")?
                .iter()
                .map(|row| row_to_hero!(row))
                .collect(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list hero images")?
                .iter()
                .map(|row| row_to_hero!(row))
                .collect(),
        };
        Ok(images)
    }

    async fn update(
        &self,
        id: i64,
        input: &HeroImageInput,
        display_order: i32,
    ) -> Result<Option<HeroImage>> {
        let sql = r#"
            UPDATE hero_images
            SET title = ?, subtitle = ?, image_url = ?, link_url = ?, display_order = ?,
                is_active = ?, updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&input.title)
                .bind(&input.subtitle)
                .bind(&input.image_url)
                .bind(&input.link_url)
                .bind(display_order)
                .bind(input.is_active)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update hero image")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&input.title)
                .bind(&input.subtitle)
                .bind(&input.image_url)
                .bind(&input.link_url)
                .bind(display_order)
                .bind(input.is_active)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update hero image")?
                .rows_affected(),
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn toggle_active(&self, id: i64) -> Result<Option<HeroImage>> {
        let sql = "UPDATE hero_images SET is_active = NOT is_active, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to toggle hero image")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to toggle hero image")?
                .rows_affected(),
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn reorder(&self, orders: &[DisplayOrder]) -> Result<bool> {
        let exists = "SELECT COUNT(*) FROM hero_images WHERE id = ?";
        let sql = "UPDATE hero_images SET display_order = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let mut tx = pool.begin().await?;
                for order in orders {
                    let count: i64 = sqlx::query_scalar(exists)
                        .bind(order.id)
                        .fetch_one(&mut *tx)
                        .await
                        .context("Failed to check hero image")?;
                    if count == 0 {
                        tx.rollback().await?;
                        return Ok(false);
                    }
                    sqlx::query(sql)
                        .bind(order.display_order)
                        .bind(now)
                        .bind(order.id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to reorder hero images")?;
                }
                tx.commit().await?;
            }
            Backend::Mysql(pool) => {
                let mut tx = pool.begin().await?;
                for order in orders {
                    let count: i64 = sqlx::query_scalar(exists)
                        .bind(order.id)
                        .fetch_one(&mut *tx)
                        .await
                        .context("Failed to check hero image")?;
                    if count == 0 {
                        tx.rollback().await?;
                        return Ok(false);
                    }
                    sqlx::query(sql)
                        .bind(order.display_order)
                        .bind(now)
                        .bind(order.id)
                        .execute(&mut *tx)
                        .await
                        .context("Failed to reorder hero images")?;
                }
                tx.commit().await?;
            }
        }
        Ok(true)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM hero_images WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn max_display_order(&self) -> Result<Option<i32>> {
        let sql = "SELECT MAX(display_order) as max_order FROM hero_images";
        let max: Option<i64> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).fetch_one(pool).await?.get("max_order"),
            Backend::Mysql(pool) => sqlx::query(sql).fetch_one(pool).await?.get("max_order"),
        };
        Ok(max.map(|m| m as i32))
    }
}
