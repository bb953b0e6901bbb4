//! Partner repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{Partner, PartnerInput, PartnerStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait PartnerRepository: Send + Sync {
    /// New partners always start as `pending`
    async fn create(&self, input: &PartnerInput) -> Result<Partner>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Partner>>;

    /// Newest first
    async fn list(&self) -> Result<Vec<Partner>>;

    async fn list_by_status(&self, status: PartnerStatus) -> Result<Vec<Partner>>;

    async fn update(&self, id: i64, input: &PartnerInput) -> Result<Option<Partner>>;

    /// Compare-and-set on the status column
    async fn set_status(&self, id: i64, from: PartnerStatus, to: PartnerStatus) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count_with_status(&self, status: PartnerStatus) -> Result<i64>;
}

const PARTNER_COLUMNS: &str = "id, organization_name, contact_name, email, phone, website, \
     logo_url, description, partnership_type, status, created_at, updated_at";

macro_rules! row_to_partner {
    ($row:expr) => {{
        let status: String = $row.get("status");
        Partner {
            id: $row.get("id"),
            organization_name: $row.get("organization_name"),
            contact_name: $row.get("contact_name"),
            email: $row.get("email"),
            phone: $row.get("phone"),
            website: $row.get("website"),
            logo_url: $row.get("logo_url"),
            description: $row.get("description"),
            partnership_type: $row.get("partnership_type"),
            status: PartnerStatus::from_str(&status)?,
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    }};
}

pub struct SqlxPartnerRepository {
    pool: DynDatabasePool,
}

impl SqlxPartnerRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PartnerRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch(&self, sql: &str, status: Option<&str>) -> Result<Vec<Partner>> {
        let mut partners = Vec::new();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let query = sqlx::query(sql);
                let query = match status {
                    Some(status) => query.bind(status),
                    None => query,
                };
                for row in query.fetch_all(pool).await.context("Failed to list partners")? {
                    partners.push(row_to_partner!(row));
                }
            }
            Backend::Mysql(pool) => {
                let query = sqlx::query(sql);
                let query = match status {
                    Some(status) => query.bind(status),
                    None => query,
                };
                for row in query.fetch_all(pool).await.context("Failed to list partners")? {
                    partners.push(row_to_partner!(row));
                }
            }
        }
        Ok(partners)
    }
}

#[async_trait]
impl PartnerRepository for SqlxPartnerRepository {
    async fn create(&self, input: &PartnerInput) -> Result<Partner> {
        let sql = r#"
            INSERT INTO partners
                (organization_name, contact_name, email, phone, website, logo_url, description,
                 partnership_type, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, 'pending', ?, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&input.organization_name)
                .bind(&input.contact_name)
                .bind(&input.email)
                .bind(&input.phone)
                .bind(&input.website)
                .bind(&input.logo_url)
                .bind(&input.description)
                .bind(&input.partnership_type)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create partner")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&input.organization_name)
                .bind(&input.contact_name)
                .bind(&input.email)
                .bind(&input.phone)
                .bind(&input.website)
                .bind(&input.logo_url)
                .bind(&input.description)
                .bind(&input.partnership_type)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create partner")?
                .last_insert_id() as i64,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Partner not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Partner>> {
        let sql = format!("SELECT {} FROM partners WHERE id = ?", PARTNER_COLUMNS);
        let mut found = None;
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                if let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(pool).await? {
                    found = Some(row_to_partner!(row));
                }
            }
            Backend::Mysql(pool) => {
                if let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(pool).await? {
                    found = Some(row_to_partner!(row));
                }
            }
        }
        Ok(found)
    }

    async fn list(&self) -> Result<Vec<Partner>> {
        let sql = format!(
            "SELECT {} FROM partners ORDER BY created_at DESC, id DESC",
            PARTNER_COLUMNS
        );
        self.fetch(&sql, None).await
    }

    async fn list_by_status(&self, status: PartnerStatus) -> Result<Vec<Partner>> {
        let sql = format!(
            "SELECT {} FROM partners WHERE status = ? ORDER BY organization_name ASC",
            PARTNER_COLUMNS
        );
        self.fetch(&sql, Some(status.as_str())).await
    }

    async fn update(&self, id: i64, input: &PartnerInput) -> Result<Option<Partner>> {
        let sql = r#"
            UPDATE partners
            SET organization_name = ?, contact_name = ?, email = ?, phone = ?, website = ?,
                logo_url = ?, description = ?, partnership_type = ?, updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&input.organization_name)
                .bind(&input.contact_name)
                .bind(&input.email)
                .bind(&input.phone)
                .bind(&input.website)
                .bind(&input.logo_url)
                .bind(&input.description)
                .bind(&input.partnership_type)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update partner")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&input.organization_name)
                .bind(&input.contact_name)
                .bind(&input.email)
                .bind(&input.phone)
                .bind(&input.website)
                .bind(&input.logo_url)
                .bind(&input.description)
                .bind(&input.partnership_type)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update partner")?
                .rows_affected(),
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn set_status(&self, id: i64, from: PartnerStatus, to: PartnerStatus) -> Result<bool> {
        let sql = "UPDATE partners SET status = ?, updated_at = ? WHERE id = ? AND status = ?";
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(to.as_str())
                .bind(now)
                .bind(id)
                .bind(from.as_str())
                .execute(pool)
                .await
                .context("Failed to update partner status")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(to.as_str())
                .bind(now)
                .bind(id)
                .bind(from.as_str())
                .execute(pool)
                .await
                .context("Failed to update partner status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM partners WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count_with_status(&self, status: PartnerStatus) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM partners WHERE status = ?";
        let count = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(status.as_str())
                .fetch_one(pool)
                .await?
                .get("count"),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(status.as_str())
                .fetch_one(pool)
                .await?
                .get("count"),
        };
        Ok(count)
    }
}
