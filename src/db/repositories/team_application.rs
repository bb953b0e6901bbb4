//! Team application repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ApplicationStatus, CreateApplicationInput, TeamApplication};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait TeamApplicationRepository: Send + Sync {
    async fn create(&self, input: &CreateApplicationInput) -> Result<TeamApplication>;

    async fn get_by_id(&self, id: i64) -> Result<Option<TeamApplication>>;

    /// Newest first
    async fn list(&self) -> Result<Vec<TeamApplication>>;

    async fn set_status(&self, id: i64, status: ApplicationStatus)
        -> Result<Option<TeamApplication>>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count_with_status(&self, status: ApplicationStatus) -> Result<i64>;
}

pub struct SqlxTeamApplicationRepository {
    pool: DynDatabasePool,
}

impl SqlxTeamApplicationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TeamApplicationRepository> {
        Arc::new(Self::new(pool))
    }
}

const APPLICATION_COLUMNS: &str = "id, full_name, email, phone, position, resume_url, \
     cover_letter, status, created_at, updated_at";

macro_rules! row_to_application {
    ($row:expr) => {{
        let status: String = $row.get("status");
        TeamApplication {
            id: $row.get("id"),
            full_name: $row.get("full_name"),
            email: $row.get("email"),
            phone: $row.get("phone"),
            position: $row.get("position"),
            resume_url: $row.get("resume_url"),
            cover_letter: $row.get("cover_letter"),
            status: ApplicationStatus::from_str(&status)?,
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    }};
}

#[async_trait]
impl TeamApplicationRepository for SqlxTeamApplicationRepository {
    async fn create(&self, input: &CreateApplicationInput) -> Result<TeamApplication> {
        let sql = r#"
            INSERT INTO team_applications
                (full_name, email, phone, position, resume_url, cover_letter, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&input.full_name)
                .bind(&input.email)
                .bind(&input.phone)
                .bind(&input.position)
                .bind(&input.resume_url)
                .bind(&input.cover_letter)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create team application")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&input.full_name)
                .bind(&input.email)
                .bind(&input.phone)
                .bind(&input.position)
                .bind(&input.resume_url)
                .bind(&input.cover_letter)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create team application")?
                .last_insert_id() as i64,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Team application not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<TeamApplication>> {
        let sql = format!("SELECT {} FROM team_applications WHERE id = ?", APPLICATION_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
                Ok(match row {
                    Some(row) => Some(row_to_application!(row)),
                    None => None,
                })
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
                Ok(match row {
                    Some(row) => Some(row_to_application!(row)),
                    None => None,
                })
            }
        }
    }

    async fn list(&self) -> Result<Vec<TeamApplication>> {
        let sql = format!(
            "SELECT {} FROM team_applications ORDER BY created_at DESC, id DESC",
            APPLICATION_COLUMNS
        );
        let mut applications = Vec::new();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                for row in sqlx::query(&sql).fetch_all(pool).await? {
                    applications.push(row_to_application!(row));
                }
            }
            Backend::Mysql(pool) => {
                for row in sqlx::query(&sql).fetch_all(pool).await? {
                    applications.push(row_to_application!(row));
                }
            }
        }
        Ok(applications)
    }

    async fn set_status(
        &self,
        id: i64,
        status: ApplicationStatus,
    ) -> Result<Option<TeamApplication>> {
        let sql = "UPDATE team_applications SET status = ?, updated_at = ? WHERE id = ?";
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update application status")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(status.as_str())
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update application status")?
                .rows_affected(),
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM team_applications WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count_with_status(&self, status: ApplicationStatus) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM team_applications WHERE status = ?";
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
