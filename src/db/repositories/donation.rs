//! Donation inquiry repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{CreateDonationInput, DonationInquiry, DonationStatus, Money};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait DonationRepository: Send + Sync {
    async fn create(&self, input: &CreateDonationInput, currency: &str) -> Result<DonationInquiry>;

    async fn get_by_id(&self, id: i64) -> Result<Option<DonationInquiry>>;

    /// Newest first
    async fn list(&self) -> Result<Vec<DonationInquiry>>;

    async fn set_status(&self, id: i64, status: DonationStatus)
        -> Result<Option<DonationInquiry>>;

    async fn count_with_status(&self, status: DonationStatus) -> Result<i64>;
}

const DONATION_COLUMNS: &str =
    "id, full_name, email, phone, amount_cents, currency, message, status, created_at";

macro_rules! row_to_donation {
    ($row:expr) => {{
        let status: String = $row.get("status");
        DonationInquiry {
            id: $row.get("id"),
            full_name: $row.get("full_name"),
            email: $row.get("email"),
            phone: $row.get("phone"),
            amount: $row
                .get::<Option<i64>, _>("amount_cents")
                .map(Money::from_cents),
            currency: $row.get("currency"),
            message: $row.get("message"),
            status: DonationStatus::from_str(&status)?,
            created_at: $row.get("created_at"),
        }
    }};
}

pub struct SqlxDonationRepository {
    pool: DynDatabasePool,
}

impl SqlxDonationRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn DonationRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl DonationRepository for SqlxDonationRepository {
    async fn create(&self, input: &CreateDonationInput, currency: &str) -> Result<DonationInquiry> {
        let sql = r#"
            INSERT INTO donation_inquiries
                (full_name, email, phone, amount_cents, currency, message, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, 'new', ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&input.full_name)
                .bind(&input.email)
                .bind(&input.phone)
                .bind(input.amount.map(Money::cents))
                .bind(currency)
                .bind(&input.message)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create donation inquiry")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&input.full_name)
                .bind(&input.email)
                .bind(&input.phone)
                .bind(input.amount.map(Money::cents))
                .bind(currency)
                .bind(&input.message)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create donation inquiry")?
                .last_insert_id() as i64,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Donation inquiry not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<DonationInquiry>> {
        let sql = format!("SELECT {} FROM donation_inquiries WHERE id = ?", DONATION_COLUMNS);
        let mut found = None;
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                if let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(pool).await? {
                    found = Some(row_to_donation!(row));
                }
            }
            Backend::Mysql(pool) => {
                if let Some(row) = sqlx::query(&sql).bind(id).fetch_optional(pool).await? {
                    found = Some(row_to_donation!(row));
                }
            }
        }
        Ok(found)
    }

    async fn list(&self) -> Result<Vec<DonationInquiry>> {
        let sql = format!(
            "SELECT {} FROM donation_inquiries ORDER BY created_at DESC, id DESC",
            DONATION_COLUMNS
        );
        let mut donations = Vec::new();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                for row in sqlx::query(&sql).fetch_all(pool).await? {
                    donations.push(row_to_donation!(row));
                }
            }
            Backend::Mysql(pool) => {
                for row in sqlx::query(&sql).fetch_all(pool).await? {
                    donations.push(row_to_donation!(row));
                }
            }
        }
        Ok(donations)
    }

    async fn set_status(
        &self,
        id: i64,
        status: DonationStatus,
    ) -> Result<Option<DonationInquiry>> {
        let sql = "UPDATE donation_inquiries SET status = ? WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(status.as_str())
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update donation status")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(status.as_str())
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update donation status")?
                .rows_affected(),
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn count_with_status(&self, status: DonationStatus) -> Result<i64> {
        let sql = "SELECT COUNT(*) as count FROM donation_inquiries WHERE status = ?";
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxDonationRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxDonationRepository::new(pool)
    }

    fn input() -> CreateDonationInput {
        CreateDonationInput {
            full_name: "Jordan".to_string(),
            email: "jordan@example.com".to_string(),
            phone: None,
            amount: Money::from_major(250.0),
            currency: None,
            message: Some("For the rural clinic".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_and_count_new() {
        let repo = setup_test_repo().await;
        let donation = repo.create(&input(), "USD").await.unwrap();

        assert_eq!(donation.status, DonationStatus::New);
        assert_eq!(donation.amount, Some(Money::from_cents(25_000)));
        assert_eq!(repo.count_with_status(DonationStatus::New).await.unwrap(), 1);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_set_status() {
        let repo = setup_test_repo().await;
        let donation = repo.create(&input(), "GHS").await.unwrap();

        let updated = repo
            .set_status(donation.id, DonationStatus::Contacted)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, DonationStatus::Contacted);
        assert_eq!(updated.currency, "GHS");
        assert_eq!(repo.count_with_status(DonationStatus::New).await.unwrap(), 0);
        assert!(repo.set_status(42, DonationStatus::Closed).await.unwrap().is_none());
    }
}
