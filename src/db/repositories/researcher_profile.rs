//! Researcher profile repository
//!
//! Profiles are keyed by user id and created lazily: the first save or
//! rating inserts the row.

use crate::db::{Backend, DynDatabasePool};
use crate::models::ResearcherProfile;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::sync::Arc;

#[async_trait]
pub trait ResearcherProfileRepository: Send + Sync {
    async fn get(&self, user_id: i64) -> Result<Option<ResearcherProfile>>;

    async fn list(&self) -> Result<Vec<ResearcherProfile>>;

    /// Insert or replace the editable fields; ratings are left alone
    async fn upsert(&self, profile: &ResearcherProfile) -> Result<ResearcherProfile>;

    /// Fold a 1..=5 rating into the running average
    async fn add_rating(&self, user_id: i64, rating: u8) -> Result<ResearcherProfile>;
}

pub struct SqlxResearcherProfileRepository {
    pool: DynDatabasePool,
}

impl SqlxResearcherProfileRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ResearcherProfileRepository> {
        Arc::new(Self::new(pool))
    }

    async fn get_required(&self, user_id: i64) -> Result<ResearcherProfile> {
        self.get(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Researcher profile {} missing after write", user_id))
    }
}

#[async_trait]
impl ResearcherProfileRepository for SqlxResearcherProfileRepository {
    async fn get(&self, user_id: i64) -> Result<Option<ResearcherProfile>> {
        let sql = format!("SELECT {} FROM researcher_profiles WHERE user_id = ?", PROFILE_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get researcher profile")?;
                Ok(row.map(|row| row_to_profile_sqlite(&row)))
            }
            Backend::Mysql(pool) => {
                let row = sqlx::query(&sql)
                    .bind(user_id)
                    .fetch_optional(pool)
                    .await
                    .context("Failed to get researcher profile")?;
                Ok(row.map(|row| row_to_profile_mysql(&row)))
            }
        }
    }

    async fn list(&self) -> Result<Vec<ResearcherProfile>> {
        let sql = format!("SELECT {} FROM researcher_profiles ORDER BY user_id", PROFILE_COLUMNS);
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list researcher profiles")?;
                Ok(rows.iter().map(row_to_profile_sqlite).collect())
            }
            Backend::Mysql(pool) => {
                let rows = sqlx::query(&sql)
                    .fetch_all(pool)
                    .await
                    .context("Failed to list researcher profiles")?;
                Ok(rows.iter().map(row_to_profile_mysql).collect())
            }
        }
    }

    async fn upsert(&self, profile: &ResearcherProfile) -> Result<ResearcherProfile> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => upsert_profile_sqlite(pool, profile).await?,
            Backend::Mysql(pool) => upsert_profile_mysql(pool, profile).await?,
        }
        self.get_required(profile.user_id).await
    }

    async fn add_rating(&self, user_id: i64, rating: u8) -> Result<ResearcherProfile> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => add_rating_sqlite(pool, user_id, rating).await?,
            Backend::Mysql(pool) => add_rating_mysql(pool, user_id, rating).await?,
        }
        self.get_required(user_id).await
    }
}

const PROFILE_COLUMNS: &str = "user_id, specialization, years_of_experience, bio, photo_url, \
     average_rating, total_ratings, updated_at";

const RATE_PROFILE: &str = r#"
    UPDATE researcher_profiles
    SET average_rating = (average_rating * total_ratings + ?) / (total_ratings + 1),
        total_ratings = total_ratings + 1
    WHERE user_id = ?
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn upsert_profile_sqlite(pool: &SqlitePool, profile: &ResearcherProfile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO researcher_profiles
            (user_id, specialization, years_of_experience, bio, photo_url, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            specialization = excluded.specialization,
            years_of_experience = excluded.years_of_experience,
            bio = excluded.bio,
            photo_url = excluded.photo_url,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(profile.user_id)
    .bind(&profile.specialization)
    .bind(profile.years_of_experience)
    .bind(&profile.bio)
    .bind(&profile.photo_url)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to save researcher profile")?;
    Ok(())
}

async fn add_rating_sqlite(pool: &SqlitePool, user_id: i64, rating: u8) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("INSERT OR IGNORE INTO researcher_profiles (user_id, updated_at) VALUES (?, ?)")
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("Failed to create researcher profile")?;
    sqlx::query(RATE_PROFILE)
        .bind(rating as f64)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to rate researcher")?;
    tx.commit().await?;
    Ok(())
}

fn row_to_profile_sqlite(row: &sqlx::sqlite::SqliteRow) -> ResearcherProfile {
    ResearcherProfile {
        user_id: row.get("user_id"),
        specialization: row.get("specialization"),
        years_of_experience: row.get("years_of_experience"),
        bio: row.get("bio"),
        photo_url: row.get("photo_url"),
        average_rating: row.get("average_rating"),
        total_ratings: row.get("total_ratings"),
        updated_at: row.get("updated_at"),
    }
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn upsert_profile_mysql(pool: &MySqlPool, profile: &ResearcherProfile) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO researcher_profiles
            (user_id, specialization, years_of_experience, bio, photo_url, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            specialization = VALUES(specialization),
            years_of_experience = VALUES(years_of_experience),
            bio = VALUES(bio),
            photo_url = VALUES(photo_url),
            updated_at = VALUES(updated_at)
        "#,
    )
    .bind(profile.user_id)
    .bind(&profile.specialization)
    .bind(profile.years_of_experience)
    .bind(&profile.bio)
    .bind(&profile.photo_url)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to save researcher profile")?;
    Ok(())
}

async fn add_rating_mysql(pool: &MySqlPool, user_id: i64, rating: u8) -> Result<()> {
    let mut tx = pool.begin().await?;
    sqlx::query("INSERT IGNORE INTO researcher_profiles (user_id, updated_at) VALUES (?, ?)")
        .bind(user_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .context("Failed to create researcher profile")?;
    sqlx::query(RATE_PROFILE)
        .bind(rating as f64)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .context("Failed to rate researcher")?;
    tx.commit().await?;
    Ok(())
}

fn row_to_profile_mysql(row: &sqlx::mysql::MySqlRow) -> ResearcherProfile {
    ResearcherProfile {
        user_id: row.get("user_id"),
        specialization: row.get("specialization"),
        years_of_experience: row.get("years_of_experience"),
        bio: row.get("bio"),
        photo_url: row.get("photo_url"),
        average_rating: row.get("average_rating"),
        total_ratings: row.get("total_ratings"),
        updated_at: row.get("updated_at"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxResearcherProfileRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute(
            "INSERT INTO users (id, email, full_name, password_hash, role) VALUES (1, 'c@example.com', 'Dr. C', 'hash', 'consultant')",
        )
        .await
        .expect("Failed to create test user");
        SqlxResearcherProfileRepository::new(pool)
    }

    #[tokio::test]
    async fn test_upsert_inserts_then_updates() {
        let repo = setup_test_repo().await;
        assert!(repo.get(1).await.unwrap().is_none());

        let mut profile = ResearcherProfile::empty(1);
        profile.specialization = Some("Cardiology".to_string());
        profile.years_of_experience = 12;
        let saved = repo.upsert(&profile).await.unwrap();
        assert_eq!(saved.specialization.as_deref(), Some("Cardiology"));

        profile.bio = Some("Heart doctor".to_string());
        let saved = repo.upsert(&profile).await.unwrap();
        assert_eq!(saved.bio.as_deref(), Some("Heart doctor"));
        assert_eq!(saved.years_of_experience, 12);
        assert_eq!(repo.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_add_rating_running_average() {
        let repo = setup_test_repo().await;

        let profile = repo.add_rating(1, 5).await.unwrap();
        assert_eq!(profile.total_ratings, 1);
        assert!((profile.average_rating - 5.0).abs() < 1e-9);

        let profile = repo.add_rating(1, 2).await.unwrap();
        assert_eq!(profile.total_ratings, 2);
        assert!((profile.average_rating - 3.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_upsert_keeps_ratings() {
        let repo = setup_test_repo().await;
        repo.add_rating(1, 4).await.unwrap();

        let mut profile = ResearcherProfile::empty(1);
        profile.bio = Some("Updated".to_string());
        let saved = repo.upsert(&profile).await.unwrap();
        assert_eq!(saved.total_ratings, 1);
        assert!((saved.average_rating - 4.0).abs() < 1e-9);
    }
}
