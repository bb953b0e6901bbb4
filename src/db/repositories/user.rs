//! User repository
//!
//! Database operations for users.
//!
//! This module provides:
//! - `UserRepository` trait defining the interface for user data access
//! - `SqlxUserRepository` implementing the trait for SQLite and MySQL

use crate::db::{Backend, DynDatabasePool};
use crate::models::{User, UserRole, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Create a new user
    async fn create(&self, user: &User) -> Result<User>;

    /// Get user by ID
    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    /// Get user by email
    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Update every mutable column of a user
    async fn update(&self, user: &User) -> Result<User>;

    /// Delete a user; `false` if it did not exist
    async fn delete(&self, id: i64) -> Result<bool>;

    /// All users, newest first
    async fn list(&self) -> Result<Vec<User>>;

    /// Number of users per role
    async fn count_by_role(&self) -> Result<Vec<(UserRole, i64)>>;
}

/// SQLx-based user repository implementation
///
/// Supports both SQLite and MySQL databases.
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => create_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => create_user_mysql(pool, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_id_sqlite(pool, id).await,
            Backend::Mysql(pool) => get_user_by_id_mysql(pool, id).await,
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => get_user_by_email_sqlite(pool, email).await,
            Backend::Mysql(pool) => get_user_by_email_mysql(pool, email).await,
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => update_user_sqlite(pool, user).await,
            Backend::Mysql(pool) => update_user_mysql(pool, user).await,
        }
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => delete_user_sqlite(pool, id).await,
            Backend::Mysql(pool) => delete_user_mysql(pool, id).await,
        }
    }

    async fn list(&self) -> Result<Vec<User>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => list_users_sqlite(pool).await,
            Backend::Mysql(pool) => list_users_mysql(pool).await,
        }
    }

    async fn count_by_role(&self) -> Result<Vec<(UserRole, i64)>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => count_by_role_sqlite(pool).await,
            Backend::Mysql(pool) => count_by_role_mysql(pool).await,
        }
    }
}

const USER_COLUMNS: &str =
    "id, email, full_name, password_hash, role, status, phone, created_at, updated_at";

fn parse_role_and_status(role: &str, status: &str) -> Result<(UserRole, UserStatus)> {
    let role = UserRole::from_str(role)
        .with_context(|| format!("Invalid role in database: {}", role))?;
    let status = UserStatus::from_str(status)
        .with_context(|| format!("Invalid status in database: {}", status))?;
    Ok((role, status))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, full_name, password_hash, role, status, phone, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.status.as_str())
    .bind(&user.phone)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_sqlite(pool: &SqlitePool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.map(|row| row_to_user_sqlite(&row)).transpose()
}

async fn get_user_by_email_sqlite(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.map(|row| row_to_user_sqlite(&row)).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, full_name = ?, password_hash = ?, role = ?, status = ?, phone = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.status.as_str())
    .bind(&user.phone)
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    get_user_by_id_sqlite(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn delete_user_sqlite(pool: &SqlitePool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete user")?;

    Ok(result.rows_affected() > 0)
}

async fn list_users_sqlite(pool: &SqlitePool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list users")?;

    rows.iter().map(row_to_user_sqlite).collect()
}

async fn count_by_role_sqlite(pool: &SqlitePool) -> Result<Vec<(UserRole, i64)>> {
    let rows = sqlx::query("SELECT role, COUNT(*) as count FROM users GROUP BY role")
        .fetch_all(pool)
        .await
        .context("Failed to count users by role")?;

    rows.iter()
        .map(|row| {
            let role: String = row.get("role");
            Ok((UserRole::from_str(&role)?, row.get("count")))
        })
        .collect()
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let (role, status) = parse_role_and_status(row.get("role"), row.get("status"))?;

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        password_hash: row.get("password_hash"),
        role,
        status,
        phone: row.get("phone"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (email, full_name, password_hash, role, status, phone, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.status.as_str())
    .bind(&user.phone)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_id() as i64,
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_id_mysql(pool: &MySqlPool, id: i64) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by ID")?;

    row.map(|row| row_to_user_mysql(&row)).transpose()
}

async fn get_user_by_email_mysql(pool: &MySqlPool, email: &str) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS))
        .bind(email)
        .fetch_optional(pool)
        .await
        .context("Failed to get user by email")?;

    row.map(|row| row_to_user_mysql(&row)).transpose()
}

async fn update_user_mysql(pool: &MySqlPool, user: &User) -> Result<User> {
    sqlx::query(
        r#"
        UPDATE users
        SET email = ?, full_name = ?, password_hash = ?, role = ?, status = ?, phone = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.email)
    .bind(&user.full_name)
    .bind(&user.password_hash)
    .bind(user.role.as_str())
    .bind(user.status.as_str())
    .bind(&user.phone)
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    get_user_by_id_mysql(pool, user.id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("User not found after update"))
}

async fn delete_user_mysql(pool: &MySqlPool, id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to delete user")?;

    Ok(result.rows_affected() > 0)
}

async fn list_users_mysql(pool: &MySqlPool) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
        USER_COLUMNS
    ))
    .fetch_all(pool)
    .await
    .context("Failed to list users")?;

    rows.iter().map(row_to_user_mysql).collect()
}

async fn count_by_role_mysql(pool: &MySqlPool) -> Result<Vec<(UserRole, i64)>> {
    let rows = sqlx::query("SELECT role, COUNT(*) as count FROM users GROUP BY role")
        .fetch_all(pool)
        .await
        .context("Failed to count users by role")?;

    rows.iter()
        .map(|row| {
            let role: String = row.get("role");
            Ok((UserRole::from_str(&role)?, row.get("count")))
        })
        .collect()
}

fn row_to_user_mysql(row: &sqlx::mysql::MySqlRow) -> Result<User> {
    let (role, status) = parse_role_and_status(row.get("role"), row.get("status"))?;

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        full_name: row.get("full_name"),
        password_hash: row.get("password_hash"),
        role,
        status,
        phone: row.get("phone"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxUserRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxUserRepository::new(pool)
    }

    fn test_user(email: &str, role: UserRole) -> User {
        User::new(email.to_string(), "Test User".to_string(), "hash".to_string(), role)
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = setup_test_repo().await;

        let mut user = test_user("client@example.com", UserRole::Client);
        user.phone = Some("+100".to_string());
        let created = repo.create(&user).await.expect("Failed to create user");

        assert!(created.id > 0);
        let found = repo.get_by_id(created.id).await.unwrap().expect("User should exist");
        assert_eq!(found.email, "client@example.com");
        assert_eq!(found.role, UserRole::Client);
        assert_eq!(found.status, UserStatus::Active);
        assert_eq!(found.phone.as_deref(), Some("+100"));

        let by_email = repo.get_by_email("client@example.com").await.unwrap();
        assert_eq!(by_email.map(|u| u.id), Some(created.id));
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("dup@example.com", UserRole::Client)).await.unwrap();
        assert!(repo.create(&test_user("dup@example.com", UserRole::Admin)).await.is_err());
    }

    #[tokio::test]
    async fn test_update_user() {
        let repo = setup_test_repo().await;
        let mut user = repo.create(&test_user("u@example.com", UserRole::Client)).await.unwrap();

        user.status = UserStatus::Suspended;
        user.role = UserRole::Consultant;
        user.full_name = "Dr. Updated".to_string();
        let updated = repo.update(&user).await.unwrap();

        assert_eq!(updated.status, UserStatus::Suspended);
        assert_eq!(updated.role, UserRole::Consultant);
        assert_eq!(updated.full_name, "Dr. Updated");
    }

    #[tokio::test]
    async fn test_delete_user() {
        let repo = setup_test_repo().await;
        let user = repo.create(&test_user("gone@example.com", UserRole::Client)).await.unwrap();

        assert!(repo.delete(user.id).await.unwrap());
        assert!(!repo.delete(user.id).await.unwrap());
        assert!(repo.get_by_id(user.id).await.unwrap().is_none());
        assert!(repo.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_count_by_role() {
        let repo = setup_test_repo().await;
        repo.create(&test_user("a@example.com", UserRole::Client)).await.unwrap();
        repo.create(&test_user("b@example.com", UserRole::Client)).await.unwrap();
        repo.create(&test_user("c@example.com", UserRole::Admin)).await.unwrap();

        let counts = repo.count_by_role().await.unwrap();
        let clients = counts.iter().find(|(r, _)| *r == UserRole::Client).map(|(_, c)| *c);
        let admins = counts.iter().find(|(r, _)| *r == UserRole::Admin).map(|(_, c)| *c);
        assert_eq!(clients, Some(2));
        assert_eq!(admins, Some(1));
    }
}
