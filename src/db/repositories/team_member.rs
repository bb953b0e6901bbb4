//! Team member repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{TeamMember, TeamMemberInput};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use std::sync::Arc;

#[async_trait]
pub trait TeamMemberRepository: Send + Sync {
    async fn create(&self, input: &TeamMemberInput) -> Result<TeamMember>;

    async fn get_by_id(&self, id: i64) -> Result<Option<TeamMember>>;

    /// Members in display order; inactive ones only when `include_inactive`
    async fn list(&self, include_inactive: bool) -> Result<Vec<TeamMember>>;

    /// Replace every field; `None` if the member does not exist
    async fn update(&self, id: i64, input: &TeamMemberInput) -> Result<Option<TeamMember>>;

    async fn delete(&self, id: i64) -> Result<bool>;
}

pub struct SqlxTeamMemberRepository {
    pool: DynDatabasePool,
}

impl SqlxTeamMemberRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TeamMemberRepository> {
        Arc::new(Self::new(pool))
    }
}

const MEMBER_COLUMNS: &str = "id, name, position, bio, photo_url, email, linkedin_url, \
     display_order, is_active, created_at, updated_at";

macro_rules! row_to_member {
    ($row:expr) => {
        TeamMember {
            id: $row.get("id"),
            name: $row.get("name"),
            position: $row.get("position"),
            bio: $row.get("bio"),
            photo_url: $row.get("photo_url"),
            email: $row.get("email"),
            linkedin_url: $row.get("linkedin_url"),
            display_order: $row.get("display_order"),
            is_active: $row.get("is_active"),
            created_at: $row.get("created_at"),
            updated_at: $row.get("updated_at"),
        }
    };
}

#[async_trait]
impl TeamMemberRepository for SqlxTeamMemberRepository {
    async fn create(&self, input: &TeamMemberInput) -> Result<TeamMember> {
        let sql = r#"
            INSERT INTO team_members
                (name, position, bio, photo_url, email, linkedin_url, display_order, is_active, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;
        let now = Utc::now();
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&input.name)
                .bind(&input.position)
                .bind(&input.bio)
                .bind(&input.photo_url)
                .bind(&input.email)
                .bind(&input.linkedin_url)
                .bind(input.display_order)
                .bind(input.is_active)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create team member")?
                .last_insert_rowid(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&input.name)
                .bind(&input.position)
                .bind(&input.bio)
                .bind(&input.photo_url)
                .bind(&input.email)
                .bind(&input.linkedin_url)
                .bind(input.display_order)
                .bind(input.is_active)
                .bind(now)
                .bind(now)
                .execute(pool)
                .await
                .context("Failed to create team member")?
                .last_insert_id() as i64,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Team member not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<TeamMember>> {
        let sql = format!("SELECT {} FROM team_members WHERE id = ?", MEMBER_COLUMNS);
        let member = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get team member")?
                .map(|row| row_to_member!(row)),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .bind(id)
                .fetch_optional(pool)
                .await
                .context("Failed to get team member")?
                .map(|row| row_to_member!(row)),
        };
        Ok(member)
    }

    async fn list(&self, include_inactive: bool) -> Result<Vec<TeamMember>> {
        let filter = if include_inactive { "" } else { "WHERE is_active = TRUE" };
        let sql = format!(
            "SELECT {} FROM team_members {} ORDER BY display_order ASC, id ASC",
            MEMBER_COLUMNS, filter
        );
        let members = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list team members")?
                .iter()
                .map(|row| row_to_member!(row))
                .collect(),
            Backend::Mysql(pool) => sqlx::query(&sql)
                .fetch_all(pool)
                .await
                .context("Failed to list team members")?
                .iter()
                .map(|row| row_to_member!(row))
                .collect(),
        };
        Ok(members)
    }

    async fn update(&self, id: i64, input: &TeamMemberInput) -> Result<Option<TeamMember>> {
        let sql = r#"
            UPDATE team_members
            SET name = ?, position = ?, bio = ?, photo_url = ?, email = ?, linkedin_url = ?,
                display_order = ?, is_active = ?, updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(&input.name)
                .bind(&input.position)
                .bind(&input.bio)
                .bind(&input.photo_url)
                .bind(&input.email)
                .bind(&input.linkedin_url)
                .bind(input.display_order)
                .bind(input.is_active)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update team member")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(&input.name)
                .bind(&input.position)
                .bind(&input.bio)
                .bind(&input.photo_url)
                .bind(&input.email)
                .bind(&input.linkedin_url)
                .bind(input.display_order)
                .bind(input.is_active)
                .bind(now)
                .bind(id)
                .execute(pool)
                .await
                .context("Failed to update team member")?
                .rows_affected(),
        };
        if affected == 0 {
            return Ok(None);
        }
        self.get_by_id(id).await
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let sql = "DELETE FROM team_members WHERE id = ?";
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
        };
        Ok(affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxTeamMemberRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxTeamMemberRepository::new(pool)
    }

    fn input(name: &str, order: i32, active: bool) -> TeamMemberInput {
        TeamMemberInput {
            name: name.to_string(),
            position: "Consultant".to_string(),
            bio: None,
            photo_url: None,
            email: None,
            linkedin_url: None,
            display_order: order,
            is_active: active,
        }
    }

    #[tokio::test]
    async fn test_list_orders_and_filters() {
        let repo = setup_test_repo().await;
        repo.create(&input("Second", 2, true)).await.unwrap();
        repo.create(&input("First", 1, true)).await.unwrap();
        repo.create(&input("Hidden", 0, false)).await.unwrap();

        let public = repo.list(false).await.unwrap();
        let names: Vec<_> = public.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);

        assert_eq!(repo.list(true).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let repo = setup_test_repo().await;
        let member = repo.create(&input("Dr. A", 0, true)).await.unwrap();

        let mut changed = input("Dr. A", 5, false);
        changed.position = "Director".to_string();
        let updated = repo.update(member.id, &changed).await.unwrap().unwrap();
        assert_eq!(updated.position, "Director");
        assert!(!updated.is_active);
        assert!(repo.update(999, &changed).await.unwrap().is_none());

        assert!(repo.delete(member.id).await.unwrap());
        assert!(repo.get_by_id(member.id).await.unwrap().is_none());
    }
}
