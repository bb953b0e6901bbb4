//! Research paper repository

use crate::db::{Backend, DynDatabasePool};
use crate::models::{ResearchPaper, ResearchStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{MySqlPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

#[async_trait]
pub trait ResearchRepository: Send + Sync {
    async fn create(&self, paper: &ResearchPaper) -> Result<ResearchPaper>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ResearchPaper>>;

    /// Every paper, newest first
    async fn list(&self) -> Result<Vec<ResearchPaper>>;

    async fn list_by_researcher(&self, researcher_id: i64) -> Result<Vec<ResearchPaper>>;

    async fn list_by_status(&self, status: ResearchStatus) -> Result<Vec<ResearchPaper>>;

    /// Save title, summary, content, category and pdf_url
    async fn update_content(&self, paper: &ResearchPaper) -> Result<ResearchPaper>;

    /// Move a paper from `from` to `to` if it is still in `from`.
    ///
    /// `rejection_reason` replaces the stored reason (clearing it when
    /// `None`); `published_at` is only written when given.
    async fn set_status(
        &self,
        id: i64,
        from: ResearchStatus,
        to: ResearchStatus,
        rejection_reason: Option<&str>,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<bool>;

    async fn increment_views(&self, id: i64) -> Result<()>;

    /// Returns `false` when the paper does not exist
    async fn increment_likes(&self, id: i64) -> Result<bool>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count_by_status(&self) -> Result<Vec<(ResearchStatus, i64)>>;
}

pub struct SqlxResearchRepository {
    pool: DynDatabasePool,
}

impl SqlxResearchRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ResearchRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_all(&self, sql: &str, bind: Option<Bind<'_>>) -> Result<Vec<ResearchPaper>> {
        match self.pool.backend() {
            Backend::Sqlite(pool) => fetch_papers_sqlite(pool, sql, bind).await,
            Backend::Mysql(pool) => fetch_papers_mysql(pool, sql, bind).await,
        }
    }

    async fn execute(&self, sql: &str, id: i64) -> Result<u64> {
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql).bind(id).execute(pool).await?.rows_affected(),
        };
        Ok(affected)
    }
}

/// Single filter parameter for list queries
#[derive(Debug, Clone, Copy)]
enum Bind<'a> {
    Id(i64),
    Text(&'a str),
}

#[async_trait]
impl ResearchRepository for SqlxResearchRepository {
    async fn create(&self, paper: &ResearchPaper) -> Result<ResearchPaper> {
        let id = match self.pool.backend() {
            Backend::Sqlite(pool) => create_paper_sqlite(pool, paper).await?,
            Backend::Mysql(pool) => create_paper_mysql(pool, paper).await?,
        };
        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Research paper not found after insert"))
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ResearchPaper>> {
        let sql = format!("{} WHERE p.id = ?", SELECT_PAPER);
        Ok(self.fetch_all(&sql, Some(Bind::Id(id))).await?.into_iter().next())
    }

    async fn list(&self) -> Result<Vec<ResearchPaper>> {
        let sql = format!("{} ORDER BY p.created_at DESC, p.id DESC", SELECT_PAPER);
        self.fetch_all(&sql, None).await
    }

    async fn list_by_researcher(&self, researcher_id: i64) -> Result<Vec<ResearchPaper>> {
        let sql = format!(
            "{} WHERE p.researcher_id = ? ORDER BY p.created_at DESC, p.id DESC",
            SELECT_PAPER
        );
        self.fetch_all(&sql, Some(Bind::Id(researcher_id))).await
    }

    async fn list_by_status(&self, status: ResearchStatus) -> Result<Vec<ResearchPaper>> {
        let sql = format!(
            "{} WHERE p.status = ? ORDER BY p.created_at DESC, p.id DESC",
            SELECT_PAPER
        );
        self.fetch_all(&sql, Some(Bind::Text(status.as_str()))).await
    }

    async fn update_content(&self, paper: &ResearchPaper) -> Result<ResearchPaper> {
        let sql = r#"
            UPDATE research_papers
            SET title = ?, summary = ?, content = ?, category = ?, pdf_url = ?, updated_at = ?
            WHERE id = ?
        "#;
        let now = Utc::now();
        match self.pool.backend() {
            Backend::Sqlite(pool) => {
                sqlx::query(sql)
                    .bind(&paper.title)
                    .bind(&paper.summary)
                    .bind(&paper.content)
                    .bind(&paper.category)
                    .bind(&paper.pdf_url)
                    .bind(now)
                    .bind(paper.id)
                    .execute(pool)
                    .await
                    .context("Failed to update research paper")?;
            }
            Backend::Mysql(pool) => {
                sqlx::query(sql)
                    .bind(&paper.title)
                    .bind(&paper.summary)
                    .bind(&paper.content)
                    .bind(&paper.category)
                    .bind(&paper.pdf_url)
                    .bind(now)
                    .bind(paper.id)
                    .execute(pool)
                    .await
                    .context("Failed to update research paper")?;
            }
        }
        self.get_by_id(paper.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Research paper not found after update"))
    }

    async fn set_status(
        &self,
        id: i64,
        from: ResearchStatus,
        to: ResearchStatus,
        rejection_reason: Option<&str>,
        published_at: Option<DateTime<Utc>>,
    ) -> Result<bool> {
        let sql = r#"
            UPDATE research_papers
            SET status = ?, rejection_reason = ?, published_at = COALESCE(?, published_at), updated_at = ?
            WHERE id = ? AND status = ?
        "#;
        let now = Utc::now();
        let affected = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .bind(to.as_str())
                .bind(rejection_reason)
                .bind(published_at)
                .bind(now)
                .bind(id)
                .bind(from.as_str())
                .execute(pool)
                .await
                .context("Failed to update research status")?
                .rows_affected(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .bind(to.as_str())
                .bind(rejection_reason)
                .bind(published_at)
                .bind(now)
                .bind(id)
                .bind(from.as_str())
                .execute(pool)
                .await
                .context("Failed to update research status")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn increment_views(&self, id: i64) -> Result<()> {
        self.execute("UPDATE research_papers SET views = views + 1 WHERE id = ?", id)
            .await
            .context("Failed to increment views")?;
        Ok(())
    }

    async fn increment_likes(&self, id: i64) -> Result<bool> {
        let affected = self
            .execute("UPDATE research_papers SET likes = likes + 1 WHERE id = ?", id)
            .await
            .context("Failed to increment likes")?;
        Ok(affected > 0)
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = self
            .execute("DELETE FROM research_papers WHERE id = ?", id)
            .await
            .context("Failed to delete research paper")?;
        Ok(affected > 0)
    }

    async fn count_by_status(&self) -> Result<Vec<(ResearchStatus, i64)>> {
        let sql = "SELECT status, COUNT(*) as count FROM research_papers GROUP BY status";
        let rows: Vec<(String, i64)> = match self.pool.backend() {
            Backend::Sqlite(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await?
                .iter()
                .map(|row| (row.get("status"), row.get("count")))
                .collect(),
            Backend::Mysql(pool) => sqlx::query(sql)
                .fetch_all(pool)
                .await?
                .iter()
                .map(|row| (row.get("status"), row.get("count")))
                .collect(),
        };
        rows.into_iter()
            .map(|(status, count)| Ok((ResearchStatus::from_str(&status)?, count)))
            .collect()
    }
}

const SELECT_PAPER: &str = r#"
    SELECT p.id, p.researcher_id, u.full_name AS researcher_name, p.title, p.summary, p.content,
           p.category, p.status, p.views, p.likes, p.rejection_reason, p.pdf_url,
           p.published_at, p.created_at, p.updated_at
    FROM research_papers p
    LEFT JOIN users u ON u.id = p.researcher_id
"#;

const INSERT_PAPER: &str = r#"
    INSERT INTO research_papers
        (researcher_id, title, summary, content, category, status, views, likes,
         rejection_reason, pdf_url, published_at, created_at, updated_at)
    VALUES (?, ?, ?, ?, ?, ?, 0, 0, NULL, ?, NULL, ?, ?)
"#;

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_paper_sqlite(pool: &SqlitePool, paper: &ResearchPaper) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_PAPER)
        .bind(paper.researcher_id)
        .bind(&paper.title)
        .bind(&paper.summary)
        .bind(&paper.content)
        .bind(&paper.category)
        .bind(paper.status.as_str())
        .bind(&paper.pdf_url)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create research paper")?;

    Ok(result.last_insert_rowid())
}

async fn fetch_papers_sqlite(
    pool: &SqlitePool,
    sql: &str,
    bind: Option<Bind<'_>>,
) -> Result<Vec<ResearchPaper>> {
    let query = sqlx::query(sql);
    let query = match bind {
        Some(Bind::Id(id)) => query.bind(id),
        Some(Bind::Text(text)) => query.bind(text),
        None => query,
    };
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to fetch research papers")?;
    rows.iter().map(row_to_paper_sqlite).collect()
}

fn row_to_paper_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ResearchPaper> {
    let status: String = row.get("status");
    Ok(ResearchPaper {
        id: row.get("id"),
        researcher_id: row.get("researcher_id"),
        researcher_name: row.get("researcher_name"),
        title: row.get("title"),
        summary: row.get("summary"),
        content: row.get("content"),
        category: row.get("category"),
        status: ResearchStatus::from_str(&status)?,
        views: row.get("views"),
        likes: row.get("likes"),
        rejection_reason: row.get("rejection_reason"),
        pdf_url: row.get("pdf_url"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// MySQL implementations
// ============================================================================

async fn create_paper_mysql(pool: &MySqlPool, paper: &ResearchPaper) -> Result<i64> {
    let now = Utc::now();
    let result = sqlx::query(INSERT_PAPER)
        .bind(paper.researcher_id)
        .bind(&paper.title)
        .bind(&paper.summary)
        .bind(&paper.content)
        .bind(&paper.category)
        .bind(paper.status.as_str())
        .bind(&paper.pdf_url)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await
        .context("Failed to create research paper")?;

    Ok(result.last_insert_id() as i64)
}

async fn fetch_papers_mysql(
    pool: &MySqlPool,
    sql: &str,
    bind: Option<Bind<'_>>,
) -> Result<Vec<ResearchPaper>> {
    let query = sqlx::query(sql);
    let query = match bind {
        Some(Bind::Id(id)) => query.bind(id),
        Some(Bind::Text(text)) => query.bind(text),
        None => query,
    };
    let rows = query
        .fetch_all(pool)
        .await
        .context("Failed to fetch research papers")?;
    rows.iter().map(row_to_paper_mysql).collect()
}

fn row_to_paper_mysql(row: &sqlx::mysql::MySqlRow) -> Result<ResearchPaper> {
    let status: String = row.get("status");
    Ok(ResearchPaper {
        id: row.get("id"),
        researcher_id: row.get("researcher_id"),
        researcher_name: row.get("researcher_name"),
        title: row.get("title"),
        summary: row.get("summary"),
        content: row.get("content"),
        category: row.get("category"),
        status: ResearchStatus::from_str(&status)?,
        views: row.get("views"),
        likes: row.get("likes"),
        rejection_reason: row.get("rejection_reason"),
        pdf_url: row.get("pdf_url"),
        published_at: row.get("published_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> SqlxResearchRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool.execute(
            "INSERT INTO users (id, email, full_name, password_hash, role) VALUES (1, 'r@example.com', 'Dr. Grey', 'hash', 'researcher')",
        )
        .await
        .expect("Failed to create test user");
        SqlxResearchRepository::new(pool)
    }

    fn draft(title: &str) -> ResearchPaper {
        let now = Utc::now();
        ResearchPaper {
            id: 0,
            researcher_id: 1,
            researcher_name: None,
            title: title.to_string(),
            summary: "Summary".to_string(),
            content: "Body".to_string(),
            category: "oncology".to_string(),
            status: ResearchStatus::Draft,
            views: 0,
            likes: 0,
            rejection_reason: None,
            pdf_url: None,
            published_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_create_and_list() {
        let repo = setup_test_repo().await;
        let created = repo.create(&draft("Paper A")).await.unwrap();

        assert_eq!(created.researcher_name.as_deref(), Some("Dr. Grey"));
        assert_eq!(created.status, ResearchStatus::Draft);
        assert_eq!(repo.list_by_researcher(1).await.unwrap().len(), 1);
        assert!(repo.list_by_status(ResearchStatus::Published).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_status_is_compare_and_set() {
        let repo = setup_test_repo().await;
        let paper = repo.create(&draft("Paper A")).await.unwrap();

        assert!(repo
            .set_status(paper.id, ResearchStatus::Draft, ResearchStatus::Pending, None, None)
            .await
            .unwrap());
        assert!(!repo
            .set_status(paper.id, ResearchStatus::Draft, ResearchStatus::Pending, None, None)
            .await
            .unwrap());

        let now = Utc::now();
        assert!(repo
            .set_status(paper.id, ResearchStatus::Pending, ResearchStatus::Published, None, Some(now))
            .await
            .unwrap());
        let published = repo.get_by_id(paper.id).await.unwrap().unwrap();
        assert_eq!(published.status, ResearchStatus::Published);
        assert!(published.published_at.is_some());
    }

    #[tokio::test]
    async fn test_rejection_reason_stored() {
        let repo = setup_test_repo().await;
        let paper = repo.create(&draft("Paper A")).await.unwrap();
        repo.set_status(paper.id, ResearchStatus::Draft, ResearchStatus::Pending, None, None)
            .await
            .unwrap();
        repo.set_status(
            paper.id,
            ResearchStatus::Pending,
            ResearchStatus::Draft,
            Some("Needs citations"),
            None,
        )
        .await
        .unwrap();

        let found = repo.get_by_id(paper.id).await.unwrap().unwrap();
        assert_eq!(found.status, ResearchStatus::Draft);
        assert_eq!(found.rejection_reason.as_deref(), Some("Needs citations"));
    }

    #[tokio::test]
    async fn test_counters() {
        let repo = setup_test_repo().await;
        let paper = repo.create(&draft("Paper A")).await.unwrap();

        repo.increment_views(paper.id).await.unwrap();
        repo.increment_views(paper.id).await.unwrap();
        assert!(repo.increment_likes(paper.id).await.unwrap());
        assert!(!repo.increment_likes(999).await.unwrap());

        let found = repo.get_by_id(paper.id).await.unwrap().unwrap();
        assert_eq!(found.views, 2);
        assert_eq!(found.likes, 1);
    }

    #[tokio::test]
    async fn test_update_content_and_delete() {
        let repo = setup_test_repo().await;
        let mut paper = repo.create(&draft("Paper A")).await.unwrap();

        paper.title = "Paper A, revised".to_string();
        paper.pdf_url = Some("/uploads/a.pdf".to_string());
        let updated = repo.update_content(&paper).await.unwrap();
        assert_eq!(updated.title, "Paper A, revised");
        assert_eq!(updated.pdf_url.as_deref(), Some("/uploads/a.pdf"));

        assert!(repo.delete(paper.id).await.unwrap());
        assert!(repo.get_by_id(paper.id).await.unwrap().is_none());
        assert!(repo.count_by_status().await.unwrap().is_empty());
    }
}
