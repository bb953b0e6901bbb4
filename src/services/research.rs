//! Research paper service
//!
//! Authors keep papers as drafts until they submit them; management then
//! publishes or sends them back. Every status move is a compare-and-set on
//! the paper's current status.

use crate::db::repositories::ResearchRepository;
use crate::models::{
    CreateResearchInput, ListQuery, PagedResult, ResearchPaper, ResearchStatus,
    UpdateResearchInput, User,
};
use crate::services::{listing, validate};
use anyhow::Context;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ResearchServiceError {
    #[error("Research paper not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ValidationError(String),

    /// The paper is not in the status the operation starts from
    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// Body of a management rejection
#[derive(Debug, Clone, Deserialize)]
pub struct RejectResearchInput {
    pub reason: String,
}

pub struct ResearchService {
    repo: Arc<dyn ResearchRepository>,
}

impl ResearchService {
    pub fn new(repo: Arc<dyn ResearchRepository>) -> Self {
        Self { repo }
    }

    /// Published papers, optionally narrowed to one category
    pub async fn list_published(
        &self,
        query: &ListQuery,
        category: Option<&str>,
    ) -> Result<PagedResult<ResearchPaper>, ResearchServiceError> {
        let mut papers = self
            .repo
            .list_by_status(ResearchStatus::Published)
            .await
            .context("Failed to list published research")?;

        if let Some(category) = category.map(str::trim).filter(|c| !c.is_empty()) {
            papers.retain(|p| p.category.eq_ignore_ascii_case(category));
        }
        Ok(listing::apply(papers, query))
    }

    /// A published paper; counts as a view
    pub async fn view_published(&self, id: i64) -> Result<ResearchPaper, ResearchServiceError> {
        let paper = self.load_published(id).await?;
        self.repo
            .increment_views(paper.id)
            .await
            .context("Failed to record view")?;
        self.load(id).await
    }

    pub async fn like(&self, id: i64) -> Result<ResearchPaper, ResearchServiceError> {
        let paper = self.load_published(id).await?;
        if !self
            .repo
            .increment_likes(paper.id)
            .await
            .context("Failed to record like")?
        {
            return Err(ResearchServiceError::NotFound);
        }
        self.load(id).await
    }

    /// The author's own papers in every status
    pub async fn list_own(
        &self,
        author: &User,
        query: &ListQuery,
    ) -> Result<PagedResult<ResearchPaper>, ResearchServiceError> {
        let papers = self
            .repo
            .list_by_researcher(author.id)
            .await
            .context("Failed to list own research")?;
        Ok(listing::apply(papers, query))
    }

    pub async fn create_draft(
        &self,
        author: &User,
        input: CreateResearchInput,
    ) -> Result<ResearchPaper, ResearchServiceError> {
        let now = Utc::now();
        let paper = ResearchPaper {
            id: 0,
            researcher_id: author.id,
            researcher_name: None,
            title: required(&input.title, "Title")?,
            summary: required(&input.summary, "Summary")?,
            content: required(&input.content, "Content")?,
            category: required(&input.category, "Category")?,
            status: ResearchStatus::Draft,
            views: 0,
            likes: 0,
            rejection_reason: None,
            pdf_url: validate::optional(input.pdf_url),
            published_at: None,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&paper)
            .await
            .context("Failed to create research paper")?;
        Ok(created)
    }

    pub async fn update_draft(
        &self,
        author: &User,
        id: i64,
        input: UpdateResearchInput,
    ) -> Result<ResearchPaper, ResearchServiceError> {
        let mut paper = self.load_editable(author, id).await?;

        if let Some(title) = input.title {
            paper.title = required(&title, "Title")?;
        }
        if let Some(summary) = input.summary {
            paper.summary = required(&summary, "Summary")?;
        }
        if let Some(content) = input.content {
            paper.content = required(&content, "Content")?;
        }
        if let Some(category) = input.category {
            paper.category = required(&category, "Category")?;
        }
        if input.pdf_url.is_some() {
            paper.pdf_url = validate::optional(input.pdf_url);
        }

        let updated = self
            .repo
            .update_content(&paper)
            .await
            .context("Failed to update research paper")?;
        Ok(updated)
    }

    pub async fn delete_draft(&self, author: &User, id: i64) -> Result<(), ResearchServiceError> {
        let paper = self.load_editable(author, id).await?;
        self.repo
            .delete(paper.id)
            .await
            .context("Failed to delete research paper")?;
        Ok(())
    }

    /// Draft to pending review
    pub async fn submit(&self, author: &User, id: i64) -> Result<ResearchPaper, ResearchServiceError> {
        let paper = self.load_own(author, id).await?;
        self.move_status(&paper, ResearchStatus::Draft, ResearchStatus::Pending, None)
            .await
    }

    /// Every paper, for the review queue
    pub async fn list_all(
        &self,
        query: &ListQuery,
    ) -> Result<PagedResult<ResearchPaper>, ResearchServiceError> {
        let papers = self.repo.list().await.context("Failed to list research")?;
        Ok(listing::apply(papers, query))
    }

    pub async fn approve(&self, reviewer: &User, id: i64) -> Result<ResearchPaper, ResearchServiceError> {
        let paper = self.load(id).await?;
        let published = self
            .move_status(&paper, ResearchStatus::Pending, ResearchStatus::Published, None)
            .await?;
        tracing::info!("Research paper {} published by user {}", id, reviewer.id);
        Ok(published)
    }

    /// Pending back to draft with a reason the author can read
    pub async fn reject(
        &self,
        reviewer: &User,
        id: i64,
        input: RejectResearchInput,
    ) -> Result<ResearchPaper, ResearchServiceError> {
        let reason = required(&input.reason, "Rejection reason")?;
        let paper = self.load(id).await?;
        let rejected = self
            .move_status(
                &paper,
                ResearchStatus::Pending,
                ResearchStatus::Draft,
                Some(&reason),
            )
            .await?;
        tracing::info!("Research paper {} returned to draft by user {}", id, reviewer.id);
        Ok(rejected)
    }

    pub async fn archive(&self, reviewer: &User, id: i64) -> Result<ResearchPaper, ResearchServiceError> {
        let paper = self.load(id).await?;
        let archived = self
            .move_status(&paper, ResearchStatus::Published, ResearchStatus::Archived, None)
            .await?;
        tracing::info!("Research paper {} archived by user {}", id, reviewer.id);
        Ok(archived)
    }

    async fn move_status(
        &self,
        paper: &ResearchPaper,
        from: ResearchStatus,
        to: ResearchStatus,
        reason: Option<&str>,
    ) -> Result<ResearchPaper, ResearchServiceError> {
        if paper.status != from {
            return Err(ResearchServiceError::Conflict(format!(
                "Paper is {}, expected {}",
                paper.status, from
            )));
        }

        let published_at = (to == ResearchStatus::Published).then(Utc::now);
        let moved = self
            .repo
            .set_status(paper.id, from, to, reason, published_at)
            .await
            .context("Failed to update research status")?;
        if !moved {
            return Err(ResearchServiceError::Conflict(
                "Paper was changed by someone else".to_string(),
            ));
        }
        self.load(paper.id).await
    }

    async fn load(&self, id: i64) -> Result<ResearchPaper, ResearchServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to load research paper")?
            .ok_or(ResearchServiceError::NotFound)
    }

    /// Unpublished papers are invisible to the public
    async fn load_published(&self, id: i64) -> Result<ResearchPaper, ResearchServiceError> {
        let paper = self.load(id).await?;
        if paper.status != ResearchStatus::Published {
            return Err(ResearchServiceError::NotFound);
        }
        Ok(paper)
    }

    async fn load_own(&self, author: &User, id: i64) -> Result<ResearchPaper, ResearchServiceError> {
        let paper = self.load(id).await?;
        if paper.researcher_id != author.id {
            return Err(ResearchServiceError::Forbidden(
                "You can only manage your own research".to_string(),
            ));
        }
        Ok(paper)
    }

    async fn load_editable(
        &self,
        author: &User,
        id: i64,
    ) -> Result<ResearchPaper, ResearchServiceError> {
        let paper = self.load_own(author, id).await?;
        if !paper.status.is_editable() {
            return Err(ResearchServiceError::Conflict(format!(
                "Only drafts can be changed; this paper is {}",
                paper.status
            )));
        }
        Ok(paper)
    }
}

fn required(value: &str, field: &str) -> Result<String, ResearchServiceError> {
    validate::required(value, field).map_err(ResearchServiceError::ValidationError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxResearchRepository, SqlxUserRepository, UserRepository};
    use crate::db::{create_test_pool, migrations};
    use crate::models::UserRole;

    struct Fixture {
        service: ResearchService,
        author: User,
        other: User,
        manager: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let users = SqlxUserRepository::new(pool.clone());

        let author = make_user(&users, "ama@example.com", "Dr. Ama", UserRole::Researcher).await;
        let other = make_user(&users, "kofi@example.com", "Dr. Kofi", UserRole::Consultant).await;
        let manager = make_user(&users, "boss@example.com", "Boss", UserRole::Management).await;

        Fixture {
            service: ResearchService::new(SqlxResearchRepository::boxed(pool)),
            author,
            other,
            manager,
        }
    }

    async fn make_user(users: &SqlxUserRepository, email: &str, name: &str, role: UserRole) -> User {
        users
            .create(&User::new(email.to_string(), name.to_string(), "hash".to_string(), role))
            .await
            .unwrap()
    }

    fn draft(title: &str, category: &str) -> CreateResearchInput {
        CreateResearchInput {
            title: title.to_string(),
            summary: "Short summary".to_string(),
            content: "Body".to_string(),
            category: category.to_string(),
            pdf_url: None,
        }
    }

    #[tokio::test]
    async fn test_draft_is_private_until_published() {
        let f = setup().await;
        let paper = f
            .service
            .create_draft(&f.author, draft("Malaria trends", "Epidemiology"))
            .await
            .unwrap();
        assert_eq!(paper.status, ResearchStatus::Draft);
        assert_eq!(paper.researcher_name.as_deref(), Some("Dr. Ama"));

        assert!(matches!(
            f.service.view_published(paper.id).await,
            Err(ResearchServiceError::NotFound)
        ));
        let public = f
            .service
            .list_published(&ListQuery::default(), None)
            .await
            .unwrap();
        assert_eq!(public.total, 0);
    }

    #[tokio::test]
    async fn test_review_cycle() {
        let f = setup().await;
        let id = f
            .service
            .create_draft(&f.author, draft("Malaria trends", "Epidemiology"))
            .await
            .unwrap()
            .id;

        let pending = f.service.submit(&f.author, id).await.unwrap();
        assert_eq!(pending.status, ResearchStatus::Pending);

        let rejected = f
            .service
            .reject(
                &f.manager,
                id,
                RejectResearchInput {
                    reason: "Needs citations".to_string(),
                },
            )
            .await
            .unwrap();
        assert_eq!(rejected.status, ResearchStatus::Draft);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("Needs citations"));

        f.service.submit(&f.author, id).await.unwrap();
        let published = f.service.approve(&f.manager, id).await.unwrap();
        assert_eq!(published.status, ResearchStatus::Published);
        assert!(published.published_at.is_some());
        assert!(published.rejection_reason.is_none());

        let archived = f.service.archive(&f.manager, id).await.unwrap();
        assert_eq!(archived.status, ResearchStatus::Archived);
    }

    #[tokio::test]
    async fn test_wrong_starting_status_is_conflict() {
        let f = setup().await;
        let id = f
            .service
            .create_draft(&f.author, draft("Draft", "General"))
            .await
            .unwrap()
            .id;

        assert!(matches!(
            f.service.approve(&f.manager, id).await,
            Err(ResearchServiceError::Conflict(_))
        ));
        assert!(matches!(
            f.service.archive(&f.manager, id).await,
            Err(ResearchServiceError::Conflict(_))
        ));
        let blank = RejectResearchInput {
            reason: "  ".to_string(),
        };
        assert!(matches!(
            f.service.reject(&f.manager, id, blank).await,
            Err(ResearchServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_only_owner_edits_drafts() {
        let f = setup().await;
        let id = f
            .service
            .create_draft(&f.author, draft("Original", "General"))
            .await
            .unwrap()
            .id;

        let update = UpdateResearchInput {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update_draft(&f.other, id, update.clone()).await,
            Err(ResearchServiceError::Forbidden(_))
        ));
        let updated = f.service.update_draft(&f.author, id, update.clone()).await.unwrap();
        assert_eq!(updated.title, "Renamed");
        assert_eq!(updated.summary, "Short summary");

        f.service.submit(&f.author, id).await.unwrap();
        assert!(matches!(
            f.service.update_draft(&f.author, id, update).await,
            Err(ResearchServiceError::Conflict(_))
        ));
        assert!(matches!(
            f.service.delete_draft(&f.author, id).await,
            Err(ResearchServiceError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_views_likes_and_category_filter() {
        let f = setup().await;
        for (title, category) in [("A", "Cardiology"), ("B", "Oncology"), ("C", "cardiology")] {
            let id = f
                .service
                .create_draft(&f.author, draft(title, category))
                .await
                .unwrap()
                .id;
            f.service.submit(&f.author, id).await.unwrap();
            f.service.approve(&f.manager, id).await.unwrap();
        }

        let cardio = f
            .service
            .list_published(&ListQuery::default(), Some("Cardiology"))
            .await
            .unwrap();
        assert_eq!(cardio.total, 2);

        let id = cardio.items[0].id;
        assert_eq!(f.service.view_published(id).await.unwrap().views, 1);
        assert_eq!(f.service.view_published(id).await.unwrap().views, 2);
        assert_eq!(f.service.like(id).await.unwrap().likes, 1);
    }

    #[tokio::test]
    async fn test_list_own_and_delete() {
        let f = setup().await;
        let mine = f
            .service
            .create_draft(&f.author, draft("Mine", "General"))
            .await
            .unwrap();
        f.service
            .create_draft(&f.other, draft("Theirs", "General"))
            .await
            .unwrap();

        let own = f.service.list_own(&f.author, &ListQuery::default()).await.unwrap();
        assert_eq!(own.total, 1);
        assert_eq!(own.items[0].title, "Mine");

        assert_eq!(
            f.service.list_all(&ListQuery::default()).await.unwrap().total,
            2
        );

        f.service.delete_draft(&f.author, mine.id).await.unwrap();
        assert_eq!(
            f.service.list_own(&f.author, &ListQuery::default()).await.unwrap().total,
            0
        );
    }
}
