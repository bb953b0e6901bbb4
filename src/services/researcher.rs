//! Researcher profile service
//!
//! Joins consultant and researcher accounts with their profile row and
//! published-paper count. The public directory is cached.

use crate::cache::{keys, SharedCache};
use crate::db::repositories::{ResearchRepository, ResearcherProfileRepository, UserRepository};
use crate::models::{
    ListQuery, PagedResult, ResearchStatus, Researcher, ResearcherProfile,
    UpdateResearcherProfileInput, User,
};
use crate::services::{listing, validate};
use anyhow::Context;
use std::collections::HashMap;
use std::sync::Arc;

const MAX_YEARS_OF_EXPERIENCE: i32 = 80;

#[derive(Debug, thiserror::Error)]
pub enum ResearcherServiceError {
    #[error("Researcher not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct ResearcherService {
    users: Arc<dyn UserRepository>,
    profiles: Arc<dyn ResearcherProfileRepository>,
    research: Arc<dyn ResearchRepository>,
    cache: SharedCache,
}

impl ResearcherService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        profiles: Arc<dyn ResearcherProfileRepository>,
        research: Arc<dyn ResearchRepository>,
        cache: SharedCache,
    ) -> Self {
        Self {
            users,
            profiles,
            research,
            cache,
        }
    }

    /// Active researchers, served from cache when warm
    pub async fn list_public(
        &self,
        query: &ListQuery,
    ) -> Result<PagedResult<Researcher>, ResearcherServiceError> {
        let researchers = match self.cache.get::<Vec<Researcher>>(keys::RESEARCHERS_PUBLIC).await {
            Some(cached) => cached,
            None => {
                let fresh = self.load_all(true).await?;
                self.cache.set(keys::RESEARCHERS_PUBLIC, &fresh).await;
                fresh
            }
        };
        Ok(listing::apply(researchers, query))
    }

    pub async fn get_public(&self, id: i64) -> Result<Researcher, ResearcherServiceError> {
        let user = self.load_researcher(id).await?;
        if !user.is_active() {
            return Err(ResearcherServiceError::NotFound);
        }
        let published = self.published_counts().await?;
        self.join(user, &published).await
    }

    /// Every researcher account, inactive ones included
    pub async fn list_admin(
        &self,
        query: &ListQuery,
    ) -> Result<PagedResult<Researcher>, ResearcherServiceError> {
        let researchers = self.load_all(false).await?;
        Ok(listing::apply(researchers, query))
    }

    /// The caller's own profile; empty if never filled in
    pub async fn own_profile(&self, user: &User) -> Result<ResearcherProfile, ResearcherServiceError> {
        ensure_researcher(user)?;
        let profile = self
            .profiles
            .get(user.id)
            .await
            .context("Failed to load researcher profile")?;
        Ok(profile.unwrap_or_else(|| ResearcherProfile::empty(user.id)))
    }

    pub async fn update_own(
        &self,
        user: &User,
        input: UpdateResearcherProfileInput,
    ) -> Result<ResearcherProfile, ResearcherServiceError> {
        ensure_researcher(user)?;
        self.save(user.id, input).await
    }

    /// Management edit on behalf of a researcher
    pub async fn update_for(
        &self,
        id: i64,
        input: UpdateResearcherProfileInput,
    ) -> Result<Researcher, ResearcherServiceError> {
        let user = self.load_researcher(id).await?;
        self.save(user.id, input).await?;
        let published = self.published_counts().await?;
        self.join(user, &published).await
    }

    /// Add a 1 to 5 rating to the running average
    pub async fn rate(&self, id: i64, rating: u8) -> Result<ResearcherProfile, ResearcherServiceError> {
        if !(1..=5).contains(&rating) {
            return Err(ResearcherServiceError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        let user = self.load_researcher(id).await?;
        if !user.is_active() {
            return Err(ResearcherServiceError::NotFound);
        }

        let profile = self
            .profiles
            .add_rating(user.id, rating)
            .await
            .context("Failed to rate researcher")?;
        self.cache.invalidate_prefix(keys::RESEARCHERS).await;
        Ok(profile)
    }

    async fn save(
        &self,
        user_id: i64,
        input: UpdateResearcherProfileInput,
    ) -> Result<ResearcherProfile, ResearcherServiceError> {
        let mut profile = self
            .profiles
            .get(user_id)
            .await
            .context("Failed to load researcher profile")?
            .unwrap_or_else(|| ResearcherProfile::empty(user_id));

        if let Some(years) = input.years_of_experience {
            if !(0..=MAX_YEARS_OF_EXPERIENCE).contains(&years) {
                return Err(ResearcherServiceError::ValidationError(format!(
                    "Years of experience must be between 0 and {}",
                    MAX_YEARS_OF_EXPERIENCE
                )));
            }
            profile.years_of_experience = years;
        }
        if input.specialization.is_some() {
            profile.specialization = validate::optional(input.specialization);
        }
        if input.bio.is_some() {
            profile.bio = validate::optional(input.bio);
        }
        if input.photo_url.is_some() {
            profile.photo_url = validate::optional(input.photo_url);
        }

        let saved = self
            .profiles
            .upsert(&profile)
            .await
            .context("Failed to save researcher profile")?;
        self.cache.invalidate_prefix(keys::RESEARCHERS).await;
        Ok(saved)
    }

    async fn load_researcher(&self, id: i64) -> Result<User, ResearcherServiceError> {
        let user = self
            .users
            .get_by_id(id)
            .await
            .context("Failed to load user")?
            .ok_or(ResearcherServiceError::NotFound)?;
        if !user.is_researcher() {
            return Err(ResearcherServiceError::NotFound);
        }
        Ok(user)
    }

    async fn load_all(&self, active_only: bool) -> Result<Vec<Researcher>, ResearcherServiceError> {
        let users = self.users.list().await.context("Failed to list users")?;
        let mut profiles: HashMap<i64, ResearcherProfile> = self
            .profiles
            .list()
            .await
            .context("Failed to list researcher profiles")?
            .into_iter()
            .map(|p| (p.user_id, p))
            .collect();
        let published = self.published_counts().await?;

        Ok(users
            .into_iter()
            .filter(|u| u.is_researcher() && (!active_only || u.is_active()))
            .map(|u| {
                let profile = profiles
                    .remove(&u.id)
                    .unwrap_or_else(|| ResearcherProfile::empty(u.id));
                researcher(u, profile, &published)
            })
            .collect())
    }

    async fn join(
        &self,
        user: User,
        published: &HashMap<i64, i64>,
    ) -> Result<Researcher, ResearcherServiceError> {
        let profile = self
            .profiles
            .get(user.id)
            .await
            .context("Failed to load researcher profile")?
            .unwrap_or_else(|| ResearcherProfile::empty(user.id));
        Ok(researcher(user, profile, published))
    }

    async fn published_counts(&self) -> Result<HashMap<i64, i64>, ResearcherServiceError> {
        let papers = self
            .research
            .list_by_status(ResearchStatus::Published)
            .await
            .context("Failed to count published research")?;
        let mut counts = HashMap::new();
        for paper in papers {
            *counts.entry(paper.researcher_id).or_insert(0) += 1;
        }
        Ok(counts)
    }
}

fn researcher(user: User, profile: ResearcherProfile, published: &HashMap<i64, i64>) -> Researcher {
    Researcher {
        id: user.id,
        published_papers: published.get(&user.id).copied().unwrap_or(0),
        full_name: user.full_name,
        email: user.email,
        role: user.role,
        profile,
    }
}

fn ensure_researcher(user: &User) -> Result<(), ResearcherServiceError> {
    if !user.is_researcher() {
        return Err(ResearcherServiceError::Forbidden(
            "Only consultants and researchers have a researcher profile".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::db::repositories::{
        SqlxResearchRepository, SqlxResearcherProfileRepository, SqlxUserRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::models::{UserRole, UserStatus};
    use std::time::Duration;

    struct Fixture {
        service: ResearcherService,
        users: Arc<dyn UserRepository>,
        researcher: User,
        client: User,
    }

    async fn setup() -> Fixture {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let users = SqlxUserRepository::boxed(pool.clone());

        let researcher = users
            .create(&User::new(
                "ama@example.com".to_string(),
                "Dr. Ama".to_string(),
                "hash".to_string(),
                UserRole::Researcher,
            ))
            .await
            .unwrap();
        let client = users
            .create(&User::new(
                "casey@example.com".to_string(),
                "Casey".to_string(),
                "hash".to_string(),
                UserRole::Client,
            ))
            .await
            .unwrap();

        let service = ResearcherService::new(
            users.clone(),
            SqlxResearcherProfileRepository::boxed(pool.clone()),
            SqlxResearchRepository::boxed(pool),
            Arc::new(MemoryCache::new(100, Duration::from_secs(60))),
        );
        Fixture {
            service,
            users,
            researcher,
            client,
        }
    }

    #[tokio::test]
    async fn test_public_list_only_researchers() {
        let f = setup().await;
        let list = f.service.list_public(&ListQuery::default()).await.unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.items[0].id, f.researcher.id);
        assert_eq!(list.items[0].profile.total_ratings, 0);

        assert!(matches!(
            f.service.get_public(f.client.id).await,
            Err(ResearcherServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_update_own_refreshes_cached_directory() {
        let f = setup().await;
        f.service.list_public(&ListQuery::default()).await.unwrap();

        let input = UpdateResearcherProfileInput {
            specialization: Some(" Cardiology ".to_string()),
            years_of_experience: Some(12),
            ..Default::default()
        };
        let profile = f.service.update_own(&f.researcher, input).await.unwrap();
        assert_eq!(profile.specialization.as_deref(), Some("Cardiology"));

        let list = f.service.list_public(&ListQuery::default()).await.unwrap();
        assert_eq!(list.items[0].profile.years_of_experience, 12);
    }

    #[tokio::test]
    async fn test_profile_rules() {
        let f = setup().await;
        assert!(matches!(
            f.service.own_profile(&f.client).await,
            Err(ResearcherServiceError::Forbidden(_))
        ));

        let empty = f.service.own_profile(&f.researcher).await.unwrap();
        assert_eq!(empty.user_id, f.researcher.id);

        let bad = UpdateResearcherProfileInput {
            years_of_experience: Some(-1),
            ..Default::default()
        };
        assert!(matches!(
            f.service.update_for(f.researcher.id, bad).await,
            Err(ResearcherServiceError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn test_rating_average() {
        let f = setup().await;
        assert!(matches!(
            f.service.rate(f.researcher.id, 6).await,
            Err(ResearcherServiceError::ValidationError(_))
        ));
        assert!(matches!(
            f.service.rate(f.researcher.id, 0).await,
            Err(ResearcherServiceError::ValidationError(_))
        ));

        f.service.rate(f.researcher.id, 5).await.unwrap();
        let profile = f.service.rate(f.researcher.id, 4).await.unwrap();
        assert_eq!(profile.total_ratings, 2);
        assert!((profile.average_rating - 4.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_inactive_hidden_from_public_but_not_admin() {
        let f = setup().await;
        let mut user = f.researcher.clone();
        user.status = UserStatus::Inactive;
        f.users.update(&user).await.unwrap();

        assert_eq!(f.service.list_public(&ListQuery::default()).await.unwrap().total, 0);
        assert_eq!(f.service.list_admin(&ListQuery::default()).await.unwrap().total, 1);
        assert!(matches!(
            f.service.get_public(f.researcher.id).await,
            Err(ResearcherServiceError::NotFound)
        ));
    }
}
