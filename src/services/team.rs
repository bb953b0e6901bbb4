//! Team service: the public team page and applications to join it

use crate::cache::{keys, SharedCache};
use crate::db::repositories::{TeamApplicationRepository, TeamMemberRepository};
use crate::models::{
    ApplicationStatus, CreateApplicationInput, ListQuery, PagedResult, TeamApplication, TeamMember,
    TeamMemberInput,
};
use crate::services::{listing, validate};
use anyhow::Context;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum TeamServiceError {
    #[error("Team member not found")]
    MemberNotFound,

    #[error("Application not found")]
    ApplicationNotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationStatusInput {
    pub status: ApplicationStatus,
}

pub struct TeamService {
    members: Arc<dyn TeamMemberRepository>,
    applications: Arc<dyn TeamApplicationRepository>,
    cache: SharedCache,
}

impl TeamService {
    pub fn new(
        members: Arc<dyn TeamMemberRepository>,
        applications: Arc<dyn TeamApplicationRepository>,
        cache: SharedCache,
    ) -> Self {
        Self {
            members,
            applications,
            cache,
        }
    }

    /// Active members in display order (cached); `include_inactive` bypasses
    /// the cache for management screens.
    pub async fn list_members(&self, include_inactive: bool) -> Result<Vec<TeamMember>, TeamServiceError> {
        if include_inactive {
            return Ok(self
                .members
                .list(true)
                .await
                .context("Failed to list team members")?);
        }

        if let Some(cached) = self.cache.get(keys::TEAM_MEMBERS_ACTIVE).await {
            return Ok(cached);
        }
        let members = self
            .members
            .list(false)
            .await
            .context("Failed to list team members")?;
        self.cache.set(keys::TEAM_MEMBERS_ACTIVE, &members).await;
        Ok(members)
    }

    pub async fn create_member(&self, input: TeamMemberInput) -> Result<TeamMember, TeamServiceError> {
        let input = clean_member(input)?;
        let member = self
            .members
            .create(&input)
            .await
            .context("Failed to create team member")?;
        self.cache.invalidate_prefix(keys::TEAM_MEMBERS).await;
        Ok(member)
    }

    pub async fn update_member(
        &self,
        id: i64,
        input: TeamMemberInput,
    ) -> Result<TeamMember, TeamServiceError> {
        let input = clean_member(input)?;
        let member = self
            .members
            .update(id, &input)
            .await
            .context("Failed to update team member")?
            .ok_or(TeamServiceError::MemberNotFound)?;
        self.cache.invalidate_prefix(keys::TEAM_MEMBERS).await;
        Ok(member)
    }

    pub async fn delete_member(&self, id: i64) -> Result<(), TeamServiceError> {
        if !self
            .members
            .delete(id)
            .await
            .context("Failed to delete team member")?
        {
            return Err(TeamServiceError::MemberNotFound);
        }
        self.cache.invalidate_prefix(keys::TEAM_MEMBERS).await;
        Ok(())
    }

    /// Public application form
    pub async fn apply(&self, input: CreateApplicationInput) -> Result<TeamApplication, TeamServiceError> {
        let input = CreateApplicationInput {
            full_name: validate::required(&input.full_name, "Full name")
                .map_err(TeamServiceError::ValidationError)?,
            email: validate::email(&input.email).map_err(TeamServiceError::ValidationError)?,
            phone: validate::optional(input.phone),
            position: validate::required(&input.position, "Position")
                .map_err(TeamServiceError::ValidationError)?,
            resume_url: validate::optional(input.resume_url),
            cover_letter: validate::optional(input.cover_letter),
        };

        let application = self
            .applications
            .create(&input)
            .await
            .context("Failed to save team application")?;
        tracing::info!(
            "Team application {} received for {}",
            application.id,
            application.position
        );
        Ok(application)
    }

    pub async fn list_applications(
        &self,
        query: &ListQuery,
    ) -> Result<PagedResult<TeamApplication>, TeamServiceError> {
        let applications = self
            .applications
            .list()
            .await
            .context("Failed to list team applications")?;
        Ok(listing::apply(applications, query))
    }

    pub async fn review_application(
        &self,
        id: i64,
        status: ApplicationStatus,
    ) -> Result<TeamApplication, TeamServiceError> {
        let application = self
            .applications
            .set_status(id, status)
            .await
            .context("Failed to update team application")?
            .ok_or(TeamServiceError::ApplicationNotFound)?;
        tracing::info!("Team application {} marked {}", id, status);
        Ok(application)
    }

    pub async fn delete_application(&self, id: i64) -> Result<(), TeamServiceError> {
        if !self
            .applications
            .delete(id)
            .await
            .context("Failed to delete team application")?
        {
            return Err(TeamServiceError::ApplicationNotFound);
        }
        Ok(())
    }
}

fn clean_member(input: TeamMemberInput) -> Result<TeamMemberInput, TeamServiceError> {
    let email = match validate::optional(input.email) {
        Some(email) => Some(validate::email(&email).map_err(TeamServiceError::ValidationError)?),
        None => None,
    };
    Ok(TeamMemberInput {
        name: validate::required(&input.name, "Name").map_err(TeamServiceError::ValidationError)?,
        position: validate::required(&input.position, "Position")
            .map_err(TeamServiceError::ValidationError)?,
        bio: validate::optional(input.bio),
        photo_url: validate::optional(input.photo_url),
        email,
        linkedin_url: validate::optional(input.linkedin_url),
        display_order: input.display_order,
        is_active: input.is_active,
    })
}
