//! Partner service
//!
//! Organisations apply publicly and start `pending`. Management approves,
//! publishes or rejects them; only published partners are listed publicly.

use crate::cache::{keys, SharedCache};
use crate::db::repositories::PartnerRepository;
use crate::models::{ListQuery, PagedResult, Partner, PartnerInput, PartnerStatus};
use crate::services::{listing, validate};
use anyhow::Context;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum PartnerServiceError {
    #[error("Partner not found")]
    NotFound,

    #[error("{0}")]
    ValidationError(String),

    #[error("Cannot move a partner from {from} to {to}")]
    InvalidTransition {
        from: PartnerStatus,
        to: PartnerStatus,
    },

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct PartnerService {
    repo: Arc<dyn PartnerRepository>,
    cache: SharedCache,
}

impl PartnerService {
    pub fn new(repo: Arc<dyn PartnerRepository>, cache: SharedCache) -> Self {
        Self { repo, cache }
    }

    /// Public "become a partner" form
    pub async fn apply(&self, input: PartnerInput) -> Result<Partner, PartnerServiceError> {
        let input = clean(input)?;
        let partner = self
            .repo
            .create(&input)
            .await
            .context("Failed to save partnership application")?;
        tracing::info!(
            "Partnership application {} from {}",
            partner.id,
            partner.organization_name
        );
        Ok(partner)
    }

    /// Published partners for the public site
    pub async fn list_published(&self) -> Result<Vec<Partner>, PartnerServiceError> {
        if let Some(cached) = self.cache.get(keys::PARTNERS_PUBLISHED).await {
            return Ok(cached);
        }
        let partners = self
            .repo
            .list_by_status(PartnerStatus::Published)
            .await
            .context("Failed to list published partners")?;
        self.cache.set(keys::PARTNERS_PUBLISHED, &partners).await;
        Ok(partners)
    }

    pub async fn list_all(&self, query: &ListQuery) -> Result<PagedResult<Partner>, PartnerServiceError> {
        let partners = self.repo.list().await.context("Failed to list partners")?;
        Ok(listing::apply(partners, query))
    }

    pub async fn update(&self, id: i64, input: PartnerInput) -> Result<Partner, PartnerServiceError> {
        let input = clean(input)?;
        let partner = self
            .repo
            .update(id, &input)
            .await
            .context("Failed to update partner")?
            .ok_or(PartnerServiceError::NotFound)?;
        self.cache.invalidate_prefix(keys::PARTNERS).await;
        Ok(partner)
    }

    pub async fn approve(&self, id: i64) -> Result<Partner, PartnerServiceError> {
        self.move_to(id, PartnerStatus::Approved).await
    }

    pub async fn publish(&self, id: i64) -> Result<Partner, PartnerServiceError> {
        self.move_to(id, PartnerStatus::Published).await
    }

    pub async fn reject(&self, id: i64) -> Result<Partner, PartnerServiceError> {
        self.move_to(id, PartnerStatus::Rejected).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), PartnerServiceError> {
        if !self.repo.delete(id).await.context("Failed to delete partner")? {
            return Err(PartnerServiceError::NotFound);
        }
        self.cache.invalidate_prefix(keys::PARTNERS).await;
        Ok(())
    }

    async fn move_to(&self, id: i64, to: PartnerStatus) -> Result<Partner, PartnerServiceError> {
        let partner = self.load(id).await?;
        let from = partner.status;
        if !from.can_become(to) {
            return Err(PartnerServiceError::InvalidTransition { from, to });
        }

        let moved = self
            .repo
            .set_status(id, from, to)
            .await
            .context("Failed to update partner status")?;
        if !moved {
            return Err(PartnerServiceError::Conflict(
                "Partner was changed by someone else".to_string(),
            ));
        }
        self.cache.invalidate_prefix(keys::PARTNERS).await;
        tracing::info!("Partner {} moved from {} to {}", id, from, to);
        self.load(id).await
    }

    async fn load(&self, id: i64) -> Result<Partner, PartnerServiceError> {
        self.repo
            .get_by_id(id)
            .await
            .context("Failed to load partner")?
            .ok_or(PartnerServiceError::NotFound)
    }
}

fn clean(input: PartnerInput) -> Result<PartnerInput, PartnerServiceError> {
    let invalid = PartnerServiceError::ValidationError;
    Ok(PartnerInput {
        organization_name: validate::required(&input.organization_name, "Organization name")
            .map_err(invalid)?,
        contact_name: validate::required(&input.contact_name, "Contact name").map_err(invalid)?,
        email: validate::email(&input.email).map_err(invalid)?,
        phone: validate::optional(input.phone),
        website: validate::optional(input.website),
        logo_url: validate::optional(input.logo_url),
        description: validate::optional(input.description),
        partnership_type: validate::required(&input.partnership_type, "Partnership type")
            .map_err(invalid)?,
    })
}
