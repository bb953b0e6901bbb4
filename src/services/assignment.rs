//! Assignment request service
//!
//! Owns the consultation workflow. A status change is checked against the
//! transition table in `models::assignment` (edge exists, caller may take
//! it, required input present) and then written with a compare-and-set on
//! the status and proposed price, so two people acting on the same request
//! cannot both win and a client never accepts a price they did not see.

use crate::db::repositories::{AssignmentRepository, StatusChange};
use crate::models::{
    AssignmentPatch, AssignmentRequest, AssignmentStatus, AssignmentView, CreateAssignmentInput,
    ListQuery, Money, PagedResult, StatusInfo, TransitionInput, TransitionRequirement, User,
    transition_rule,
};
use crate::services::listing;
use anyhow::Context;
use chrono::Utc;
use std::sync::Arc;

const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, thiserror::Error)]
pub enum AssignmentServiceError {
    #[error("Assignment request not found")]
    NotFound,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    ValidationError(String),

    /// The workflow has no edge between the two statuses
    #[error("Cannot move a request from {from} to {to}")]
    InvalidTransition {
        from: AssignmentStatus,
        to: AssignmentStatus,
    },

    /// The request changed since the caller last saw it
    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

pub struct AssignmentService {
    repo: Arc<dyn AssignmentRepository>,
}

impl AssignmentService {
    pub fn new(repo: Arc<dyn AssignmentRepository>) -> Self {
        Self { repo }
    }

    /// The status display table, in workflow order
    pub fn statuses(&self) -> Vec<StatusInfo> {
        AssignmentStatus::ALL.iter().map(|s| s.info()).collect()
    }

    /// Open a new request for `client` in `pending_review`
    pub async fn create(
        &self,
        client: &User,
        input: CreateAssignmentInput,
    ) -> Result<AssignmentView, AssignmentServiceError> {
        let title = required(&input.title, "Title")?;
        let subject = required(&input.subject, "Subject")?;
        let description = required(&input.description, "Description")?;
        if let Some(deadline) = input.deadline {
            if deadline < Utc::now() {
                return Err(AssignmentServiceError::ValidationError(
                    "Deadline must be in the future".to_string(),
                ));
            }
        }
        let currency = normalize_currency(input.currency.as_deref())?;
        let attachment_url = trimmed(input.attachment_url);

        let now = Utc::now();
        let assignment = AssignmentRequest {
            id: 0,
            client_id: client.id,
            client_name: None,
            title,
            subject,
            description,
            status: AssignmentStatus::PendingReview,
            deadline: input.deadline,
            proposed_price: None,
            final_price: None,
            currency,
            doctor_name: None,
            doctor_notes: None,
            client_notes: trimmed(input.client_notes),
            rejection_reason: None,
            has_attachment: attachment_url.is_some(),
            attachment_url,
            payment_proof_url: None,
            created_at: now,
            updated_at: now,
        };

        let created = self
            .repo
            .create(&assignment)
            .await
            .context("Failed to create assignment request")?;
        tracing::info!(
            "Client {} opened assignment request {}",
            client.id,
            created.id
        );
        Ok(created.into())
    }

    /// Requests visible to `user`: their own for clients, all for staff
    pub async fn list_for(
        &self,
        user: &User,
        query: &ListQuery,
    ) -> Result<PagedResult<AssignmentView>, AssignmentServiceError> {
        let rows = if user.is_staff() {
            self.repo.list().await
        } else {
            self.repo.list_by_client(user.id).await
        }
        .context("Failed to list assignment requests")?;

        Ok(listing::apply(rows, query).map(AssignmentView::from))
    }

    /// One request with its audit trail
    pub async fn get_for(
        &self,
        user: &User,
        id: i64,
    ) -> Result<AssignmentView, AssignmentServiceError> {
        let assignment = self.load_visible(user, id).await?;
        self.with_events(assignment).await
    }

    /// Move a request to `input.status`
    pub async fn transition(
        &self,
        user: &User,
        id: i64,
        input: TransitionInput,
    ) -> Result<AssignmentView, AssignmentServiceError> {
        let current = self.load_visible(user, id).await?;
        let from = current.status;
        let to = input.status;

        if let Some(expected) = input.expected_status {
            if expected != from {
                return Err(AssignmentServiceError::Conflict(format!(
                    "Request is now {}, not {}",
                    from, expected
                )));
            }
        }

        let rule = transition_rule(from, to)
            .ok_or(AssignmentServiceError::InvalidTransition { from, to })?;
        if !rule.actor.permits(user, current.client_id) {
            return Err(AssignmentServiceError::Forbidden(format!(
                "You are not allowed to move this request to {}",
                to
            )));
        }
        if let Some(requirement) = rule.requires {
            check_requirement(requirement, &input)?;
        }

        let patch = build_patch(user, &current, &input)?;
        let note = trimmed(input.note.clone()).or_else(|| trimmed(input.reason.clone()));
        let change = StatusChange {
            id,
            from,
            proposed_price: current.proposed_price,
            to,
            patch: &patch,
            actor_id: user.id,
            note: note.as_deref(),
        };

        let applied = self
            .repo
            .transition(&change)
            .await
            .context("Failed to change assignment status")?;
        if !applied {
            return Err(AssignmentServiceError::Conflict(
                "Request was updated by someone else; reload and try again".to_string(),
            ));
        }
        tracing::info!(
            "Assignment {} moved {} -> {} by user {}",
            id,
            from,
            to,
            user.id
        );

        let updated = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to reload assignment request")?
            .ok_or(AssignmentServiceError::NotFound)?;
        self.with_events(updated).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), AssignmentServiceError> {
        let deleted = self
            .repo
            .delete(id)
            .await
            .context("Failed to delete assignment request")?;
        if !deleted {
            return Err(AssignmentServiceError::NotFound);
        }
        tracing::info!("Deleted assignment request {}", id);
        Ok(())
    }

    // ========================================================================
    // Private helper methods
    // ========================================================================

    async fn load_visible(
        &self,
        user: &User,
        id: i64,
    ) -> Result<AssignmentRequest, AssignmentServiceError> {
        let assignment = self
            .repo
            .get_by_id(id)
            .await
            .context("Failed to get assignment request")?
            .ok_or(AssignmentServiceError::NotFound)?;

        if !user.is_staff() && assignment.client_id != user.id {
            return Err(AssignmentServiceError::Forbidden(
                "This request belongs to another client".to_string(),
            ));
        }
        Ok(assignment)
    }

    async fn with_events(
        &self,
        assignment: AssignmentRequest,
    ) -> Result<AssignmentView, AssignmentServiceError> {
        let events = self
            .repo
            .list_events(assignment.id)
            .await
            .context("Failed to load assignment events")?;
        let mut view = AssignmentView::from(assignment);
        view.events = Some(events);
        Ok(view)
    }
}

fn check_requirement(
    requirement: TransitionRequirement,
    input: &TransitionInput,
) -> Result<(), AssignmentServiceError> {
    let missing = match requirement {
        TransitionRequirement::ProposedPrice => {
            !input.proposed_price.is_some_and(Money::is_valid_charge)
        }
        TransitionRequirement::Reason => trimmed(input.reason.clone()).is_none(),
        TransitionRequirement::PaymentProof => trimmed(input.payment_proof_url.clone()).is_none(),
    };
    if missing {
        let message = match requirement {
            TransitionRequirement::ProposedPrice => format!(
                "A proposed price greater than zero and at most {} is required",
                Money::MAX
            ),
            TransitionRequirement::Reason => "A reason is required".to_string(),
            TransitionRequirement::PaymentProof => "A payment proof upload is required".to_string(),
        };
        return Err(AssignmentServiceError::ValidationError(message));
    }
    Ok(())
}

/// Column changes that travel with a status change
fn build_patch(
    user: &User,
    current: &AssignmentRequest,
    input: &TransitionInput,
) -> Result<AssignmentPatch, AssignmentServiceError> {
    let mut patch = AssignmentPatch::default();
    let acting_as_owner = user.id == current.client_id;

    match input.status {
        AssignmentStatus::UnderReview | AssignmentStatus::PriceProposed => {
            if current.doctor_name.is_none() && user.is_reviewer() {
                patch.doctor_name = Some(user.full_name.clone());
            }
            if input.status == AssignmentStatus::PriceProposed {
                patch.proposed_price = input.proposed_price;
                if input.currency.is_some() {
                    patch.currency = Some(normalize_currency(input.currency.as_deref())?);
                }
            }
        }
        AssignmentStatus::Accepted => {
            patch.final_price = current.proposed_price;
        }
        AssignmentStatus::Rejected => {
            patch.rejection_reason = trimmed(input.reason.clone());
        }
        AssignmentStatus::PaymentUploaded => {
            patch.payment_proof_url = trimmed(input.payment_proof_url.clone());
        }
        _ => {}
    }

    if user.is_reviewer() && !acting_as_owner {
        patch.doctor_notes = trimmed(input.doctor_notes.clone());
    }
    if acting_as_owner {
        patch.client_notes = trimmed(input.client_notes.clone());
    }
    Ok(patch)
}

fn required(value: &str, field: &str) -> Result<String, AssignmentServiceError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AssignmentServiceError::ValidationError(format!(
            "{} is required",
            field
        )));
    }
    Ok(value.to_string())
}

fn trimmed(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_currency(currency: Option<&str>) -> Result<String, AssignmentServiceError> {
    let currency = currency.map(str::trim).filter(|c| !c.is_empty());
    match currency {
        None => Ok(DEFAULT_CURRENCY.to_string()),
        Some(c) if c.len() == 3 && c.chars().all(|ch| ch.is_ascii_alphabetic()) => {
            Ok(c.to_ascii_uppercase())
        }
        Some(c) => Err(AssignmentServiceError::ValidationError(format!(
            "Invalid currency code: {}",
            c
        ))),
    }
}
