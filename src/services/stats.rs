//! Dashboard counters for clients and management

use crate::db::repositories::{
    AssignmentRepository, DonationRepository, PartnerRepository, ResearchRepository,
    TeamApplicationRepository, UserRepository,
};
use crate::models::{
    ApplicationStatus, AssignmentStatus, DonationStatus, Money, PartnerStatus, ResearchStatus,
    User, UserRole,
};
use anyhow::Context;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum StatsServiceError {
    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// A client's own requests at a glance
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct ClientStats {
    pub total: i64,
    /// Not yet completed, rejected or cancelled
    pub active: i64,
    pub completed: i64,
    /// Price to answer or payment to make
    pub awaiting_action: i64,
    /// Sum of final prices on paid requests
    pub total_spent: Money,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ManagementStats {
    pub users_by_role: BTreeMap<String, i64>,
    pub assignments_by_status: BTreeMap<String, i64>,
    pub research_by_status: BTreeMap<String, i64>,
    pub pending_partnerships: i64,
    pub pending_applications: i64,
    pub new_donations: i64,
}

pub struct StatsService {
    users: Arc<dyn UserRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    research: Arc<dyn ResearchRepository>,
    partners: Arc<dyn PartnerRepository>,
    applications: Arc<dyn TeamApplicationRepository>,
    donations: Arc<dyn DonationRepository>,
}

impl StatsService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        assignments: Arc<dyn AssignmentRepository>,
        research: Arc<dyn ResearchRepository>,
        partners: Arc<dyn PartnerRepository>,
        applications: Arc<dyn TeamApplicationRepository>,
        donations: Arc<dyn DonationRepository>,
    ) -> Self {
        Self {
            users,
            assignments,
            research,
            partners,
            applications,
            donations,
        }
    }

    pub async fn client(&self, client: &User) -> Result<ClientStats, StatsServiceError> {
        let requests = self
            .assignments
            .list_by_client(client.id)
            .await
            .context("Failed to load client requests")?;

        let mut stats = ClientStats {
            total: requests.len() as i64,
            ..Default::default()
        };
        for request in &requests {
            let status = request.status;
            if !status.is_terminal() {
                stats.active += 1;
            }
            if status == AssignmentStatus::Completed {
                stats.completed += 1;
            }
            if status.awaits_client() {
                stats.awaiting_action += 1;
            }
        }
        stats.total_spent = requests
            .iter()
            .filter(|r| r.status.is_paid())
            .filter_map(|r| r.final_price)
            .sum();
        Ok(stats)
    }

    /// Every status and role appears, zero when there are no rows
    pub async fn management(&self) -> Result<ManagementStats, StatsServiceError> {
        let mut users_by_role: BTreeMap<String, i64> =
            UserRole::ALL.iter().map(|r| (r.as_str().to_string(), 0)).collect();
        for (role, count) in self.users.count_by_role().await.context("Failed to count users")? {
            users_by_role.insert(role.as_str().to_string(), count);
        }

        let mut assignments_by_status: BTreeMap<String, i64> = AssignmentStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for (status, count) in self
            .assignments
            .count_by_status()
            .await
            .context("Failed to count assignments")?
        {
            assignments_by_status.insert(status.as_str().to_string(), count);
        }

        let mut research_by_status: BTreeMap<String, i64> = ResearchStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        for (status, count) in self
            .research
            .count_by_status()
            .await
            .context("Failed to count research")?
        {
            research_by_status.insert(status.as_str().to_string(), count);
        }

        Ok(ManagementStats {
            users_by_role,
            assignments_by_status,
            research_by_status,
            pending_partnerships: self
                .partners
                .count_with_status(PartnerStatus::Pending)
                .await
                .context("Failed to count partners")?,
            pending_applications: self
                .applications
                .count_with_status(ApplicationStatus::Pending)
                .await
                .context("Failed to count applications")?,
            new_donations: self
                .donations
                .count_with_status(DonationStatus::New)
                .await
                .context("Failed to count donations")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{
        SqlxAssignmentRepository, SqlxDonationRepository, SqlxPartnerRepository,
        SqlxResearchRepository, SqlxTeamApplicationRepository, SqlxUserRepository, StatusChange,
    };
    use crate::db::{create_test_pool, migrations, DynDatabasePool};
    use crate::models::{AssignmentPatch, AssignmentRequest, PartnerInput};
    use chrono::Utc;

    async fn setup() -> (StatsService, DynDatabasePool) {
        let pool = create_test_pool().await.unwrap();
        migrations::run_migrations(&pool).await.unwrap();
        let service = StatsService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxAssignmentRepository::boxed(pool.clone()),
            SqlxResearchRepository::boxed(pool.clone()),
            SqlxPartnerRepository::boxed(pool.clone()),
            SqlxTeamApplicationRepository::boxed(pool.clone()),
            SqlxDonationRepository::boxed(pool.clone()),
        );
        (service, pool)
    }

    fn request(client_id: i64) -> AssignmentRequest {
        let now = Utc::now();
        AssignmentRequest {
            id: 0,
            client_id,
            client_name: None,
            title: "Review".to_string(),
            subject: "General".to_string(),
            description: "Details".to_string(),
            status: AssignmentStatus::PendingReview,
            deadline: None,
            proposed_price: None,
            final_price: None,
            currency: "USD".to_string(),
            doctor_name: None,
            doctor_notes: None,
            client_notes: None,
            rejection_reason: None,
            has_attachment: false,
            attachment_url: None,
            payment_proof_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_client_stats() {
        let (service, pool) = setup().await;
        let users = SqlxUserRepository::new(pool.clone());
        let client = users
            .create(&User::new(
                "c@example.com".to_string(),
                "Client".to_string(),
                "hash".to_string(),
                UserRole::Client,
            ))
            .await
            .unwrap();
        let assignments = SqlxAssignmentRepository::new(pool);

        assignments.create(&request(client.id)).await.unwrap();
        let paid = assignments.create(&request(client.id)).await.unwrap();
        let quoted = assignments.create(&request(client.id)).await.unwrap();

        // Jump straight to the interesting states; the repository does not
        // enforce the workflow.
        let verified = AssignmentPatch {
            final_price: Some(Money::from_cents(20_050)),
            ..Default::default()
        };
        assignments
            .transition(&StatusChange {
                id: paid.id,
                from: AssignmentStatus::PendingReview,
                proposed_price: None,
                to: AssignmentStatus::Completed,
                patch: &verified,
                actor_id: client.id,
                note: None,
            })
            .await
            .unwrap();
        assignments
            .transition(&StatusChange {
                id: quoted.id,
                from: AssignmentStatus::PendingReview,
                proposed_price: None,
                to: AssignmentStatus::PriceProposed,
                patch: &AssignmentPatch::default(),
                actor_id: client.id,
                note: None,
            })
            .await
            .unwrap();

        let stats = service.client(&client).await.unwrap();
        assert_eq!(
            stats,
            ClientStats {
                total: 3,
                active: 2,
                completed: 1,
                awaiting_action: 1,
                total_spent: Money::from_cents(20_050),
            }
        );
    }

    #[tokio::test]
    async fn test_management_stats_fill_zeroes() {
        let (service, pool) = setup().await;
        SqlxPartnerRepository::new(pool)
            .create(&PartnerInput {
                organization_name: "Acme".to_string(),
                contact_name: "Ada".to_string(),
                email: "ada@acme.org".to_string(),
                phone: None,
                website: None,
                logo_url: None,
                description: None,
                partnership_type: "research".to_string(),
            })
            .await
            .unwrap();

        let stats = service.management().await.unwrap();
        assert_eq!(stats.users_by_role.len(), UserRole::ALL.len());
        assert_eq!(stats.assignments_by_status["pending_review"], 0);
        assert_eq!(stats.research_by_status["draft"], 0);
        assert_eq!(stats.pending_partnerships, 1);
        assert_eq!(stats.pending_applications, 0);
        assert_eq!(stats.new_donations, 0);
    }
}
