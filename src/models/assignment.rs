//! Assignment request model
//!
//! An assignment request is a client's paid consultation. Its `status`
//! moves through a fixed workflow:
//!
//! ```text
//! pending_review → under_review → price_proposed ⇄ negotiating → accepted
//!   → payment_pending ⇄ payment_uploaded → payment_verified → in_progress → completed
//! ```
//!
//! with `rejected` and `cancelled` reachable from the early states. The
//! allowed edges and who may take them live in [`transition_rule`]; the
//! display table lives in [`AssignmentStatus::info`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{Money, User};

/// Workflow status of an assignment request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    #[default]
    PendingReview,
    UnderReview,
    PriceProposed,
    Negotiating,
    Accepted,
    PaymentPending,
    PaymentUploaded,
    PaymentVerified,
    InProgress,
    Completed,
    Rejected,
    Cancelled,
}

/// Presentation data for a status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusInfo {
    pub status: AssignmentStatus,
    pub label: &'static str,
    pub color: &'static str,
    pub icon: &'static str,
    pub description: &'static str,
}

impl AssignmentStatus {
    pub const ALL: [AssignmentStatus; 12] = [
        AssignmentStatus::PendingReview,
        AssignmentStatus::UnderReview,
        AssignmentStatus::PriceProposed,
        AssignmentStatus::Negotiating,
        AssignmentStatus::Accepted,
        AssignmentStatus::PaymentPending,
        AssignmentStatus::PaymentUploaded,
        AssignmentStatus::PaymentVerified,
        AssignmentStatus::InProgress,
        AssignmentStatus::Completed,
        AssignmentStatus::Rejected,
        AssignmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::PendingReview => "pending_review",
            AssignmentStatus::UnderReview => "under_review",
            AssignmentStatus::PriceProposed => "price_proposed",
            AssignmentStatus::Negotiating => "negotiating",
            AssignmentStatus::Accepted => "accepted",
            AssignmentStatus::PaymentPending => "payment_pending",
            AssignmentStatus::PaymentUploaded => "payment_uploaded",
            AssignmentStatus::PaymentVerified => "payment_verified",
            AssignmentStatus::InProgress => "in_progress",
            AssignmentStatus::Completed => "completed",
            AssignmentStatus::Rejected => "rejected",
            AssignmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::Completed | AssignmentStatus::Rejected | AssignmentStatus::Cancelled
        )
    }

    /// Waiting on the client to act
    pub fn awaits_client(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::PriceProposed
                | AssignmentStatus::Negotiating
                | AssignmentStatus::PaymentPending
        )
    }

    /// Money has been received for the request
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            AssignmentStatus::PaymentVerified
                | AssignmentStatus::InProgress
                | AssignmentStatus::Completed
        )
    }

    /// Central display lookup
    pub fn info(&self) -> StatusInfo {
        let (label, color, icon, description) = match self {
            AssignmentStatus::PendingReview => (
                "Pending Review",
                "yellow",
                "clock",
                "Your request has been received and is waiting for a consultant.",
            ),
            AssignmentStatus::UnderReview => (
                "Under Review",
                "blue",
                "search",
                "A consultant is reviewing the request.",
            ),
            AssignmentStatus::PriceProposed => (
                "Price Proposed",
                "purple",
                "dollar-sign",
                "A price has been proposed. Accept, negotiate or decline it.",
            ),
            AssignmentStatus::Negotiating => (
                "Negotiating",
                "orange",
                "message-circle",
                "The price is being negotiated.",
            ),
            AssignmentStatus::Accepted => (
                "Accepted",
                "teal",
                "check",
                "The price was accepted. Payment is the next step.",
            ),
            AssignmentStatus::PaymentPending => (
                "Payment Pending",
                "amber",
                "credit-card",
                "Waiting for the client to pay and upload proof of payment.",
            ),
            AssignmentStatus::PaymentUploaded => (
                "Payment Uploaded",
                "indigo",
                "upload",
                "Proof of payment uploaded; waiting for verification.",
            ),
            AssignmentStatus::PaymentVerified => (
                "Payment Verified",
                "emerald",
                "shield-check",
                "Payment confirmed. Work will begin shortly.",
            ),
            AssignmentStatus::InProgress => (
                "In Progress",
                "cyan",
                "loader",
                "The consultant is working on the request.",
            ),
            AssignmentStatus::Completed => (
                "Completed",
                "green",
                "check-circle",
                "The request has been completed.",
            ),
            AssignmentStatus::Rejected => (
                "Rejected",
                "red",
                "x-circle",
                "The request was rejected.",
            ),
            AssignmentStatus::Cancelled => (
                "Cancelled",
                "gray",
                "ban",
                "The request was cancelled.",
            ),
        };
        StatusInfo {
            status: *self,
            label,
            color,
            icon,
            description,
        }
    }
}

impl fmt::Display for AssignmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AssignmentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        AssignmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == lower)
            .ok_or_else(|| anyhow::anyhow!("Invalid assignment status: {}", s))
    }
}

/// Who may take a workflow edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionActor {
    /// consultant, management or admin
    Reviewer,
    /// the owning client
    Client,
    /// accountant, management or admin
    Finance,
    ClientOrReviewer,
    /// the owning client or an admin
    ClientOrAdmin,
}

impl TransitionActor {
    /// Admins may take any listed edge.
    pub fn permits(&self, user: &User, owner_id: i64) -> bool {
        if user.is_admin() {
            return true;
        }
        let is_owner = user.id == owner_id;
        match self {
            TransitionActor::Reviewer => user.is_reviewer(),
            TransitionActor::Client | TransitionActor::ClientOrAdmin => is_owner,
            TransitionActor::Finance => user.is_finance(),
            TransitionActor::ClientOrReviewer => is_owner || user.is_reviewer(),
        }
    }
}

/// Extra input an edge needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionRequirement {
    /// `0 < proposed_price <= Money::MAX`
    ProposedPrice,
    /// a non-empty reason
    Reason,
    /// a payment proof URL
    PaymentProof,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub actor: TransitionActor,
    pub requires: Option<TransitionRequirement>,
}

/// The workflow table. `None` means the edge does not exist.
pub fn transition_rule(from: AssignmentStatus, to: AssignmentStatus) -> Option<TransitionRule> {
    use AssignmentStatus::*;
    use TransitionActor as A;
    use TransitionRequirement as R;

    let rule = |actor, requires| Some(TransitionRule { actor, requires });

    match (from, to) {
        (PendingReview, UnderReview) => rule(A::Reviewer, None),
        (PendingReview | UnderReview, PriceProposed) => rule(A::Reviewer, Some(R::ProposedPrice)),
        (PendingReview | UnderReview, Rejected) => rule(A::Reviewer, Some(R::Reason)),
        (PriceProposed, Negotiating) => rule(A::Client, None),
        (Negotiating, PriceProposed) => rule(A::Reviewer, Some(R::ProposedPrice)),
        (PriceProposed | Negotiating, Accepted) => rule(A::Client, None),
        (PriceProposed | Negotiating, Rejected) => rule(A::Client, None),
        (Accepted, PaymentPending) => rule(A::ClientOrReviewer, None),
        (PaymentPending, PaymentUploaded) => rule(A::Client, Some(R::PaymentProof)),
        (PaymentUploaded, PaymentVerified) => rule(A::Finance, None),
        (PaymentUploaded, PaymentPending) => rule(A::Finance, None),
        (PaymentVerified, InProgress) => rule(A::Reviewer, None),
        (InProgress, Completed) => rule(A::Reviewer, None),
        (
            PendingReview | UnderReview | PriceProposed | Negotiating | Accepted | PaymentPending,
            Cancelled,
        ) => rule(A::ClientOrAdmin, None),
        _ => None,
    }
}

/// Statuses reachable from `from` in one step
pub fn next_statuses(from: AssignmentStatus) -> Vec<AssignmentStatus> {
    AssignmentStatus::ALL
        .into_iter()
        .filter(|to| transition_rule(from, *to).is_some())
        .collect()
}

/// A client's consultation request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentRequest {
    pub id: i64,
    pub client_id: i64,
    /// Joined from the owning user on reads
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_name: Option<String>,
    pub title: String,
    pub subject: String,
    pub description: String,
    pub status: AssignmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proposed_price: Option<Money>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_price: Option<Money>,
    pub currency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doctor_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub has_attachment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_proof_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One recorded status change
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignmentEvent {
    pub id: i64,
    pub assignment_id: i64,
    pub actor_id: Option<i64>,
    pub from_status: AssignmentStatus,
    pub to_status: AssignmentStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Assignment plus its display info, as returned by the API
#[derive(Debug, Clone, Serialize)]
pub struct AssignmentView {
    #[serde(flatten)]
    pub assignment: AssignmentRequest,
    pub status_info: StatusInfo,
    pub next_statuses: Vec<AssignmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<AssignmentEvent>>,
}

impl From<AssignmentRequest> for AssignmentView {
    fn from(assignment: AssignmentRequest) -> Self {
        Self {
            status_info: assignment.status.info(),
            next_statuses: next_statuses(assignment.status),
            assignment,
            events: None,
        }
    }
}

/// Input for a new request
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAssignmentInput {
    pub title: String,
    pub subject: String,
    pub description: String,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub client_notes: Option<String>,
    #[serde(default)]
    pub attachment_url: Option<String>,
}

/// Body of `PUT /api/assignment-requests/{id}/status`
#[derive(Debug, Clone, Deserialize)]
pub struct TransitionInput {
    pub status: AssignmentStatus,
    /// Status the caller saw; a mismatch is a conflict
    #[serde(default)]
    pub expected_status: Option<AssignmentStatus>,
    #[serde(default)]
    pub proposed_price: Option<Money>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub payment_proof_url: Option<String>,
    #[serde(default)]
    pub doctor_notes: Option<String>,
    #[serde(default)]
    pub client_notes: Option<String>,
    /// Free text stored on the audit event
    #[serde(default)]
    pub note: Option<String>,
}

impl TransitionInput {
    pub fn to(status: AssignmentStatus) -> Self {
        Self {
            status,
            expected_status: None,
            proposed_price: None,
            currency: None,
            reason: None,
            payment_proof_url: None,
            doctor_notes: None,
            client_notes: None,
            note: None,
        }
    }
}

/// Column changes applied together with a status change. `None` leaves
/// the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentPatch {
    pub proposed_price: Option<Money>,
    pub final_price: Option<Money>,
    pub currency: Option<String>,
    pub doctor_name: Option<String>,
    pub doctor_notes: Option<String>,
    pub client_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub payment_proof_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UserRole;
    use proptest::prelude::*;
    use AssignmentStatus::*;

    fn user(id: i64, role: UserRole) -> User {
        let mut user = User::new(format!("{}@test.com", id), "T".to_string(), "h".to_string(), role);
        user.id = id;
        user
    }

    #[test]
    fn test_status_roundtrip() {
        for status in AssignmentStatus::ALL {
            assert_eq!(AssignmentStatus::from_str(status.as_str()).unwrap(), status);
            let json = serde_json::to_value(status).unwrap();
            assert_eq!(json, status.as_str());
        }
        assert!(AssignmentStatus::from_str("done").is_err());
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        for status in [Completed, Rejected, Cancelled] {
            assert!(status.is_terminal());
            assert!(next_statuses(status).is_empty());
        }
    }

    #[test]
    fn test_happy_path_is_connected() {
        let path = [
            PendingReview,
            UnderReview,
            PriceProposed,
            Negotiating,
            PriceProposed,
            Accepted,
            PaymentPending,
            PaymentUploaded,
            PaymentVerified,
            InProgress,
            Completed,
        ];
        for pair in path.windows(2) {
            assert!(
                transition_rule(pair[0], pair[1]).is_some(),
                "{} -> {} should be allowed",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn test_skipping_states_refused() {
        assert!(transition_rule(PendingReview, Completed).is_none());
        assert!(transition_rule(PriceProposed, PaymentVerified).is_none());
        assert!(transition_rule(PaymentUploaded, Cancelled).is_none());
        assert!(transition_rule(InProgress, Rejected).is_none());
    }

    #[test]
    fn test_requirements() {
        assert_eq!(
            transition_rule(UnderReview, PriceProposed).unwrap().requires,
            Some(TransitionRequirement::ProposedPrice)
        );
        assert_eq!(
            transition_rule(PendingReview, Rejected).unwrap().requires,
            Some(TransitionRequirement::Reason)
        );
        assert_eq!(transition_rule(Negotiating, Rejected).unwrap().requires, None);
        assert_eq!(
            transition_rule(PaymentPending, PaymentUploaded).unwrap().requires,
            Some(TransitionRequirement::PaymentProof)
        );
    }

    #[test]
    fn test_actor_permissions() {
        let owner = user(1, UserRole::Client);
        let other_client = user(2, UserRole::Client);
        let consultant = user(3, UserRole::Consultant);
        let accountant = user(4, UserRole::Accountant);
        let admin = user(5, UserRole::Admin);

        assert!(TransitionActor::Client.permits(&owner, 1));
        assert!(!TransitionActor::Client.permits(&other_client, 1));
        assert!(!TransitionActor::Client.permits(&consultant, 1));
        assert!(TransitionActor::Client.permits(&admin, 1));

        assert!(TransitionActor::Reviewer.permits(&consultant, 1));
        assert!(!TransitionActor::Reviewer.permits(&accountant, 1));
        assert!(!TransitionActor::Reviewer.permits(&owner, 1));

        assert!(TransitionActor::Finance.permits(&accountant, 1));
        assert!(!TransitionActor::Finance.permits(&consultant, 1));

        assert!(TransitionActor::ClientOrReviewer.permits(&owner, 1));
        assert!(TransitionActor::ClientOrReviewer.permits(&consultant, 1));
        assert!(!TransitionActor::ClientOrAdmin.permits(&consultant, 1));
        assert!(TransitionActor::ClientOrAdmin.permits(&admin, 1));
    }

    #[test]
    fn test_status_info_table_complete() {
        for status in AssignmentStatus::ALL {
            let info = status.info();
            assert_eq!(info.status, status);
            assert!(!info.label.is_empty());
            assert!(!info.color.is_empty());
            assert!(!info.icon.is_empty());
        }
        assert_eq!(PendingReview.info().label, "Pending Review");
    }

    #[test]
    fn test_view_omits_missing_prices() {
        let now = Utc::now();
        let assignment = AssignmentRequest {
            id: 1,
            client_id: 1,
            client_name: None,
            title: "t".to_string(),
            subject: "s".to_string(),
            description: "d".to_string(),
            status: PendingReview,
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
        };
        let json = serde_json::to_value(AssignmentView::from(assignment)).unwrap();
        assert!(json.get("proposed_price").is_none());
        assert!(json.get("final_price").is_none());
        assert_eq!(json["status"], "pending_review");
        assert_eq!(json["status_info"]["color"], "yellow");
        assert_eq!(json["next_statuses"].as_array().unwrap().len(), 4);
    }

    fn status_strategy() -> impl Strategy<Value = AssignmentStatus> {
        prop::sample::select(AssignmentStatus::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn terminal_states_never_transition(from in status_strategy(), to in status_strategy()) {
            if from.is_terminal() {
                prop_assert!(transition_rule(from, to).is_none());
            }
        }

        #[test]
        fn no_self_loops(status in status_strategy()) {
            prop_assert!(transition_rule(status, status).is_none());
        }

        #[test]
        fn cancellation_only_before_payment_upload(from in status_strategy()) {
            let allowed = transition_rule(from, Cancelled).is_some();
            let early = matches!(
                from,
                PendingReview | UnderReview | PriceProposed | Negotiating | Accepted | PaymentPending
            );
            prop_assert_eq!(allowed, early);
        }

        #[test]
        fn clients_never_take_reviewer_edges(from in status_strategy(), to in status_strategy()) {
            let client = user(10, UserRole::Client);
            if let Some(rule) = transition_rule(from, to) {
                if rule.actor == TransitionActor::Reviewer || rule.actor == TransitionActor::Finance {
                    prop_assert!(!rule.actor.permits(&client, 10));
                }
            }
        }
    }
}
