//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles persistence for a specific entity.

pub mod assignment;
pub mod donation;
pub mod hero_image;
pub mod partner;
pub mod payment_settings;
pub mod research;
pub mod researcher_profile;
pub mod session;
pub mod team_application;
pub mod team_member;
pub mod user;

pub use assignment::{AssignmentRepository, SqlxAssignmentRepository, StatusChange};
pub use donation::{DonationRepository, SqlxDonationRepository};
pub use hero_image::{HeroImageRepository, SqlxHeroImageRepository};
pub use partner::{PartnerRepository, SqlxPartnerRepository};
pub use payment_settings::{PaymentSettingsRepository, SqlxPaymentSettingsRepository};
pub use research::{ResearchRepository, SqlxResearchRepository};
pub use researcher_profile::{ResearcherProfileRepository, SqlxResearcherProfileRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use team_application::{SqlxTeamApplicationRepository, TeamApplicationRepository};
pub use team_member::{SqlxTeamMemberRepository, TeamMemberRepository};
pub use user::{SqlxUserRepository, UserRepository};
