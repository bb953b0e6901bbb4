//! Data models
//!
//! Database entities, their status enums, and the input types the API
//! deserializes request bodies into.

mod assignment;
mod hero_image;
mod listing;
mod money;
mod partner;
mod payment;
mod research;
mod researcher;
mod session;
mod team;
mod user;

pub use assignment::{
    next_statuses, transition_rule, AssignmentEvent, AssignmentPatch, AssignmentRequest,
    AssignmentStatus, AssignmentView, CreateAssignmentInput, StatusInfo, TransitionActor,
    TransitionInput, TransitionRequirement, TransitionRule,
};
pub use hero_image::{DisplayOrder, HeroImage, HeroImageInput};
pub use listing::{ListParams, ListQuery, PagedResult, SortOrder, DEFAULT_PER_PAGE, MAX_PER_PAGE};
pub use money::Money;
pub use partner::{Partner, PartnerInput, PartnerStatus};
pub use payment::{CreateDonationInput, DonationInquiry, DonationStatus, PaymentSettings};
pub use research::{CreateResearchInput, ResearchPaper, ResearchStatus, UpdateResearchInput};
pub use researcher::{
    RateResearcherInput, Researcher, ResearcherProfile, UpdateResearcherProfileInput,
};
pub use session::Session;
pub use team::{ApplicationStatus, CreateApplicationInput, TeamApplication, TeamMember, TeamMemberInput};
pub use user::{CreateUserInput, UpdateUserInput, User, UserRole, UserStatus};
