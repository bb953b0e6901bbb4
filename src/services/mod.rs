//! Services layer - Business logic
//!
//! One service per aggregate. Services:
//! - Enforce business rules and workflows
//! - Coordinate repositories and the cache
//! - Report failures as a per-service `thiserror` enum

pub mod assignment;
pub mod hero_image;
pub mod listing;
pub mod partner;
pub mod password;
pub mod payment;
pub mod rate_limiter;
pub mod research;
pub mod researcher;
pub mod stats;
pub mod team;
pub mod upload;
pub mod user;
pub mod validate;

pub use assignment::{AssignmentService, AssignmentServiceError};
pub use hero_image::{HeroImageService, HeroImageServiceError};
pub use listing::Listable;
pub use partner::{PartnerService, PartnerServiceError};
pub use password::{hash_password, verify_password};
pub use payment::{DonationStatusInput, PaymentService, PaymentServiceError};
pub use rate_limiter::LoginRateLimiter;
pub use research::{RejectResearchInput, ResearchService, ResearchServiceError};
pub use researcher::{ResearcherService, ResearcherServiceError};
pub use stats::{ClientStats, ManagementStats, StatsService, StatsServiceError};
pub use team::{ApplicationStatusInput, TeamService, TeamServiceError};
pub use upload::{UploadKind, UploadService, UploadServiceError, UploadedFile};
pub use user::{
    ChangePasswordInput, LoginInput, RegisterInput, UpdateProfileInput, UserService,
    UserServiceError,
};
