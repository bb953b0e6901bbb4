//! API middleware
//!
//! Contains:
//! - Application state shared by every handler
//! - The error body every failed request returns
//! - Authentication (session token validation)
//! - Role gates layered per router

use axum::{
    extract::{rejection::JsonRejection, rejection::PathRejection, rejection::QueryRejection},
    extract::{FromRequest, FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::cache::SharedCache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxAssignmentRepository, SqlxDonationRepository, SqlxHeroImageRepository,
    SqlxPartnerRepository, SqlxPaymentSettingsRepository, SqlxResearchRepository,
    SqlxResearcherProfileRepository, SqlxSessionRepository, SqlxTeamApplicationRepository,
    SqlxTeamMemberRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::services::{
    AssignmentService, AssignmentServiceError, HeroImageService, HeroImageServiceError,
    LoginRateLimiter, PartnerService, PartnerServiceError, PaymentService, PaymentServiceError,
    ResearchService, ResearchServiceError, ResearcherService, ResearcherServiceError,
    StatsService, StatsServiceError, TeamService, TeamServiceError, UploadService,
    UploadServiceError, UserService, UserServiceError,
};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub assignment_service: Arc<AssignmentService>,
    pub research_service: Arc<ResearchService>,
    pub researcher_service: Arc<ResearcherService>,
    pub team_service: Arc<TeamService>,
    pub partner_service: Arc<PartnerService>,
    pub hero_image_service: Arc<HeroImageService>,
    pub payment_service: Arc<PaymentService>,
    pub stats_service: Arc<StatsService>,
    pub upload_service: Arc<UploadService>,
}

impl AppState {
    /// Wire repositories and services over one pool and cache
    pub fn new(pool: DynDatabasePool, config: Config, cache: SharedCache) -> Self {
        let users = SqlxUserRepository::boxed(pool.clone());
        let research = SqlxResearchRepository::boxed(pool.clone());
        let assignments = SqlxAssignmentRepository::boxed(pool.clone());
        let partners = SqlxPartnerRepository::boxed(pool.clone());
        let applications = SqlxTeamApplicationRepository::boxed(pool.clone());
        let donations = SqlxDonationRepository::boxed(pool.clone());

        let rate_limiter = Arc::new(LoginRateLimiter::from_config(&config.auth));
        let user_service = UserService::with_session_expiration(
            users.clone(),
            SqlxSessionRepository::boxed(pool.clone()),
            rate_limiter,
            config.auth.session_days,
        );

        Self {
            user_service: Arc::new(user_service),
            assignment_service: Arc::new(AssignmentService::new(assignments.clone())),
            research_service: Arc::new(ResearchService::new(research.clone())),
            researcher_service: Arc::new(ResearcherService::new(
                users.clone(),
                SqlxResearcherProfileRepository::boxed(pool.clone()),
                research.clone(),
                cache.clone(),
            )),
            team_service: Arc::new(TeamService::new(
                SqlxTeamMemberRepository::boxed(pool.clone()),
                applications.clone(),
                cache.clone(),
            )),
            partner_service: Arc::new(PartnerService::new(partners.clone(), cache.clone())),
            hero_image_service: Arc::new(HeroImageService::new(
                SqlxHeroImageRepository::boxed(pool.clone()),
                cache,
            )),
            payment_service: Arc::new(PaymentService::new(
                SqlxPaymentSettingsRepository::boxed(pool.clone()),
                donations.clone(),
            )),
            stats_service: Arc::new(StatsService::new(
                users,
                assignments,
                research,
                partners,
                applications,
                donations,
            )),
            upload_service: Arc::new(UploadService::new(config.upload.clone())),
            config: Arc::new(config),
            pool,
        }
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error body: `{"error": "<message>", "code": "<CODE>"}`
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code,
        }
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::new("INVALID_TRANSITION", message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new("PAYLOAD_TOO_LARGE", message)
    }

    pub fn too_many_requests(message: impl Into<String>) -> Self {
        Self::new("TOO_MANY_REQUESTS", message)
    }

    /// Logs the cause; the client only sees a generic message
    pub fn internal_error(cause: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", cause);
        Self::new("INTERNAL_ERROR", "Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.code {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" | "INVALID_TRANSITION" => StatusCode::CONFLICT,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            "TOO_MANY_REQUESTS" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return Self::payload_too_large(rejection.body_text());
        }
        Self::validation_error(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation_error(rejection.body_text())
    }
}

/// `Json` whose rejection uses the API error body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// `Path` whose rejection uses the API error body
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct AppPath<T>(pub T);

/// `Query` whose rejection uses the API error body
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct AppQuery<T>(pub T);

impl From<UserServiceError> for ApiError {
    fn from(e: UserServiceError) -> Self {
        match e {
            UserServiceError::AuthenticationError(msg) => Self::unauthorized(msg),
            UserServiceError::ValidationError(msg) => Self::validation_error(msg),
            UserServiceError::UserExists(msg) => Self::conflict(msg),
            UserServiceError::NotFound => Self::not_found(e.to_string()),
            UserServiceError::AccountDisabled(msg) => Self::forbidden(msg),
            UserServiceError::RateLimited => Self::too_many_requests(e.to_string()),
            UserServiceError::InternalError(cause) => Self::internal_error(cause),
        }
    }
}

impl From<AssignmentServiceError> for ApiError {
    fn from(e: AssignmentServiceError) -> Self {
        match e {
            AssignmentServiceError::NotFound => Self::not_found(e.to_string()),
            AssignmentServiceError::Forbidden(msg) => Self::forbidden(msg),
            AssignmentServiceError::ValidationError(msg) => Self::validation_error(msg),
            AssignmentServiceError::InvalidTransition { .. } => {
                Self::invalid_transition(e.to_string())
            }
            AssignmentServiceError::Conflict(msg) => Self::conflict(msg),
            AssignmentServiceError::InternalError(cause) => Self::internal_error(cause),
        }
    }
}

impl From<ResearchServiceError> for ApiError {
    fn from(e: ResearchServiceError) -> Self {
        match e {
            ResearchServiceError::NotFound => Self::not_found(e.to_string()),
            ResearchServiceError::Forbidden(msg) => Self::forbidden(msg),
            ResearchServiceError::ValidationError(msg) => Self::validation_error(msg),
            ResearchServiceError::Conflict(msg) => Self::conflict(msg),
            ResearchServiceError::InternalError(cause) => Self::internal_error(cause),
        }
    }
}

impl From<ResearcherServiceError> for ApiError {
    fn from(e: ResearcherServiceError) -> Self {
        match e {
            ResearcherServiceError::NotFound => Self::not_found(e.to_string()),
            ResearcherServiceError::Forbidden(msg) => Self::forbidden(msg),
            ResearcherServiceError::ValidationError(msg) => Self::validation_error(msg),
            ResearcherServiceError::InternalError(cause) => Self::internal_error(cause),
        }
    }
}

impl From<TeamServiceError> for ApiError {
    fn from(e: TeamServiceError) -> Self {
        match e {
            TeamServiceError::MemberNotFound | TeamServiceError::ApplicationNotFound => {
                Self::not_found(e.to_string())
            }
            TeamServiceError::ValidationError(msg) => Self::validation_error(msg),
            TeamServiceError::InternalError(cause) => Self::internal_error(cause),
        }
    }
}

impl From<PartnerServiceError> for ApiError {
    fn from(e: PartnerServiceError) -> Self {
        match e {
            PartnerServiceError::NotFound => Self::not_found(e.to_string()),
            PartnerServiceError::ValidationError(msg) => Self::validation_error(msg),
            PartnerServiceError::InvalidTransition { .. } => Self::invalid_transition(e.to_string()),
            PartnerServiceError::Conflict(msg) => Self::conflict(msg),
            PartnerServiceError::InternalError(cause) => Self::internal_error(cause),
        }
    }
}

impl From<HeroImageServiceError> for ApiError {
    fn from(e: HeroImageServiceError) -> Self {
        match e {
            HeroImageServiceError::NotFound => Self::not_found(e.to_string()),
            HeroImageServiceError::ValidationError(msg) => Self::validation_error(msg),
            HeroImageServiceError::InternalError(cause) => Self::internal_error(cause),
        }
    }
}

impl From<PaymentServiceError> for ApiError {
    fn from(e: PaymentServiceError) -> Self {
        match e {
            PaymentServiceError::NotFound => Self::not_found(e.to_string()),
            PaymentServiceError::ValidationError(msg) => Self::validation_error(msg),
            PaymentServiceError::InternalError(cause) => Self::internal_error(cause),
        }
    }
}

impl From<StatsServiceError> for ApiError {
    fn from(e: StatsServiceError) -> Self {
        match e {
            StatsServiceError::InternalError(cause) => Self::internal_error(cause),
        }
    }
}

impl From<UploadServiceError> for ApiError {
    fn from(e: UploadServiceError) -> Self {
        match e {
            UploadServiceError::UnknownKind(_) => Self::not_found(e.to_string()),
            UploadServiceError::Empty | UploadServiceError::UnsupportedType { .. } => {
                Self::validation_error(e.to_string())
            }
            UploadServiceError::TooLarge { .. } => Self::payload_too_large(e.to_string()),
            UploadServiceError::InternalError(cause) => Self::internal_error(cause),
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Session token from `Authorization: Bearer` or the `session` cookie
pub(crate) fn extract_session_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

async fn gate(
    request: Request,
    next: Next,
    allowed: fn(&User) -> bool,
    message: &'static str,
) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !allowed(&user.0) {
        return Err(ApiError::forbidden(message));
    }
    Ok(next.run(request).await)
}

pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    gate(request, next, User::is_admin, "Admin privileges required").await
}

/// Management or admin
pub async fn require_management(request: Request, next: Next) -> Result<Response, ApiError> {
    gate(request, next, User::is_management, "Management privileges required").await
}

/// Consultant, management or admin
pub async fn require_reviewer(request: Request, next: Next) -> Result<Response, ApiError> {
    gate(request, next, User::is_reviewer, "Reviewer privileges required").await
}

/// Consultant or researcher
pub async fn require_researcher(request: Request, next: Next) -> Result<Response, ApiError> {
    gate(
        request,
        next,
        User::is_researcher,
        "Only consultants and researchers can do this",
    )
    .await
}

pub async fn require_client(request: Request, next: Next) -> Result<Response, ApiError> {
    gate(
        request,
        next,
        |user| user.role == UserRole::Client,
        "Only clients can do this",
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;

    fn headers(pairs: &[(header::HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), value.parse().unwrap());
        }
        map
    }

    #[test]
    fn test_extract_session_token_from_bearer() {
        let map = headers(&[(header::AUTHORIZATION, "Bearer test-token-123")]);
        assert_eq!(extract_session_token(&map), Some("test-token-123".to_string()));
    }

    #[test]
    fn test_extract_session_token_from_cookie() {
        let map = headers(&[(header::COOKIE, "theme=dark; session=test-token-456")]);
        assert_eq!(extract_session_token(&map), Some("test-token-456".to_string()));
    }

    #[test]
    fn test_extract_session_token_bearer_priority() {
        let map = headers(&[
            (header::AUTHORIZATION, "Bearer bearer-token"),
            (header::COOKIE, "session=cookie-token"),
        ]);
        assert_eq!(extract_session_token(&map), Some("bearer-token".to_string()));
    }

    #[test]
    fn test_extract_session_token_none() {
        assert!(extract_session_token(&HeaderMap::new()).is_none());
        let basic = headers(&[(header::AUTHORIZATION, "Basic invalid")]);
        assert!(extract_session_token(&basic).is_none());
        let empty_cookie = headers(&[(header::COOKIE, "session=")]);
        assert!(extract_session_token(&empty_cookie).is_none());
    }

    #[test]
    fn test_error_codes_map_to_status() {
        assert_eq!(ApiError::validation_error("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::unauthorized("x").status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::forbidden("x").status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::not_found("x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("x").status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::invalid_transition("x").status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::payload_too_large("x").status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            ApiError::too_many_requests("x").status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::internal_error("boom").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_body_shape() {
        let body = serde_json::to_value(ApiError::conflict("Request changed")).unwrap();
        assert_eq!(body, serde_json::json!({"error": "Request changed", "code": "CONFLICT"}));
    }

    #[test]
    fn test_internal_error_hides_cause() {
        let error: ApiError =
            UserServiceError::InternalError(anyhow::anyhow!("database is locked")).into();
        assert_eq!(error.code, "INTERNAL_ERROR");
        assert!(!error.error.contains("locked"));
    }

    #[test]
    fn test_service_errors_map() {
        let error: ApiError = AssignmentServiceError::InvalidTransition {
            from: crate::models::AssignmentStatus::PendingReview,
            to: crate::models::AssignmentStatus::Completed,
        }
        .into();
        assert_eq!(error.code, "INVALID_TRANSITION");

        let error: ApiError = UserServiceError::RateLimited.into();
        assert_eq!(error.status(), StatusCode::TOO_MANY_REQUESTS);

        let error: ApiError = UploadServiceError::TooLarge { max: 10 }.into();
        assert_eq!(error.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
