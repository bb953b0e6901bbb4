//! Own-account endpoints
//!
//! - GET/PUT /api/profile
//! - PUT /api/profile/password
//! - GET/PUT /api/profile/researcher (consultants and researchers)

use axum::{
    extract::State,
    routing::get,
    routing::put,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppJson, AppState, AuthenticatedUser};
use crate::api::responses::MessageResponse;
use crate::models::{ResearcherProfile, UpdateResearcherProfileInput, User};
use crate::services::{ChangePasswordInput, UpdateProfileInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_profile).put(update_profile))
        .route("/password", put(change_password))
}

/// Mounted behind `require_researcher`
pub fn researcher_router() -> Router<AppState> {
    Router::new().route(
        "/researcher",
        get(get_researcher_profile).put(update_researcher_profile),
    )
}

async fn get_profile(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}

async fn update_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<UpdateProfileInput>,
) -> Result<Json<User>, ApiError> {
    let updated = state.user_service.update_profile(user.id, body).await?;
    Ok(Json(updated))
}

async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<ChangePasswordInput>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.user_service.change_password(user.id, body).await?;
    Ok(Json(MessageResponse::new("Password updated")))
}

async fn get_researcher_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<ResearcherProfile>, ApiError> {
    Ok(Json(state.researcher_service.own_profile(&user).await?))
}

async fn update_researcher_profile(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<UpdateResearcherProfileInput>,
) -> Result<Json<ResearcherProfile>, ApiError> {
    Ok(Json(state.researcher_service.update_own(&user, body).await?))
}
