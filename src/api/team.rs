//! Team members and applications to join
//!
//! - GET /api/team-members (public; `?all=true` needs management)
//! - POST /api/team-members, PUT/DELETE /api/team-members/{id} (management)
//! - POST /api/team-applications (public)
//! - GET /api/team-applications, PUT /{id}/status, DELETE /{id} (management)

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::api::common::AllQuery;
use crate::api::middleware::{
    extract_session_token, ApiError, AppJson, AppPath, AppQuery, AppState,
};
use crate::models::{
    CreateApplicationInput, ListQuery, PagedResult, TeamApplication, TeamMember, TeamMemberInput,
};
use crate::services::ApplicationStatusInput;

pub fn public_members_router() -> Router<AppState> {
    Router::new().route("/", get(list_members))
}

pub fn management_members_router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_member))
        .route("/{id}", put(update_member).delete(delete_member))
}

pub fn public_applications_router() -> Router<AppState> {
    Router::new().route("/", post(apply))
}

pub fn management_applications_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_applications))
        .route("/{id}", delete(delete_application))
        .route("/{id}/status", put(review_application))
}

/// Inactive members are only listed for a signed-in manager
async fn list_members(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppQuery(query): AppQuery<AllQuery>,
) -> Result<Json<Vec<TeamMember>>, ApiError> {
    if query.all {
        let token = extract_session_token(&headers)
            .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
        let user = state
            .user_service
            .validate_session(&token)
            .await?
            .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;
        if !user.is_management() {
            return Err(ApiError::forbidden("Management privileges required"));
        }
    }
    Ok(Json(state.team_service.list_members(query.all).await?))
}

async fn create_member(
    State(state): State<AppState>,
    AppJson(body): AppJson<TeamMemberInput>,
) -> Result<(StatusCode, Json<TeamMember>), ApiError> {
    let member = state.team_service.create_member(body).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

async fn update_member(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<TeamMemberInput>,
) -> Result<Json<TeamMember>, ApiError> {
    Ok(Json(state.team_service.update_member(id, body).await?))
}

async fn delete_member(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.team_service.delete_member(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn apply(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateApplicationInput>,
) -> Result<(StatusCode, Json<TeamApplication>), ApiError> {
    let application = state.team_service.apply(body).await?;
    Ok((StatusCode::CREATED, Json(application)))
}

async fn list_applications(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<PagedResult<TeamApplication>>, ApiError> {
    Ok(Json(state.team_service.list_applications(&query).await?))
}

async fn review_application(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<ApplicationStatusInput>,
) -> Result<Json<TeamApplication>, ApiError> {
    Ok(Json(
        state.team_service.review_application(id, body.status).await?,
    ))
}

async fn delete_application(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.team_service.delete_application(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
