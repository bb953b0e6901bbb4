//! User administration (admin only)
//!
//! - GET/POST /api/admin/users
//! - GET/PUT/DELETE /api/admin/users/{id}
//! - PUT /api/admin/users/{id}/status

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::api::common::{RoleQuery, UserStatusInput};
use crate::api::middleware::{ApiError, AppJson, AppPath, AppQuery, AppState, AuthenticatedUser};
use crate::models::{CreateUserInput, ListQuery, PagedResult, UpdateUserInput, User};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
        .route("/{id}/status", put(set_status))
}

/// GET /api/admin/users?q=&status=&role=&page=&per_page=
async fn list_users(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
    AppQuery(filter): AppQuery<RoleQuery>,
) -> Result<Json<PagedResult<User>>, ApiError> {
    let users = state.user_service.search_users(&query, filter.role).await?;
    Ok(Json(users))
}

async fn create_user(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateUserInput>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state.user_service.create_user(body).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

async fn get_user(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.get_required(id).await?))
}

async fn update_user(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateUserInput>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(state.user_service.update_user(id, body, admin.id).await?))
}

/// PUT /api/admin/users/{id}/status
///
/// Anything but `active` revokes the user's sessions.
async fn set_status(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UserStatusInput>,
) -> Result<Json<User>, ApiError> {
    Ok(Json(
        state.user_service.set_status(id, body.status, admin.id).await?,
    ))
}

async fn delete_user(
    State(state): State<AppState>,
    AuthenticatedUser(admin): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.user_service.delete_user(id, admin.id).await?;
    Ok(StatusCode::NO_CONTENT)
}
