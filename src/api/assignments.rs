//! Assignment request workflow
//!
//! - GET /api/assignment-requests/statuses (public status table)
//! - POST /api/assignment-requests (clients)
//! - GET /api/assignment-requests (own for clients, all for staff)
//! - GET /api/assignment-requests/{id}
//! - PUT /api/assignment-requests/{id}/status
//! - DELETE /api/assignment-requests/{id} (admin)
//! - GET /api/management/assignments (reviewers)
//!
//! Who may take which edge is decided by the service; handlers only pass
//! the caller along.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppJson, AppPath, AppQuery, AppState, AuthenticatedUser};
use crate::models::{
    AssignmentView, CreateAssignmentInput, ListQuery, PagedResult, StatusInfo, TransitionInput,
};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/statuses", get(statuses))
}

pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list))
        .route("/{id}", get(get_one))
        .route("/{id}/status", put(transition))
}

pub fn client_router() -> Router<AppState> {
    Router::new().route("/", post(create))
}

pub fn admin_router() -> Router<AppState> {
    Router::new().route("/{id}", delete(delete_one))
}

/// Mounted at /api/management/assignments
pub fn reviewer_router() -> Router<AppState> {
    Router::new().route("/", get(list))
}

async fn statuses(State(state): State<AppState>) -> Json<Vec<StatusInfo>> {
    Json(state.assignment_service.statuses())
}

async fn create(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<CreateAssignmentInput>,
) -> Result<(StatusCode, Json<AssignmentView>), ApiError> {
    let view = state.assignment_service.create(&user, body).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn list(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<PagedResult<AssignmentView>>, ApiError> {
    Ok(Json(state.assignment_service.list_for(&user, &query).await?))
}

async fn get_one(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<AssignmentView>, ApiError> {
    Ok(Json(state.assignment_service.get_for(&user, id).await?))
}

async fn transition(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<TransitionInput>,
) -> Result<Json<AssignmentView>, ApiError> {
    Ok(Json(
        state.assignment_service.transition(&user, id, body).await?,
    ))
}

async fn delete_one(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.assignment_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
