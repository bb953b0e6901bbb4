//! Research publications
//!
//! Public:
//! - GET /api/research, GET /api/research/{id}, POST /api/research/{id}/like
//!
//! Authors (consultants and researchers):
//! - GET/POST /api/consultant/my-research
//! - PUT/DELETE /api/consultant/my-research/{id}
//! - POST /api/consultant/my-research/{id}/submit
//!
//! Management:
//! - GET /api/management/research
//! - PUT /api/management/research/{id}/approve | /reject | /archive

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::common::CategoryQuery;
use crate::api::middleware::{ApiError, AppJson, AppPath, AppQuery, AppState, AuthenticatedUser};
use crate::models::{
    CreateResearchInput, ListQuery, PagedResult, ResearchPaper, UpdateResearchInput,
};
use crate::services::RejectResearchInput;

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_published))
        .route("/{id}", get(view_published))
        .route("/{id}/like", post(like))
}

pub fn author_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_own).post(create_draft))
        .route("/{id}", put(update_draft).delete(delete_draft))
        .route("/{id}/submit", post(submit))
}

pub fn management_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all))
        .route("/{id}/approve", put(approve))
        .route("/{id}/reject", put(reject))
        .route("/{id}/archive", put(archive))
}

// ============================================================================
// Public
// ============================================================================

/// GET /api/research?q=&category=&sort=&page=
async fn list_published(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
    AppQuery(filter): AppQuery<CategoryQuery>,
) -> Result<Json<PagedResult<ResearchPaper>>, ApiError> {
    let papers = state
        .research_service
        .list_published(&query, filter.category.as_deref())
        .await?;
    Ok(Json(papers))
}

/// Counts as a view
async fn view_published(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ResearchPaper>, ApiError> {
    Ok(Json(state.research_service.view_published(id).await?))
}

async fn like(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ResearchPaper>, ApiError> {
    Ok(Json(state.research_service.like(id).await?))
}

// ============================================================================
// Authors
// ============================================================================

async fn list_own(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<PagedResult<ResearchPaper>>, ApiError> {
    Ok(Json(state.research_service.list_own(&user, &query).await?))
}

async fn create_draft(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppJson(body): AppJson<CreateResearchInput>,
) -> Result<(StatusCode, Json<ResearchPaper>), ApiError> {
    let paper = state.research_service.create_draft(&user, body).await?;
    Ok((StatusCode::CREATED, Json(paper)))
}

async fn update_draft(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateResearchInput>,
) -> Result<Json<ResearchPaper>, ApiError> {
    Ok(Json(
        state.research_service.update_draft(&user, id, body).await?,
    ))
}

async fn delete_draft(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.research_service.delete_draft(&user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn submit(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ResearchPaper>, ApiError> {
    Ok(Json(state.research_service.submit(&user, id).await?))
}

// ============================================================================
// Review
// ============================================================================

async fn list_all(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<PagedResult<ResearchPaper>>, ApiError> {
    Ok(Json(state.research_service.list_all(&query).await?))
}

async fn approve(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ResearchPaper>, ApiError> {
    Ok(Json(state.research_service.approve(&user, id).await?))
}

async fn reject(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<RejectResearchInput>,
) -> Result<Json<ResearchPaper>, ApiError> {
    Ok(Json(state.research_service.reject(&user, id, body).await?))
}

async fn archive(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(id): AppPath<i64>,
) -> Result<Json<ResearchPaper>, ApiError> {
    Ok(Json(state.research_service.archive(&user, id).await?))
}
