//! Researcher directory
//!
//! - GET /api/researchers, /api/researchers/{id} (public)
//! - POST /api/researchers/{id}/rate (signed in)
//! - GET /api/admin/researchers, PUT /api/admin/researchers/{id} (management)

use axum::{
    extract::State,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppJson, AppPath, AppQuery, AppState};
use crate::models::{
    ListQuery, PagedResult, RateResearcherInput, Researcher, ResearcherProfile,
    UpdateResearcherProfileInput,
};

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_public))
        .route("/{id}", get(get_public))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/{id}/rate", post(rate))
}

pub fn management_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_admin))
        .route("/{id}", put(update_for))
}

async fn list_public(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<PagedResult<Researcher>>, ApiError> {
    Ok(Json(state.researcher_service.list_public(&query).await?))
}

async fn get_public(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Researcher>, ApiError> {
    Ok(Json(state.researcher_service.get_public(id).await?))
}

async fn rate(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<RateResearcherInput>,
) -> Result<Json<ResearcherProfile>, ApiError> {
    Ok(Json(state.researcher_service.rate(id, body.rating).await?))
}

async fn list_admin(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<PagedResult<Researcher>>, ApiError> {
    Ok(Json(state.researcher_service.list_admin(&query).await?))
}

async fn update_for(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<UpdateResearcherProfileInput>,
) -> Result<Json<Researcher>, ApiError> {
    Ok(Json(state.researcher_service.update_for(id, body).await?))
}
