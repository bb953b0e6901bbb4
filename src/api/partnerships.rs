//! Partnerships
//!
//! - POST /api/partnerships (public application, lands `pending`)
//! - GET /api/partnerships (public, published only)
//! - GET /api/partnerships/admin (management, every status)
//! - PUT /api/partnerships/{id}, DELETE /api/partnerships/{id}
//! - PUT /api/partnerships/{id}/approve | /publish | /reject

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppJson, AppPath, AppQuery, AppState};
use crate::models::{ListQuery, PagedResult, Partner, PartnerInput};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_published).post(apply))
}

pub fn management_router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(list_all))
        .route("/{id}", put(update).delete(delete))
        .route("/{id}/approve", put(approve))
        .route("/{id}/publish", put(publish))
        .route("/{id}/reject", put(reject))
}

async fn list_published(State(state): State<AppState>) -> Result<Json<Vec<Partner>>, ApiError> {
    Ok(Json(state.partner_service.list_published().await?))
}

async fn apply(
    State(state): State<AppState>,
    AppJson(body): AppJson<PartnerInput>,
) -> Result<(StatusCode, Json<Partner>), ApiError> {
    let partner = state.partner_service.apply(body).await?;
    Ok((StatusCode::CREATED, Json(partner)))
}

async fn list_all(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<PagedResult<Partner>>, ApiError> {
    Ok(Json(state.partner_service.list_all(&query).await?))
}

async fn update(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<PartnerInput>,
) -> Result<Json<Partner>, ApiError> {
    Ok(Json(state.partner_service.update(id, body).await?))
}

async fn approve(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Partner>, ApiError> {
    Ok(Json(state.partner_service.approve(id).await?))
}

async fn publish(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Partner>, ApiError> {
    Ok(Json(state.partner_service.publish(id).await?))
}

async fn reject(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<Partner>, ApiError> {
    Ok(Json(state.partner_service.reject(id).await?))
}

async fn delete(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.partner_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
