//! Homepage hero carousel
//!
//! - GET /api/hero-images (public, active only)
//! - GET/POST /api/admin/hero-images
//! - PUT/DELETE /api/admin/hero-images/{id}
//! - PUT /api/admin/hero-images/{id}/toggle
//! - PUT /api/admin/hero-images/reorder

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppJson, AppPath, AppState};
use crate::models::{DisplayOrder, HeroImage, HeroImageInput};

pub fn public_router() -> Router<AppState> {
    Router::new().route("/", get(list_active))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_all).post(create))
        .route("/reorder", put(reorder))
        .route("/{id}", put(update).delete(delete))
        .route("/{id}/toggle", put(toggle))
}

async fn list_active(State(state): State<AppState>) -> Result<Json<Vec<HeroImage>>, ApiError> {
    Ok(Json(state.hero_image_service.list_active().await?))
}

async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<HeroImage>>, ApiError> {
    Ok(Json(state.hero_image_service.list_all().await?))
}

async fn create(
    State(state): State<AppState>,
    AppJson(body): AppJson<HeroImageInput>,
) -> Result<(StatusCode, Json<HeroImage>), ApiError> {
    let image = state.hero_image_service.create(body).await?;
    Ok((StatusCode::CREATED, Json(image)))
}

async fn update(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<HeroImageInput>,
) -> Result<Json<HeroImage>, ApiError> {
    Ok(Json(state.hero_image_service.update(id, body).await?))
}

async fn toggle(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<Json<HeroImage>, ApiError> {
    Ok(Json(state.hero_image_service.toggle(id).await?))
}

/// Body: `[{"id": 3, "display_order": 0}, ...]`
async fn reorder(
    State(state): State<AppState>,
    AppJson(body): AppJson<Vec<DisplayOrder>>,
) -> Result<Json<Vec<HeroImage>>, ApiError> {
    Ok(Json(state.hero_image_service.reorder(body).await?))
}

async fn delete(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
) -> Result<StatusCode, ApiError> {
    state.hero_image_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
