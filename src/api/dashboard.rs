//! Dashboard counters
//!
//! - GET /api/management/stats (management)
//! - GET /api/client/stats (clients)

use axum::{extract::State, routing::get, Json, Router};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::{ClientStats, ManagementStats};

pub fn management_router() -> Router<AppState> {
    Router::new().route("/stats", get(management_stats))
}

pub fn client_router() -> Router<AppState> {
    Router::new().route("/stats", get(client_stats))
}

async fn management_stats(
    State(state): State<AppState>,
) -> Result<Json<ManagementStats>, ApiError> {
    Ok(Json(state.stats_service.management().await?))
}

async fn client_stats(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<ClientStats>, ApiError> {
    Ok(Json(state.stats_service.client(&user).await?))
}
