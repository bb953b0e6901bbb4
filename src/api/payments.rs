//! Payment settings and donation inquiries
//!
//! - GET /api/payment-settings (public), PUT (admin)
//! - POST /api/donation-inquiry (public)
//! - GET /api/donation-inquiry, PUT /api/donation-inquiry/{id}/status (management)

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppJson, AppPath, AppQuery, AppState};
use crate::models::{
    CreateDonationInput, DonationInquiry, ListQuery, PagedResult, PaymentSettings,
};
use crate::services::DonationStatusInput;

pub fn public_settings_router() -> Router<AppState> {
    Router::new().route("/", get(get_settings))
}

pub fn admin_settings_router() -> Router<AppState> {
    Router::new().route("/", put(update_settings))
}

pub fn public_donations_router() -> Router<AppState> {
    Router::new().route("/", post(create_donation))
}

pub fn management_donations_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_donations))
        .route("/{id}/status", put(set_donation_status))
}

async fn get_settings(State(state): State<AppState>) -> Result<Json<PaymentSettings>, ApiError> {
    Ok(Json(state.payment_service.settings().await?))
}

async fn update_settings(
    State(state): State<AppState>,
    AppJson(body): AppJson<PaymentSettings>,
) -> Result<Json<PaymentSettings>, ApiError> {
    Ok(Json(state.payment_service.update_settings(body).await?))
}

async fn create_donation(
    State(state): State<AppState>,
    AppJson(body): AppJson<CreateDonationInput>,
) -> Result<(StatusCode, Json<DonationInquiry>), ApiError> {
    let inquiry = state.payment_service.create_donation(body).await?;
    Ok((StatusCode::CREATED, Json(inquiry)))
}

async fn list_donations(
    State(state): State<AppState>,
    AppQuery(query): AppQuery<ListQuery>,
) -> Result<Json<PagedResult<DonationInquiry>>, ApiError> {
    Ok(Json(state.payment_service.list_donations(&query).await?))
}

async fn set_donation_status(
    State(state): State<AppState>,
    AppPath(id): AppPath<i64>,
    AppJson(body): AppJson<DonationStatusInput>,
) -> Result<Json<DonationInquiry>, ApiError> {
    Ok(Json(
        state
            .payment_service
            .set_donation_status(id, body.status)
            .await?,
    ))
}
