//! Authentication API endpoints
//!
//! - POST /api/auth/register - Client self-registration
//! - POST /api/auth/login - Email + password login
//! - POST /api/auth/logout - Drop the current session
//! - GET /api/auth/me - Current user

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{extract_session_token, ApiError, AppJson, AppState, AuthenticatedUser};
use crate::api::responses::AuthResponse;
use crate::models::{Session, User};
use crate::services::{LoginInput, RegisterInput};

/// Routes that need no session
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
}

/// POST /api/auth/register
///
/// Always creates a client account and signs it in.
async fn register(
    State(state): State<AppState>,
    AppJson(body): AppJson<RegisterInput>,
) -> Result<impl IntoResponse, ApiError> {
    let password = body.password.clone();
    let user = state.user_service.register(body).await?;

    let (session, user) = state
        .user_service
        .login(LoginInput::new(user.email, password))
        .await?;

    Ok((StatusCode::CREATED, session_response(session, user)))
}

/// POST /api/auth/login
async fn login(
    State(state): State<AppState>,
    AppJson(body): AppJson<LoginInput>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, user) = state.user_service.login(body).await?;
    Ok(session_response(session, user))
}

/// POST /api/auth/logout
async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((response_headers, StatusCode::NO_CONTENT))
}

/// GET /api/auth/me
async fn me(AuthenticatedUser(user): AuthenticatedUser) -> Json<User> {
    Json(user)
}

/// Body plus a `session` cookie for browser clients
fn session_response(session: Session, user: User) -> impl IntoResponse {
    let max_age = (session.expires_at - session.created_at).num_seconds().max(0);
    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id, max_age
    );

    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(header::SET_COOKIE, value);
    }

    (
        headers,
        Json(AuthResponse {
            token: session.id,
            expires_at: session.expires_at,
            user,
        }),
    )
}
