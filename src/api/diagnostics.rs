//! GET /api/test-db
//!
//! Reports which database the server is talking to and whether it answers.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};

use crate::api::middleware::AppState;
use crate::api::responses::DbDiagnostics;

// Fixed messages for the public report; the cause is only logged.
const PING_FAILED: &str = "Database did not answer";
const COUNT_FAILED: &str = "Could not count users";

pub fn router() -> Router<AppState> {
    Router::new().route("/test-db", get(test_db))
}

async fn test_db(State(state): State<AppState>) -> (StatusCode, Json<DbDiagnostics>) {
    let mut report = DbDiagnostics {
        connected: false,
        driver: state.pool.driver().to_string(),
        database: state.config.database.name.clone(),
        users: 0,
        error: None,
    };

    if let Err(e) = state.pool.ping().await {
        tracing::warn!("Database diagnostic failed: {:#}", e);
        report.error = Some(PING_FAILED.to_string());
        return (StatusCode::SERVICE_UNAVAILABLE, Json(report));
    }
    report.connected = true;

    match state.user_service.count_by_role().await {
        Ok(counts) => report.users = counts.iter().map(|(_, count)| count).sum(),
        Err(e) => {
            tracing::warn!("Database diagnostic could not count users: {}", e);
            report.error = Some(COUNT_FAILED.to_string());
        }
    }
    (StatusCode::OK, Json(report))
}
