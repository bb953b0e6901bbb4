//! Response bodies that are not a bare model

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::User;

/// Successful login or registration
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Plain acknowledgement for writes that return nothing else
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// `/api/test-db` report
#[derive(Debug, Serialize)]
pub struct DbDiagnostics {
    pub connected: bool,
    pub driver: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    pub users: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
