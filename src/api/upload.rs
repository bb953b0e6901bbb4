//! Upload API endpoint
//!
//! - POST /api/upload/{kind}
//!
//! Accepts multipart/form-data with a single file field named "file".
//! The kind decides which content types are allowed.

use axum::{
    extract::{multipart::MultipartError, Multipart, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};

use crate::api::middleware::{ApiError, AppPath, AppState, AuthenticatedUser};
use crate::services::{UploadKind, UploadedFile};

pub fn router() -> Router<AppState> {
    Router::new().route("/{kind}", post(upload))
}

async fn upload(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    AppPath(kind): AppPath<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadedFile>), ApiError> {
    let kind: UploadKind = kind.parse()?;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        // Reject on the declared type before buffering the body
        state.upload_service.validate(kind, &content_type, 1)?;

        let data = field.bytes().await.map_err(multipart_error)?;
        let stored = state
            .upload_service
            .store(kind, &filename, &content_type, &data)
            .await?;
        tracing::debug!("User {} uploaded {}", user.id, stored.url);
        return Ok((StatusCode::CREATED, Json(stored)));
    }

    Err(ApiError::validation_error("No file provided"))
}

fn multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::payload_too_large(e.body_text())
    } else {
        ApiError::validation_error(e.body_text())
    }
}
