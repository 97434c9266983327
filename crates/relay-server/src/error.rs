use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::response::ApiResponse;

/// HTTP-level errors. `/process` never produces these; its failures are in-band.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Upload error: {0}")]
    Upload(#[from] MultipartError),
    #[error("Bad Request: {0}")]
    BadRequest(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::Upload(_) => (StatusCode::INTERNAL_SERVER_ERROR, "UploadError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
        };

        let error_message = match &self {
            ApiError::Upload(e) => format!("Failed to read uploaded audio: {}", e.body_text()),
            ApiError::BadRequest(msg) => msg.clone(),
        };
        tracing::error!("{}: {}", error_type, error_message);

        let response = ApiResponse::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}
