//! Custom error types for the counter service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use session_store::SessionError;
use thiserror::Error;
use tracing::error;

/// Custom error type for the counter service
#[derive(Error, Debug)]
pub enum ApiError {
    /// Session store failure
    #[error("Session error: {0}")]
    Session(#[from] SessionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            ApiError::Session(SessionError::TooLarge { .. }) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "Session too large")
            }
            ApiError::Session(e) => {
                error!("Request failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
