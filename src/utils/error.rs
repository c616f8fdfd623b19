// Unified API error type
// Every service returns ApiResult<T>; the IntoResponse impl maps the error
// taxonomy onto HTTP status codes at the handler boundary.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Target missing by both primary and natural key, or unknown record id
    #[error("{0}")]
    NotFound(String),

    /// Invalid state transition, unknown action, missing detail key, bad input
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),

    /// Underlying store returned an error; wrapped with the original message
    #[error("store error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn invalid_transition(status: &str, action: &str) -> Self {
        Self::BadRequest(format!(
            "Invalid state transition: cannot {} a recommendation in status '{}'",
            action, status
        ))
    }

    pub fn missing_detail(key: &str) -> Self {
        Self::BadRequest(format!("Missing required detail '{}' for this action", key))
    }

    pub fn unknown_action(action: &str) -> Self {
        Self::BadRequest(format!("Unknown action type: {}", action))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!("Request failed: {}", message);
        } else {
            tracing::debug!("Request rejected: {}", message);
        }

        let body = Json(json!({
            "success": false,
            "error": message,
        }));

        (status, body).into_response()
    }
}
