//! Error types for vinculo-server
//!
//! Handler errors render as `{"error": {"code", "message"}}`. Access checks never use
//! this path: they fail closed to the paywall instead of returning an error.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::payments::PaymentError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Missing credentials or price ids (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Payment provider failure (502)
    #[error("Payment provider error: {0}")]
    Upstream(#[from] PaymentError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// vinculo-common error
    #[error("Common error: {0}")]
    Common(#[from] vinculo_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", msg),
            ApiError::Upstream(ref err) => (StatusCode::BAD_GATEWAY, "PAYMENT_PROVIDER_ERROR", err.to_string()),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Common(err) => match err {
                vinculo_common::Error::InvalidInput(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
                vinculo_common::Error::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
                vinculo_common::Error::Config(msg) => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR", msg)
                }
                other => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR", other.to_string()),
            },
        };

        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", message);
        }

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
