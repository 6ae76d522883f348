//! HTTP error type for wtr-web handlers

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// API error type
///
/// Every variant renders as `{"error": message}`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Conflict (409): duplicate slug, insufficient stock, job not retryable
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Missing or bad credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// wtr-common error, mapped by variant
    #[error(transparent)]
    Common(#[from] wtr_common::Error),
}

impl ApiError {
    fn status_and_message(self) -> (StatusCode, String) {
        use wtr_common::Error as CommonError;

        match self {
            ApiError::NotFound(msg) | ApiError::Common(CommonError::NotFound(msg)) => {
                (StatusCode::NOT_FOUND, format!("Not found: {}", msg))
            }
            ApiError::BadRequest(msg) | ApiError::Common(CommonError::InvalidInput(msg)) => {
                (StatusCode::BAD_REQUEST, msg)
            }
            ApiError::Conflict(msg) | ApiError::Common(CommonError::Conflict(msg)) => {
                (StatusCode::CONFLICT, msg)
            }
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
            ApiError::Common(err) => {
                error!("Request failed: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_common_errors_map_to_status() {
        let cases = [
            (wtr_common::Error::NotFound("x".into()), StatusCode::NOT_FOUND),
            (wtr_common::Error::InvalidInput("x".into()), StatusCode::BAD_REQUEST),
            (wtr_common::Error::Conflict("x".into()), StatusCode::CONFLICT),
            (wtr_common::Error::Internal("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_internal_details_are_hidden() {
        let (status, message) =
            ApiError::Internal("db path /secret".into()).status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message, "Internal server error");
    }
}
