//! Admin authentication middleware
//!
//! Requests carry `x-wtr-timestamp` (epoch ms) and `x-wtr-signature`
//! (SHA-256 of `timestamp:METHOD:path:body:secret`). The query string is
//! not part of the signed path.

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::warn;
use wtr_common::api::auth::{
    validate_signature, validate_timestamp, ApiAuthError, SIGNATURE_HEADER, TIMESTAMP_HEADER,
};

use crate::AppState;

/// Largest admin request body read for signing
pub const MAX_SIGNED_BODY_BYTES: usize = 1024 * 1024;

/// Validate the request signature
///
/// A shared secret of 0 disables checking.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if state.shared_secret == 0 {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();

    let timestamp: i64 = header(&parts.headers, TIMESTAMP_HEADER)?
        .parse()
        .map_err(|_| AuthError::InvalidTimestamp("not an integer".to_string()))?;
    let signature = header(&parts.headers, SIGNATURE_HEADER)?.to_string();

    validate_timestamp(timestamp, wtr_common::time::now_ms()).map_err(|e| match e {
        ApiAuthError::InvalidTimestamp { reason, .. } => AuthError::InvalidTimestamp(reason),
        other => AuthError::Other(other.to_string()),
    })?;

    let body_bytes = axum::body::to_bytes(body, MAX_SIGNED_BODY_BYTES)
        .await
        .map_err(|e| AuthError::ParseError(format!("Failed to read body: {}", e)))?;

    validate_signature(
        &signature,
        timestamp,
        parts.method.as_str(),
        parts.uri.path(),
        &body_bytes,
        state.shared_secret,
    )
    .map_err(|e| match e {
        ApiAuthError::InvalidSignature {
            provided,
            calculated,
        } => {
            warn!(
                path = %parts.uri.path(),
                "Signature validation failed: provided={}, calculated={}",
                provided,
                calculated
            );
            AuthError::InvalidSignature
        }
        other => AuthError::Other(other.to_string()),
    })?;

    let request = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(request).await)
}

fn header<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, AuthError> {
    headers
        .get(name)
        .ok_or(AuthError::MissingHeader(name))?
        .to_str()
        .map_err(|_| AuthError::ParseError(format!("{} is not valid ASCII", name)))
}

/// Authentication failures
#[derive(Debug)]
pub enum AuthError {
    MissingHeader(&'static str),
    InvalidTimestamp(String),
    InvalidSignature,
    ParseError(String),
    Other(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthError::MissingHeader(name) => {
                (StatusCode::UNAUTHORIZED, format!("Missing {} header", name))
            }
            AuthError::InvalidTimestamp(reason) => (
                StatusCode::UNAUTHORIZED,
                format!("Invalid timestamp: {}", reason),
            ),
            AuthError::InvalidSignature => {
                (StatusCode::UNAUTHORIZED, "Invalid signature".to_string())
            }
            AuthError::ParseError(msg) => {
                (StatusCode::BAD_REQUEST, format!("Parse error: {}", msg))
            }
            AuthError::Other(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Authentication error: {}", msg),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
