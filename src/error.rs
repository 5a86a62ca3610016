use std::fmt;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Unified error type for the token service.
///
/// Each variant maps to an HTTP status code and an OAuth2 error code, and
/// produces a JSON response body of the form
/// `{"error": "<code>", "error_description": "<details>"}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    BadRequest(String),
    /// Unknown client, unknown refresh token or rejected user credentials.
    NoPermission(String),
    /// A credential was recognised but is no longer valid.
    Unauthorized(String),
    UnsupportedGrantType(String),
    Conflict(String),
    TooManyRequests(String),
    Internal(String),
}

impl AuthError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AuthError::BadRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            AuthError::NoPermission(_) => (StatusCode::FORBIDDEN, "access_denied"),
            AuthError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "invalid_grant"),
            AuthError::UnsupportedGrantType(_) => {
                (StatusCode::BAD_REQUEST, "unsupported_grant_type")
            }
            AuthError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            AuthError::TooManyRequests(_) => (StatusCode::TOO_MANY_REQUESTS, "too_many_requests"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error"),
        }
    }

    fn message(&self) -> String {
        match self {
            AuthError::UnsupportedGrantType(grant) => {
                format!("grant_type '{grant}' is not supported")
            }
            AuthError::BadRequest(msg)
            | AuthError::NoPermission(msg)
            | AuthError::Unauthorized(msg)
            | AuthError::Conflict(msg)
            | AuthError::TooManyRequests(msg)
            | AuthError::Internal(msg) => msg.clone(),
        }
    }
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthError::BadRequest(msg) => write!(f, "Bad Request: {msg}"),
            AuthError::NoPermission(msg) => write!(f, "No Permission: {msg}"),
            AuthError::Unauthorized(msg) => write!(f, "Unauthorized: {msg}"),
            AuthError::UnsupportedGrantType(grant) => {
                write!(f, "Unsupported Grant Type: {grant}")
            }
            AuthError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AuthError::TooManyRequests(msg) => write!(f, "Too Many Requests: {msg}"),
            AuthError::Internal(msg) => write!(f, "Internal Server Error: {msg}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.status_and_code();

        // Storage details stay in the logs.
        let description = match &self {
            AuthError::Internal(msg) => {
                tracing::error!(error = %msg, "token service internal error");
                "an unexpected error occurred".to_string()
            }
            _ => self.message(),
        };

        let body = json!({
            "error": error_code,
            "error_description": description,
        });

        (status, Json(body)).into_response()
    }
}
