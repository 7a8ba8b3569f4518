//! Custom error types for the authentication service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use common::error::StoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Custom error type for authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    /// Unknown user or wrong password; the two are not distinguished
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// The account exists but `is_active` is false
    #[error("Account is disabled")]
    AccountDisabled,

    /// Malformed token, bad signature, wrong issuer, wrong type or expired
    #[error("Invalid or expired token")]
    InvalidToken,

    /// Token verifies but its jti is in the revocation store
    #[error("Token has been revoked")]
    RevokedToken,

    /// Unique-constraint violation
    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    /// Lookup miss where the caller required a record
    #[error("Not found")]
    NotFound,

    /// Bad request payload
    #[error("{0}")]
    Validation(String),

    /// Store unreachable or timed out after the retry
    #[error("Service temporarily unavailable: {0}")]
    Unavailable(String),

    /// Internal server error
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateKey(key) => AuthError::DuplicateKey(key),
            StoreError::NotFound => AuthError::NotFound,
            StoreError::Transient(msg) => AuthError::Unavailable(msg),
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::InvalidCredentials | AuthError::InvalidToken | AuthError::RevokedToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::AccountDisabled => StatusCode::FORBIDDEN,
            AuthError::DuplicateKey(_) => StatusCode::CONFLICT,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let error_message = match &self {
            AuthError::Unavailable(detail) => {
                error!("Store unavailable: {}", detail);
                "Service temporarily unavailable".to_string()
            }
            AuthError::Internal(detail) => {
                error!("Internal error: {}", detail);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for authentication results
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_map_onto_auth_errors() {
        assert!(matches!(
            AuthError::from(StoreError::DuplicateKey("users_username_key".to_string())),
            AuthError::DuplicateKey(key) if key == "users_username_key"
        ));
        assert!(matches!(
            AuthError::from(StoreError::NotFound),
            AuthError::NotFound
        ));
        assert!(matches!(
            AuthError::from(StoreError::Transient("timeout".to_string())),
            AuthError::Unavailable(_)
        ));
        assert!(matches!(
            AuthError::from(StoreError::Internal("bad".to_string())),
            AuthError::Internal(_)
        ));
    }

    #[test]
    fn status_codes() {
        let cases = [
            (AuthError::InvalidCredentials, StatusCode::UNAUTHORIZED),
            (AuthError::InvalidToken, StatusCode::UNAUTHORIZED),
            (AuthError::RevokedToken, StatusCode::UNAUTHORIZED),
            (AuthError::AccountDisabled, StatusCode::FORBIDDEN),
            (AuthError::DuplicateKey("k".to_string()), StatusCode::CONFLICT),
            (AuthError::NotFound, StatusCode::NOT_FOUND),
            (AuthError::Validation("v".to_string()), StatusCode::BAD_REQUEST),
            (
                AuthError::Unavailable("u".to_string()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                AuthError::Internal("i".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
