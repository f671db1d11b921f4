//! Authentication errors
//!
//! Credential and ticket failures are deliberately coarse: callers learn that
//! a token or ticket is unusable, never why.

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Token could not be issued or did not verify
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    /// Bad signature, expired, malformed or wrong kind
    #[error("invalid token")]
    Invalid,
    #[error("token signing failed: {0}")]
    Signing(String),
}

/// Reset ticket unknown, expired or already used
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TicketError {
    #[error("invalid or expired reset ticket")]
    Invalid,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Incorrect email or password")]
    InvalidCredentials,
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Too many attempts, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },
    #[error("Account locked for {remaining_seconds}s")]
    AccountLocked { remaining_seconds: u64 },
    #[error("Invalid or expired reset token")]
    InvalidTicket,
    #[error("Inactive user")]
    InactiveUser,
    #[error("Current password is incorrect")]
    IncorrectPassword,
    #[error("{0}")]
    WeakPassword(String),
    #[error("Insufficient permissions")]
    InsufficientPermissions,
    #[error("Database error")]
    DatabaseError,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::MissingAuth | AuthError::InvalidCredentials | AuthError::InvalidToken => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AuthError::AccountLocked { .. } | AuthError::InsufficientPermissions => {
                StatusCode::FORBIDDEN
            }
            AuthError::InvalidTicket
            | AuthError::InactiveUser
            | AuthError::IncorrectPassword
            | AuthError::WeakPassword(_) => StatusCode::BAD_REQUEST,
            AuthError::DatabaseError | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "User store query failed");
        AuthError::DatabaseError
    }
}

impl From<CredentialError> for AuthError {
    fn from(err: CredentialError) -> Self {
        match err {
            CredentialError::Invalid => AuthError::InvalidToken,
            CredentialError::Signing(reason) => AuthError::Internal(reason),
        }
    }
}

impl From<TicketError> for AuthError {
    fn from(_: TicketError) -> Self {
        AuthError::InvalidTicket
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AuthError::DatabaseError | AuthError::Internal(_) => {
                "Internal server error".to_string()
            }
            AuthError::RateLimited { .. } => {
                "Too many requests. Please try again later.".to_string()
            }
            AuthError::AccountLocked { .. } => {
                "Account temporarily locked due to too many failed login attempts".to_string()
            }
            other => other.to_string(),
        };

        let mut body = json!({
            "error": message,
            "code": status.as_u16()
        });

        match &self {
            AuthError::RateLimited { retry_after_secs } => {
                body["retry_after"] = json!(retry_after_secs);
            }
            AuthError::AccountLocked { remaining_seconds } => {
                body["remaining_seconds"] = json!(remaining_seconds);
            }
            _ => {}
        }

        let mut response = (status, Json(body)).into_response();
        match &self {
            AuthError::RateLimited { retry_after_secs } => {
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from(*retry_after_secs));
            }
            AuthError::MissingAuth | AuthError::InvalidToken => {
                response.headers_mut().insert(
                    axum::http::header::WWW_AUTHENTICATE,
                    HeaderValue::from_static("Bearer"),
                );
            }
            _ => {}
        }
        response
    }
}
