//! Error types for credence.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Caller-visible failure taxonomy for the credential workflows.
///
/// Signature failures and expiry are merged into [`AuthError::InvalidOrExpiredToken`]
/// at this boundary; unknown email and wrong password are merged into
/// [`AuthError::InvalidCredentials`]. The finer-grained causes only show up in logs.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Registration attempted with an email that already has a record.
    #[error("email already registered")]
    DuplicateEmail,

    /// No record for the given email.
    #[error("user not found")]
    NotFound,

    /// Unknown email or wrong password, collapsed to one error.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Login attempted before the address was verified.
    #[error("email not verified")]
    EmailNotVerified,

    /// Token failed signature, format, purpose, or expiry checks.
    #[error("invalid or expired token")]
    InvalidOrExpiredToken,

    /// Bearer token missing, unusable, or resolving to no record.
    #[error("unauthorized")]
    Unauthorized,

    /// Bad request input (email shape, password length).
    #[error("{0}")]
    Validation(String),

    /// Record-store backend failure.
    #[error("storage error: {0}")]
    Store(String),

    /// Anything else; never shown to the caller in detail.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::DuplicateEmail => StatusCode::CONFLICT,
            AuthError::NotFound => StatusCode::NOT_FOUND,
            AuthError::InvalidCredentials
            | AuthError::InvalidOrExpiredToken
            | AuthError::Unauthorized => StatusCode::UNAUTHORIZED,
            AuthError::EmailNotVerified => StatusCode::FORBIDDEN,
            AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::Store(_) | AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = match &self {
            // Internal detail stays in the logs.
            AuthError::Store(_) | AuthError::Internal(_) => {
                tracing::error!(error = %self, "internal error");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

/// Internal token-validation outcome. Expiry and everything else are
/// distinguished here for logging, then merged into
/// [`AuthError::InvalidOrExpiredToken`] at the orchestrator boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token invalid")]
    Invalid,
    #[error("token expired")]
    Expired,
}

impl From<TokenError> for AuthError {
    fn from(e: TokenError) -> Self {
        tracing::debug!(cause = %e, "token rejected");
        AuthError::InvalidOrExpiredToken
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merged_token_error_hides_the_cause() {
        let expired: AuthError = TokenError::Expired.into();
        let invalid: AuthError = TokenError::Invalid.into();
        assert_eq!(expired.to_string(), invalid.to_string());
        assert_eq!(expired.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(AuthError::DuplicateEmail.status(), StatusCode::CONFLICT);
        assert_eq!(AuthError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(AuthError::EmailNotVerified.status(), StatusCode::FORBIDDEN);
        assert_eq!(
            AuthError::Validation("password too short".into()).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn invalid_credentials_display_does_not_leak() {
        let err = AuthError::InvalidCredentials;
        assert_eq!(err.to_string(), "invalid credentials");
    }
}
