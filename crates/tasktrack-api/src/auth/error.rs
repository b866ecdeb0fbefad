// Authentication error taxonomy
// Decision: Fine-grained variants internally; collapsing to a generic message
// happens only in IntoResponse, so callers and tests can still tell causes apart

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::jwt::TokenError;
use crate::storage::StoreError;

/// Stable error keys returned in the `error` field
pub mod keys {
    pub const INVALID_CREDENTIALS: &str = "error.invalid.credentials";
    pub const EMAIL_UNVERIFIED: &str = "error.email.unverified";
    pub const INVALID_TOKEN: &str = "error.invalid.token";
    pub const MISSING_TOKEN: &str = "error.missing.token";
    pub const MISSING_REFRESH_TOKEN: &str = "error.missing.refresh.token";
    pub const USER_NOT_FOUND: &str = "error.user.not.found";
    pub const FEDERATION_FAILED: &str = "error.federation.failed";
    pub const INVALID_BODY: &str = "error.invalid.body";
    pub const INTERNAL_SERVER: &str = "error.internal.server";
}

/// Errors produced by the session and trust layer
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Unknown email or wrong password (deliberately indistinguishable)
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Correct password, but the email address is not verified yet
    #[error("email not verified")]
    EmailUnverified,

    /// Bearer token rejected by the codec
    #[error("bearer token rejected: {0}")]
    Token(TokenError),

    /// Refresh value unknown, revoked or expired; or a non-bearer auth scheme
    #[error("invalid token")]
    InvalidToken,

    /// No Authorization header on a protected request
    #[error("missing token")]
    MissingToken,

    /// Refresh request without a refresh value
    #[error("missing refresh token")]
    MissingRefreshToken,

    /// Refresh record points at an identity that no longer exists
    #[error("user not found")]
    UserNotFound,

    /// Any failure talking to (or decoding) the identity provider
    #[error("federation failed: {0}")]
    FederationFailed(String),

    /// Request body could not be parsed or lacks required fields
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// Fault unrelated to caller input (signing, storage)
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Signing(msg) => AuthError::Internal(msg),
            other => AuthError::Token(other),
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingRefreshToken | AuthError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::InvalidCredentials
            | AuthError::EmailUnverified
            | AuthError::Token(_)
            | AuthError::InvalidToken
            | AuthError::MissingToken
            | AuthError::UserNotFound
            | AuthError::FederationFailed(_) => StatusCode::UNAUTHORIZED,
        }
    }

    /// Outward-facing error key. Every bearer and refresh failure collapses to
    /// the same key.
    pub fn key(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => keys::INVALID_CREDENTIALS,
            AuthError::EmailUnverified => keys::EMAIL_UNVERIFIED,
            AuthError::Token(_) | AuthError::InvalidToken => keys::INVALID_TOKEN,
            AuthError::MissingToken => keys::MISSING_TOKEN,
            AuthError::MissingRefreshToken => keys::MISSING_REFRESH_TOKEN,
            AuthError::UserNotFound => keys::USER_NOT_FOUND,
            AuthError::FederationFailed(_) => keys::FEDERATION_FAILED,
            AuthError::InvalidBody(_) => keys::INVALID_BODY,
            AuthError::Internal(_) => keys::INTERNAL_SERVER,
        }
    }

    fn details(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "Invalid email or password",
            AuthError::EmailUnverified => "Email address has not been verified",
            AuthError::Token(_) | AuthError::InvalidToken => "Invalid or expired token",
            AuthError::MissingToken => "Authorization header is required",
            AuthError::MissingRefreshToken => "refresh_token is required",
            AuthError::UserNotFound => "User not found",
            AuthError::FederationFailed(_) => "External sign-in failed",
            AuthError::InvalidBody(_) => "Request body is invalid",
            AuthError::Internal(_) => "Internal server error",
        }
    }
}

/// Error body returned by every auth endpoint
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Stable error key
    #[schema(example = "error.invalid.token")]
    pub error: String,
    /// Human-readable description
    pub details: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match &self {
            AuthError::Internal(msg) => tracing::error!(error = %msg, "internal auth error"),
            AuthError::FederationFailed(msg) => tracing::warn!(error = %msg, "federation failed"),
            other => tracing::debug!(error = %other, "auth request rejected"),
        }

        let body = ErrorResponse {
            error: self.key().to_string(),
            details: self.details().to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
