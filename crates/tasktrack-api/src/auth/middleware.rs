// Authentication gate and per-request identity
// Decision: Bearer header only (no cookie sessions); validation never touches storage
// Decision: The gate runs as router middleware so an unauthenticated request never
// reaches a protected handler; handlers read the identity through the AuthContext extractor

use anyhow::Result;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::{
    config::AuthConfig,
    error::AuthError,
    oauth::{FederationService, GoogleOAuthService, IdentityProvider},
    session::SessionService,
};
use crate::storage::StorageBackend;

const BEARER_PREFIX: &str = "Bearer ";

/// Paths served without a bearer token (exact match)
pub const PUBLIC_PATHS: &[&str] = &[
    "/login",
    "/logout",
    "/refresh",
    "/user",
    "/auth/federation/login",
    "/auth/federation/callback",
];

/// Identity resolved by the gate for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: i64,
    pub email: String,
}

/// Auth state shared across routes
#[derive(Clone)]
pub struct AuthState {
    pub config: Arc<AuthConfig>,
    pub sessions: Arc<SessionService>,
    pub federation: Option<Arc<FederationService>>,
}

impl AuthState {
    /// Build from configuration; federation is enabled when Google credentials are set
    pub fn new(config: AuthConfig, db: StorageBackend) -> Result<Self> {
        let provider: Option<Arc<dyn IdentityProvider>> = match &config.google {
            Some(google) => Some(Arc::new(GoogleOAuthService::new(
                google,
                config.federation_timeout,
            )?)),
            None => None,
        };
        Ok(Self::with_identity_provider(config, db, provider))
    }

    /// Build with an explicit identity provider (or none)
    pub fn with_identity_provider(
        config: AuthConfig,
        db: StorageBackend,
        provider: Option<Arc<dyn IdentityProvider>>,
    ) -> Self {
        let sessions = SessionService::new(db, config.jwt.clone());
        let federation = provider
            .map(|provider| Arc::new(FederationService::new(provider, sessions.clone())));

        Self {
            config: Arc::new(config),
            sessions: Arc::new(sessions),
            federation,
        }
    }
}

/// Whether `path` is reachable without authentication
pub fn is_public_path(path: &str) -> bool {
    PUBLIC_PATHS.contains(&path) || path.contains("/swagger")
}

/// Extract the bearer token from the Authorization header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?;

    let value = value.to_str().map_err(|_| AuthError::InvalidToken)?;

    value
        .strip_prefix(BEARER_PREFIX)
        .ok_or(AuthError::InvalidToken)
}

/// Router middleware guarding every non-public path
pub async fn require_auth(
    State(state): State<AuthState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if is_public_path(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let token = bearer_token(request.headers())?;

    let claims = state.sessions.validate_token(token).map_err(|e| {
        tracing::debug!(error = %e, path = %request.uri().path(), "bearer token rejected");
        AuthError::InvalidToken
    })?;

    request.extensions_mut().insert(AuthContext {
        user_id: claims.user_id,
        email: claims.email,
    });

    Ok(next.run(request).await)
}

/// Extractor for the authenticated identity.
/// Only available on routes behind `require_auth`.
#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or(AuthError::MissingToken)
    }
}
