// Session service: login, logout, refresh and bearer validation
// Decision: Session state is derived from refresh records (active / revoked / expired / swept);
// there is no session table and no revoked -> active transition
// Decision: Refresh values are not rotated on use; the same value is returned until logout or expiry

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{
    config::JwtConfig,
    error::AuthError,
    jwt::{generate_refresh_token, hash_token, AccessTokenClaims, TokenCodec},
};
use crate::storage::{
    password::{verify_dummy_password, verify_password},
    CreateRefreshTokenRow, StorageBackend, StoreError, UserRow,
};

/// Identity summary returned to clients (never includes the password hash)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct UserSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
}

impl From<&UserRow> for UserSummary {
    fn from(user: &UserRow) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.clone(),
        }
    }
}

/// Bearer + refresh pair handed out by login, refresh and federation
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionTokens {
    /// Bearer token for the Authorization header
    pub token: String,
    /// Opaque refresh value
    pub refresh_token: String,
    /// Bearer expiry (Unix timestamp, seconds)
    pub expires_at: i64,
    pub user: UserSummary,
}

/// Orchestrates the credential lifecycle on top of the codec and the store
#[derive(Clone)]
pub struct SessionService {
    db: StorageBackend,
    codec: TokenCodec,
    config: JwtConfig,
}

impl SessionService {
    pub fn new(db: StorageBackend, config: JwtConfig) -> Self {
        let codec = TokenCodec::new(&config);
        Self { db, codec, config }
    }

    pub fn storage(&self) -> &StorageBackend {
        &self.db
    }

    /// Authenticate with email + password and open a session
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, AuthError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AuthError::InvalidBody(
                "email and password are required".to_string(),
            ));
        }

        let user = self.db.get_user_by_email(email).await?;

        let Some(user) = user else {
            // Same work as a real verification; absent and wrong-password look alike
            let password = password.to_string();
            let _ = tokio::task::spawn_blocking(move || verify_dummy_password(&password)).await;
            tracing::warn!("login failed: unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.check_password(password, &user).await {
            tracing::warn!(user_id = user.id, "login failed: invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        if !user.email_verified {
            tracing::warn!(user_id = user.id, "login refused: email not verified");
            return Err(AuthError::EmailUnverified);
        }

        let session = self.start_session(&user).await?;
        tracing::info!(user_id = user.id, "user logged in");
        Ok(session)
    }

    /// Revoke every refresh record of the token's identity.
    ///
    /// The bearer token itself stays valid until it expires; an already
    /// expired token cannot be used to log out.
    pub async fn logout(&self, bearer_token: &str) -> Result<u64, AuthError> {
        let claims = self.validate_token(bearer_token)?;

        let revoked = self.db.revoke_user_refresh_tokens(claims.user_id).await?;
        tracing::info!(user_id = claims.user_id, revoked, "user logged out");
        Ok(revoked)
    }

    /// Exchange a refresh value for a new bearer token
    pub async fn refresh(&self, refresh_token: &str) -> Result<SessionTokens, AuthError> {
        if refresh_token.is_empty() {
            return Err(AuthError::MissingRefreshToken);
        }

        let record = match self
            .db
            .get_refresh_token_by_hash(&hash_token(refresh_token))
            .await
        {
            Ok(record) => record,
            Err(StoreError::NotFound) => return Err(AuthError::InvalidToken),
            Err(e) => return Err(e.into()),
        };

        if !record.is_usable_at(Utc::now()) {
            tracing::debug!(user_id = record.user_id, "refresh token expired");
            return Err(AuthError::InvalidToken);
        }

        let user = self
            .db
            .get_user(record.user_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = record.user_id, "refresh token for missing user");
                AuthError::UserNotFound
            })?;

        let issued = self
            .codec
            .issue(user.id, &user.email, self.config.access_token_lifetime)?;

        tracing::debug!(user_id = user.id, "bearer token refreshed");
        Ok(SessionTokens {
            token: issued.token,
            refresh_token: refresh_token.to_string(),
            expires_at: issued.expires_at.timestamp(),
            user: UserSummary::from(&user),
        })
    }

    /// Validate a bearer token. No storage access.
    pub fn validate_token(&self, bearer_token: &str) -> Result<AccessTokenClaims, AuthError> {
        self.codec.verify(bearer_token).map_err(AuthError::from)
    }

    /// Issue a bearer token and persist a new refresh record for `user`
    pub(crate) async fn start_session(&self, user: &UserRow) -> Result<SessionTokens, AuthError> {
        let issued = self
            .codec
            .issue(user.id, &user.email, self.config.access_token_lifetime)?;

        let refresh_token = generate_refresh_token();
        let refresh_lifetime = chrono::Duration::from_std(self.config.refresh_token_lifetime)
            .map_err(|e| AuthError::Internal(e.to_string()))?;
        let expires_at = Utc::now()
            .checked_add_signed(refresh_lifetime)
            .ok_or_else(|| AuthError::Internal("refresh token lifetime out of range".to_string()))?;

        self.db
            .create_refresh_token(CreateRefreshTokenRow {
                user_id: user.id,
                token_hash: hash_token(&refresh_token),
                expires_at,
            })
            .await
            .map_err(|e| {
                tracing::error!(user_id = user.id, error = %e, "failed to store refresh token");
                AuthError::from(e)
            })?;

        Ok(SessionTokens {
            token: issued.token,
            refresh_token,
            expires_at: issued.expires_at.timestamp(),
            user: UserSummary::from(user),
        })
    }

    /// Remove expired refresh records (background sweep)
    pub async fn sweep_expired(&self) -> Result<u64, StoreError> {
        self.db.delete_expired_refresh_tokens().await
    }

    async fn check_password(&self, password: &str, user: &UserRow) -> bool {
        let password = password.to_string();
        let hash = user.password_hash.clone();
        let user_id = user.id;

        match tokio::task::spawn_blocking(move || verify_password(&password, &hash)).await {
            Ok(Ok(valid)) => valid,
            Ok(Err(e)) => {
                tracing::error!(user_id, error = %e, "password verification error");
                false
            }
            Err(e) => {
                tracing::error!(user_id, error = %e, "password verification task failed");
                false
            }
        }
    }
}
