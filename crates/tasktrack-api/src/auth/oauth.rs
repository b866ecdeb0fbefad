// Federation with an external identity provider (Google OAuth2)
// Decision: Manual OAuth2 code flow over reqwest; no OAuth client crate
// Decision: Only provider-verified emails are trusted; accounts are linked by normalized
// email and a new account starts verified
// with an unusable password hash, so only federation can sign it in until a reset

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};

use super::{
    config::GoogleOAuthConfig,
    error::AuthError,
    jwt::random_token,
    session::{SessionService, SessionTokens},
};
use crate::storage::{password::unusable_password_hash, CreateUserRow, StoreError, UserRow};

/// Bytes of entropy in the anti-forgery state value
const STATE_BYTES: usize = 16;

/// Identity asserted by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub email: String,
    #[serde(default)]
    pub given_name: String,
    #[serde(default)]
    pub family_name: String,
    /// Whether the provider has verified the email; only verified emails are trusted
    #[serde(default)]
    pub verified_email: bool,
}

/// An external identity provider speaking the authorization code flow
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Provider consent URL carrying `state`
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code for the user's profile
    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile>;
}

/// Google OAuth service
pub struct GoogleOAuthService {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_url: reqwest::Url,
    token_url: String,
    userinfo_url: String,
}

impl GoogleOAuthService {
    /// Every outbound call made by the service is bounded by `timeout`
    pub fn new(config: &GoogleOAuthConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build OAuth HTTP client")?;

        let auth_url = reqwest::Url::parse(&config.auth_url)
            .with_context(|| format!("Invalid OAuth authorization URL: {}", config.auth_url))?;

        Ok(Self {
            client,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            auth_url,
            token_url: config.token_url.clone(),
            userinfo_url: config.userinfo_url.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for GoogleOAuthService {
    fn authorization_url(&self, state: &str) -> String {
        let mut url = self.auth_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("response_type", "code")
            .append_pair("scope", "openid email profile")
            .append_pair("state", state);
        url.into()
    }

    async fn exchange_code(&self, code: &str) -> Result<ProviderProfile> {
        // Exchange code for token
        let token_response: GoogleTokenResponse = self
            .client
            .post(&self.token_url)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .context("Failed to exchange code")?
            .error_for_status()
            .context("Token endpoint returned an error")?
            .json()
            .await
            .context("Failed to parse token response")?;

        // Fetch user info
        let profile: ProviderProfile = self
            .client
            .get(&self.userinfo_url)
            .bearer_auth(&token_response.access_token)
            .send()
            .await
            .context("Failed to fetch user info")?
            .error_for_status()
            .context("Userinfo endpoint returned an error")?
            .json()
            .await
            .context("Failed to parse user info")?;

        if profile.email.trim().is_empty() {
            anyhow::bail!("Provider profile has no email");
        }

        Ok(profile)
    }
}

#[derive(Debug, Deserialize)]
struct GoogleTokenResponse {
    access_token: String,
}

/// Start of a federation round trip
#[derive(Debug, Clone)]
pub struct FederationStart {
    /// Provider consent URL
    pub url: String,
    /// Anti-forgery value the callback must echo back
    pub state: String,
}

/// Maps provider assertions onto local accounts and sessions
#[derive(Clone)]
pub struct FederationService {
    provider: Arc<dyn IdentityProvider>,
    sessions: SessionService,
}

impl FederationService {
    pub fn new(provider: Arc<dyn IdentityProvider>, sessions: SessionService) -> Self {
        Self { provider, sessions }
    }

    pub fn begin(&self) -> FederationStart {
        let state = random_token(STATE_BYTES);
        FederationStart {
            url: self.provider.authorization_url(&state),
            state,
        }
    }

    /// Exchange `code` and open a session for the asserted identity
    pub async fn complete(&self, code: &str) -> Result<SessionTokens, AuthError> {
        if code.is_empty() {
            return Err(AuthError::FederationFailed(
                "missing authorization code".to_string(),
            ));
        }

        let profile = self
            .provider
            .exchange_code(code)
            .await
            .map_err(|e| AuthError::FederationFailed(format!("{:#}", e)))?;

        if !profile.verified_email {
            return Err(AuthError::FederationFailed(
                "provider email is not verified".to_string(),
            ));
        }

        let user = self.find_or_create_user(&profile).await?;
        let session = self.sessions.start_session(&user).await?;

        tracing::info!(user_id = user.id, "user logged in via federation");
        Ok(session)
    }

    async fn find_or_create_user(&self, profile: &ProviderProfile) -> Result<UserRow, AuthError> {
        let db = self.sessions.storage();

        if let Some(user) = db.get_user_by_email(&profile.email).await? {
            return Ok(user);
        }

        let password_hash =
            unusable_password_hash().map_err(|e| AuthError::Internal(e.to_string()))?;

        let created = db
            .create_user(CreateUserRow {
                first_name: profile.given_name.clone(),
                last_name: profile.family_name.clone(),
                email: profile.email.clone(),
                password_hash,
                email_verified: true,
            })
            .await;

        match created {
            Ok(user) => {
                tracing::info!(user_id = user.id, "created account from federation");
                Ok(user)
            }
            // A concurrent callback for the same email won the insert
            Err(StoreError::Conflict(_)) => db
                .get_user_by_email(&profile.email)
                .await?
                .ok_or(AuthError::UserNotFound),
            Err(e) => Err(e.into()),
        }
    }
}
