// Authentication configuration loaded from environment variables.
// Decision: AUTH_ prefix for all auth config
// Decision: Loaded once at startup and never mutated; rotating AUTH_JWT_SECRET
// (and restarting) invalidates every outstanding bearer token

use std::time::Duration;

/// Issuer embedded in (and required of) every bearer token
pub const TOKEN_ISSUER: &str = "tasktrack";

const DEFAULT_ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(20 * 60); // 20 minutes
const DEFAULT_REFRESH_TOKEN_LIFETIME: Duration = Duration::from_secs(7 * 24 * 60 * 60); // 7 days
const DEFAULT_FEDERATION_TIMEOUT: Duration = Duration::from_secs(10);

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Secret key for signing JWTs
    pub secret: String,
    /// Issuer claim
    pub issuer: String,
    /// Access token lifetime
    pub access_token_lifetime: Duration,
    /// Refresh token lifetime
    pub refresh_token_lifetime: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: TOKEN_ISSUER.to_string(),
            access_token_lifetime: DEFAULT_ACCESS_TOKEN_LIFETIME,
            refresh_token_lifetime: DEFAULT_REFRESH_TOKEN_LIFETIME,
        }
    }
}

/// Google OAuth configuration
#[derive(Debug, Clone)]
pub struct GoogleOAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Provider endpoints (overridable for testing)
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl GoogleOAuthConfig {
    pub fn new(client_id: String, client_secret: String, redirect_uri: String) -> Self {
        Self {
            client_id,
            client_secret,
            redirect_uri,
            auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            userinfo_url: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
        }
    }
}

/// Complete authentication configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// JWT configuration
    pub jwt: JwtConfig,
    /// Google OAuth configuration
    pub google: Option<GoogleOAuthConfig>,
    /// Frontend base URL that federation callbacks redirect to
    pub frontend_url: String,
    /// Timeout applied to every outbound call to the identity provider
    pub federation_timeout: Duration,
    /// Mark cookies as Secure (disable only for plain-http local development)
    pub cookie_secure: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt: JwtConfig::default(),
            google: None,
            frontend_url: "http://localhost:5173".to_string(),
            federation_timeout: DEFAULT_FEDERATION_TIMEOUT,
            cookie_secure: true,
        }
    }
}

impl AuthConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let base_url = std::env::var("AUTH_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8765".to_string());

        // JWT configuration
        let jwt_secret = std::env::var("AUTH_JWT_SECRET")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| {
                tracing::warn!(
                    "AUTH_JWT_SECRET not set, using a random secret; tokens will not survive a restart"
                );
                random_secret()
            });

        let jwt = JwtConfig {
            secret: jwt_secret,
            issuer: TOKEN_ISSUER.to_string(),
            access_token_lifetime: duration_from_env(
                "AUTH_ACCESS_TOKEN_LIFETIME",
                DEFAULT_ACCESS_TOKEN_LIFETIME,
            ),
            refresh_token_lifetime: duration_from_env(
                "AUTH_REFRESH_TOKEN_LIFETIME",
                DEFAULT_REFRESH_TOKEN_LIFETIME,
            ),
        };

        // Google OAuth configuration
        let google = match (
            std::env::var("AUTH_GOOGLE_CLIENT_ID"),
            std::env::var("AUTH_GOOGLE_CLIENT_SECRET"),
        ) {
            (Ok(client_id), Ok(client_secret))
                if !client_id.is_empty() && !client_secret.is_empty() =>
            {
                let redirect_uri = std::env::var("AUTH_GOOGLE_REDIRECT_URI")
                    .unwrap_or_else(|_| format!("{}/auth/federation/callback", base_url));
                Some(GoogleOAuthConfig::new(client_id, client_secret, redirect_uri))
            }
            _ => {
                tracing::warn!(
                    "AUTH_GOOGLE_CLIENT_ID / AUTH_GOOGLE_CLIENT_SECRET not set, federation login disabled"
                );
                None
            }
        };

        let frontend_url = std::env::var("AUTH_FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        let cookie_secure = std::env::var("AUTH_COOKIE_SECURE")
            .map(|s| !(s.eq_ignore_ascii_case("false") || s == "0"))
            .unwrap_or(true);

        Self {
            jwt,
            google,
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            federation_timeout: duration_from_env(
                "AUTH_FEDERATION_TIMEOUT",
                DEFAULT_FEDERATION_TIMEOUT,
            ),
            cookie_secure,
        }
    }

    /// Check if federation login is available
    pub fn federation_enabled(&self) -> bool {
        self.google.is_some()
    }
}

/// Parse a duration in seconds from an environment variable
pub(crate) fn duration_from_env(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| parse_secs(&s))
        .unwrap_or(default)
}

fn parse_secs(s: &str) -> Option<Duration> {
    s.trim()
        .parse::<u64>()
        .ok()
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}

fn random_secret() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
