// Authentication HTTP routes
// Decision: Unprefixed paths (/login, /logout, /refresh) kept for existing clients
// Decision: Federation callbacks always end in a 302 to the frontend, never a JSON error

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{
    error::{AuthError, ErrorResponse},
    middleware::{bearer_token, AuthContext, AuthState},
    session::{SessionTokens, UserSummary},
};

/// Cookie binding the federation state to the browser that started the flow
pub const FEDERATION_STATE_COOKIE: &str = "federation_state";
const FEDERATION_STATE_PATH: &str = "/auth/federation";
const FEDERATION_STATE_MAX_AGE_MINUTES: i64 = 10;

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Refresh token request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshTokenRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Plain acknowledgement
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Identity of the current caller
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub id: i64,
    pub email: String,
}

/// Federation callback query parameters
#[derive(Debug, Default, Deserialize)]
pub struct FederationCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    /// Set by the provider when the user denies consent
    pub error: Option<String>,
}

/// Create auth routes
pub fn routes(state: AuthState) -> Router {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/refresh", post(refresh_token))
        .route("/auth/federation/login", get(federation_login))
        .route("/auth/federation/callback", get(federation_callback))
        // Protected routes
        .route("/me", get(get_current_user))
        .with_state(state)
}

fn body_error(rejection: JsonRejection) -> AuthError {
    AuthError::InvalidBody(rejection.body_text())
}

/// POST /login - Login with email and password
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session opened", body = SessionTokens),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 401, description = "Invalid credentials or unverified email", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn login(
    State(state): State<AuthState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<SessionTokens>, AuthError> {
    let Json(req) = payload.map_err(body_error)?;
    let session = state.sessions.login(&req.email, &req.password).await?;
    Ok(Json(session))
}

/// POST /logout - Revoke every refresh token of the caller
#[utoipa::path(
    post,
    path = "/logout",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Missing, malformed or invalid bearer token", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn logout(
    State(state): State<AuthState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AuthError> {
    let token = bearer_token(&headers)?;
    state.sessions.logout(token).await?;
    Ok(Json(MessageResponse {
        message: "Logged out successfully".to_string(),
    }))
}

/// POST /refresh - Exchange a refresh token for a new bearer token
#[utoipa::path(
    post,
    path = "/refresh",
    request_body = RefreshTokenRequest,
    responses(
        (status = 200, description = "New bearer token; the refresh token is unchanged", body = SessionTokens),
        (status = 400, description = "Missing refresh token", body = ErrorResponse),
        (status = 401, description = "Refresh token invalid, expired or revoked", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "auth"
)]
pub async fn refresh_token(
    State(state): State<AuthState>,
    payload: Result<Json<RefreshTokenRequest>, JsonRejection>,
) -> Result<Json<SessionTokens>, AuthError> {
    let Json(req) = payload.map_err(body_error)?;
    let refresh_token = req.refresh_token.unwrap_or_default();
    let session = state.sessions.refresh(&refresh_token).await?;
    Ok(Json(session))
}

/// GET /me - Identity of the bearer token holder
#[utoipa::path(
    get,
    path = "/me",
    responses(
        (status = 200, description = "Current identity", body = MeResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer_auth" = [])),
    tag = "auth"
)]
pub async fn get_current_user(ctx: AuthContext) -> Json<MeResponse> {
    Json(MeResponse {
        id: ctx.user_id,
        email: ctx.email,
    })
}

/// GET /auth/federation/login - Redirect to the identity provider
#[utoipa::path(
    get,
    path = "/auth/federation/login",
    responses(
        (status = 302, description = "Redirect to the provider consent page")
    ),
    tag = "auth"
)]
pub async fn federation_login(State(state): State<AuthState>, jar: CookieJar) -> Response {
    let Some(federation) = state.federation.as_ref() else {
        tracing::warn!("federation login requested but no identity provider is configured");
        return found(&error_redirect_url(&state));
    };

    let start = federation.begin();

    let cookie = Cookie::build((FEDERATION_STATE_COOKIE, start.state))
        .path(FEDERATION_STATE_PATH)
        .http_only(true)
        .secure(state.config.cookie_secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(FEDERATION_STATE_MAX_AGE_MINUTES));

    (jar.add(cookie), found(&start.url)).into_response()
}

/// GET /auth/federation/callback - Provider redirect target
#[utoipa::path(
    get,
    path = "/auth/federation/callback",
    params(
        ("code" = Option<String>, Query, description = "Authorization code"),
        ("state" = Option<String>, Query, description = "State issued by /auth/federation/login")
    ),
    responses(
        (status = 302, description = "Redirect to the frontend with the session, or with an error")
    ),
    tag = "auth"
)]
pub async fn federation_callback(
    State(state): State<AuthState>,
    query: Option<Query<FederationCallbackQuery>>,
    jar: CookieJar,
) -> Response {
    let query = query.map(|Query(q)| q).unwrap_or_default();
    let expected_state = jar
        .get(FEDERATION_STATE_COOKIE)
        .map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(FEDERATION_STATE_COOKIE).path(FEDERATION_STATE_PATH));

    let location = match complete_federation(&state, query, expected_state).await {
        Ok(session) => success_redirect_url(&state, &session),
        Err(e) => {
            // Logged here because the redirect hides the cause from the client
            tracing::warn!(error = %e, "federation callback failed");
            error_redirect_url(&state)
        }
    };

    (jar, found(&location)).into_response()
}

async fn complete_federation(
    state: &AuthState,
    query: FederationCallbackQuery,
    expected_state: Option<String>,
) -> Result<SessionTokens, AuthError> {
    let federation = state.federation.as_ref().ok_or_else(|| {
        AuthError::FederationFailed("no identity provider configured".to_string())
    })?;

    if let Some(error) = query.error {
        return Err(AuthError::FederationFailed(format!(
            "provider returned error: {}",
            error
        )));
    }

    let (Some(returned), Some(expected)) = (query.state, expected_state) else {
        return Err(AuthError::FederationFailed(
            "missing federation state".to_string(),
        ));
    };
    if !constant_time_eq(returned.as_bytes(), expected.as_bytes()) {
        return Err(AuthError::FederationFailed(
            "federation state mismatch".to_string(),
        ));
    }

    let code = query.code.unwrap_or_default();
    federation.complete(&code).await
}

fn success_redirect_url(state: &AuthState, session: &SessionTokens) -> String {
    format!(
        "{}/login/success?token={}&refresh={}&user={}",
        state.config.frontend_url,
        session.token,
        session.refresh_token,
        encode_user(&session.user)
    )
}

fn error_redirect_url(state: &AuthState) -> String {
    format!("{}/login?error=federation-failed", state.config.frontend_url)
}

/// base64url(JSON) of the identity summary, for the success redirect
pub fn encode_user(user: &UserSummary) -> String {
    // Serializing a struct of strings and integers cannot fail
    let json = serde_json::to_vec(user).unwrap_or_default();
    URL_SAFE_NO_PAD.encode(json)
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
