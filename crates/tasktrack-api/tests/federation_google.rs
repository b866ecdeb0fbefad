// End-to-end federation through the Google adapter, with the provider mocked by wiremock

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::json;
use std::time::Duration;
use tasktrack_api::{
    auth::{
        config::{AuthConfig, GoogleOAuthConfig, JwtConfig},
        AuthState,
    },
    build_app,
    storage::StorageBackend,
};
use tower::ServiceExt;
use wiremock::{
    matchers::{body_string_contains, header as header_matcher, method, path},
    Mock, MockServer, ResponseTemplate,
};

const FRONTEND: &str = "http://frontend.test";

fn config(server: &MockServer, timeout: Duration) -> AuthConfig {
    let google = GoogleOAuthConfig {
        auth_url: format!("{}/o/oauth2/v2/auth", server.uri()),
        token_url: format!("{}/token", server.uri()),
        userinfo_url: format!("{}/oauth2/v2/userinfo", server.uri()),
        ..GoogleOAuthConfig::new(
            "client-123".to_string(),
            "client-secret".to_string(),
            "http://localhost:8765/auth/federation/callback".to_string(),
        )
    };

    AuthConfig {
        jwt: JwtConfig {
            secret: "google-flow-secret".to_string(),
            ..JwtConfig::default()
        },
        google: Some(google),
        frontend_url: FRONTEND.to_string(),
        federation_timeout: timeout,
        cookie_secure: false,
    }
}

fn app(server: &MockServer, timeout: Duration) -> (Router, AuthState) {
    let state = AuthState::new(config(server, timeout), StorageBackend::in_memory()).unwrap();
    (build_app(state.clone(), &[]), state)
}

fn location(headers: &HeaderMap) -> String {
    headers
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string()
}

async fn begin(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/auth/federation/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    cookie
        .split(';')
        .next()
        .and_then(|c| c.strip_prefix("federation_state="))
        .unwrap()
        .to_string()
}

async fn complete(app: &Router, code: &str, state: &str) -> String {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/auth/federation/callback?code={}&state={}",
                    code, state
                ))
                .header(header::COOKIE, format!("federation_state={}", state))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    location(response.headers())
}

#[tokio::test]
async fn test_google_round_trip() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains("client_secret=client-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "google-access",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .and(header_matcher("authorization", "Bearer google-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "109876",
            "email": "Grace@Example.com",
            "verified_email": true,
            "given_name": "Grace",
            "family_name": "Hopper"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (app, auth_state) = app(&server, Duration::from_secs(5));

    let state = begin(&app).await;
    let url = complete(&app, "auth-code", &state).await;
    assert!(url.starts_with(&format!("{}/login/success?token=", FRONTEND)), "{}", url);

    let user = auth_state
        .sessions
        .storage()
        .get_user_by_email("grace@example.com")
        .await
        .unwrap()
        .unwrap();
    assert!(user.email_verified);
    assert_eq!(user.first_name, "Grace");
    assert_eq!(user.last_name, "Hopper");
}

#[tokio::test]
async fn test_google_consent_url_points_at_provider() {
    let server = MockServer::start().await;
    let (app, _) = app(&server, Duration::from_secs(5));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/federation/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let url = location(response.headers());
    assert!(url.starts_with(&format!("{}/o/oauth2/v2/auth?", server.uri())));
    assert!(url.contains("client_id=client-123"));
    assert!(url.contains("response_type=code"));
    assert!(!url.contains("client-secret"));
}

#[tokio::test]
async fn test_slow_provider_fails_federation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "late" }))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let (app, _) = app(&server, Duration::from_millis(200));

    let state = begin(&app).await;
    let url = complete(&app, "auth-code", &state).await;
    assert_eq!(url, format!("{}/login?error=federation-failed", FRONTEND));
}

#[tokio::test]
async fn test_provider_error_status_fails_federation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client"
        })))
        .mount(&server)
        .await;

    let (app, _) = app(&server, Duration::from_secs(5));

    let state = begin(&app).await;
    let url = complete(&app, "auth-code", &state).await;
    assert_eq!(url, format!("{}/login?error=federation-failed", FRONTEND));
}

#[tokio::test]
async fn test_unverified_google_email_fails_federation() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "google-access"
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/oauth2/v2/userinfo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "email": "victim@example.com",
            "verified_email": false,
            "given_name": "Mallory"
        })))
        .mount(&server)
        .await;

    let (app, auth_state) = app(&server, Duration::from_secs(5));

    let state = begin(&app).await;
    let url = complete(&app, "auth-code", &state).await;
    assert_eq!(url, format!("{}/login?error=federation-failed", FRONTEND));

    let user = auth_state
        .sessions
        .storage()
        .get_user_by_email("victim@example.com")
        .await
        .unwrap();
    assert!(user.is_none());
}
