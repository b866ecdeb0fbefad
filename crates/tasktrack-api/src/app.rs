// HTTP application assembly
// Decision: The auth gate wraps the API routes; public paths are let through by the gate itself
// Decision: /health is mounted outside the gate so the allow-list stays exact

use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;

use crate::{
    auth::{self, AuthState},
    openapi::ApiDoc,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the full router: auth routes, health, OpenAPI document, gate, CORS and tracing
pub fn build_app(state: AuthState, cors_origins: &[HeaderValue]) -> Router {
    let gated = Router::new()
        .route("/swagger/openapi.json", get(openapi_json))
        .merge(auth::routes(state.clone()))
        .layer(middleware::from_fn_with_state(state, auth::require_auth));

    let app = Router::new().route("/health", get(health)).merge(gated);

    // Add CORS layer only if origins are configured
    let app = if cors_origins.is_empty() {
        app
    } else {
        app.layer(
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(cors_origins.iter().cloned()))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([
                    header::CONTENT_TYPE,
                    header::AUTHORIZATION,
                    header::ACCEPT,
                    header::ORIGIN,
                ])
                .allow_credentials(true),
        )
    };

    app.layer(TraceLayer::new_for_http())
}
