// OpenAPI specification for the tasktrack auth API
// Served as JSON at /swagger/openapi.json (public, no bearer needed)

use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::auth::{
    error::ErrorResponse,
    routes::{self, LoginRequest, MeResponse, MessageResponse, RefreshTokenRequest},
    session::{SessionTokens, UserSummary},
};

/// OpenAPI documentation for the tasktrack API
#[derive(OpenApi)]
#[openapi(
    paths(
        routes::login,
        routes::logout,
        routes::refresh_token,
        routes::get_current_user,
        routes::federation_login,
        routes::federation_callback,
    ),
    components(
        schemas(
            LoginRequest,
            RefreshTokenRequest,
            SessionTokens,
            UserSummary,
            MessageResponse,
            MeResponse,
            ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login, logout, token refresh and federation")
    ),
    info(
        title = "Tasktrack API",
        version = "0.1.0",
        description = "Session and trust management for the tasktrack backend"
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

impl ApiDoc {
    /// Generate the OpenAPI spec as a pretty-printed JSON string
    pub fn to_json() -> Result<String, serde_json::Error> {
        Self::openapi().to_pretty_json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_lists_auth_paths() {
        let spec = ApiDoc::openapi();
        for path in ["/login", "/logout", "/refresh", "/me", "/auth/federation/login"] {
            assert!(spec.paths.paths.contains_key(path), "missing {}", path);
        }
    }

    #[test]
    fn test_spec_declares_bearer_scheme() {
        let json = ApiDoc::to_json().unwrap();
        assert!(json.contains("bearer_auth"));
    }
}
