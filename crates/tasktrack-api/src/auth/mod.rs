// Authentication module
// Decision: Bearer JWTs for API calls, opaque refresh tokens stored hashed
// Decision: Google as the only federation provider, behind the IdentityProvider trait

pub mod config;
pub mod error;
pub mod jwt;
pub mod middleware;
pub mod oauth;
pub mod routes;
pub mod session;
pub mod sweep;

pub use config::AuthConfig;
pub use error::{AuthError, ErrorResponse};
pub use middleware::{require_auth, AuthContext, AuthState};
pub use routes::routes;
pub use session::{SessionService, SessionTokens, UserSummary};
