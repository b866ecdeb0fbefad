// Tasktrack API server
// Decision: PostgreSQL when DATABASE_URL is set, in-memory dev mode otherwise

use anyhow::{Context, Result};
use tasktrack_api::{
    auth::{sweep::spawn_sweeper, AuthConfig, AuthState},
    build_app,
    config::ServerConfig,
    storage::StorageBackend,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tasktrack_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("tasktrack-api starting...");

    let server_config = ServerConfig::from_env()?;

    // Initialize storage
    let db = match &server_config.database_url {
        Some(url) => {
            let db = StorageBackend::postgres(url)
                .await
                .context("Failed to connect to database")?;
            tracing::info!("Connected to database");
            db
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory storage (data is lost on exit)");
            StorageBackend::in_memory()
        }
    };
    tracing::info!(dev_mode = db.is_dev_mode(), "Storage ready");

    // Load authentication configuration
    let auth_config = AuthConfig::from_env();
    tracing::info!(
        federation = auth_config.federation_enabled(),
        access_token_lifetime_secs = auth_config.jwt.access_token_lifetime.as_secs(),
        refresh_token_lifetime_secs = auth_config.jwt.refresh_token_lifetime.as_secs(),
        "Authentication configured"
    );

    let auth_state =
        AuthState::new(auth_config, db).context("Failed to initialize authentication")?;

    let sweeper = spawn_sweeper(auth_state.sessions.clone(), server_config.sweep_interval);

    if server_config.cors_origins.is_empty() {
        tracing::info!("CORS not configured (same-origin requests only)");
    } else {
        tracing::info!(origins = ?server_config.cors_origins, "CORS origins configured");
    }

    let app = build_app(auth_state, &server_config.cors_origins);

    // Start HTTP server
    let listener = tokio::net::TcpListener::bind(server_config.listen_addr)
        .await
        .context("Failed to bind to address")?;
    tracing::info!("HTTP server listening on {}", server_config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    sweeper.abort();
    tracing::info!("tasktrack-api stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
