// Server configuration loaded from environment variables
// Decision: Read once at startup; an unset DATABASE_URL selects the in-memory store

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use std::{net::SocketAddr, time::Duration};

use crate::auth::config::duration_from_env;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8765";
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60); // hourly

/// Process-level settings (auth settings live in `AuthConfig`)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// PostgreSQL connection string; `None` runs on the in-memory store
    pub database_url: Option<String>,
    /// Origins allowed by CORS; empty means same-origin only
    pub cors_origins: Vec<HeaderValue>,
    pub sweep_interval: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        let listen_addr = std::env::var("LISTEN_ADDR")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr
            .parse()
            .with_context(|| format!("Invalid LISTEN_ADDR: {}", listen_addr))?;

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.is_empty());

        // Example: CORS_ALLOWED_ORIGINS="https://app.example.com,https://admin.example.com"
        let cors_origins = std::env::var("CORS_ALLOWED_ORIGINS")
            .map(|s| parse_origins(&s))
            .unwrap_or_default();

        Ok(Self {
            listen_addr,
            database_url,
            cors_origins,
            sweep_interval: duration_from_env("REFRESH_SWEEP_INTERVAL", DEFAULT_SWEEP_INTERVAL),
        })
    }
}

fn parse_origins(s: &str) -> Vec<HeaderValue> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse().ok())
        .collect()
}
