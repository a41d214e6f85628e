//! Process configuration. Everything comes from environment variables; no
//! other process-wide mutable state exists.

use std::env;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    /// DSN of the durable store backend.
    pub database_url: String,
    /// Secret the auth service signs bearer tokens with.
    pub token_secret: String,
    /// Lobby-side HTTP port (served by the lobby process).
    pub http_port: u16,
    /// Port the real-time gateway listens on.
    pub realtime_port: u16,
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "memory://local".to_string()),
            token_secret: env::var("TOKEN_SECRET").unwrap_or_else(|_| "dev-secret".to_string()),
            http_port: parse_port("HTTP_PORT", env::var("HTTP_PORT").ok(), 8080)?,
            realtime_port: parse_port("REALTIME_PORT", env::var("REALTIME_PORT").ok(), 8081)?,
            log_filter: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

fn parse_port(
    name: &'static str,
    value: Option<String>,
    default: u16,
) -> Result<u16, ConfigError> {
    match value {
        Some(value) => value
            .parse()
            .map_err(|_| ConfigError::InvalidValue { name, value }),
        None => Ok(default),
    }
}
