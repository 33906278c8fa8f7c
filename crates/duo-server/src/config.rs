use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;
use tracing::info;

/// Placeholder secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me", "dev-secret-change-me", "your-anon-key"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is unset or still a placeholder")]
    MissingSecret(&'static str),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

pub struct ServerConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub anon_key: String,
    pub jwt_secret: String,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = var_or("DUO_HOST", "0.0.0.0");
        let port = var_or("DUO_PORT", "3000");
        let addr = format!("{}:{}", host, port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                key: "DUO_HOST/DUO_PORT",
                reason: e.to_string(),
            })?;

        Ok(Self {
            addr,
            db_path: var_or("DUO_DB_PATH", "duo.db").into(),
            anon_key: secret("DUO_ANON_KEY")?,
            jwt_secret: secret("DUO_JWT_SECRET")?,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    })
}

fn secret(key: &'static str) -> Result<String, ConfigError> {
    let value = env::var(key).unwrap_or_default();
    if value.trim().is_empty() || PLACEHOLDER_SECRETS.contains(&value.as_str()) {
        return Err(ConfigError::MissingSecret(key));
    }
    Ok(value)
}
