//! Server configuration.
//!
//! Loaded from environment variables (after an optional `.env`), each with a
//! development default.

use pharma_db::DbConfig;
use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(()),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Pool size
    pub db_max_connections: u32,

    /// Written to `created_by` on stock movements
    pub actor: String,

    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8000,
            database_path: "./pharma.db".to_string(),
            db_max_connections: 5,
            actor: "POS".to_string(),
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (the process env in
    /// production, a map in tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = ServerConfig::default();

        let config = ServerConfig {
            host: lookup("PHARMA_HOST").unwrap_or(defaults.host),

            port: parse_var(&lookup, "PHARMA_PORT")?.unwrap_or(defaults.port),

            database_path: lookup("PHARMA_DATABASE_PATH").unwrap_or(defaults.database_path),

            db_max_connections: parse_var(&lookup, "PHARMA_DB_MAX_CONNECTIONS")?
                .unwrap_or(defaults.db_max_connections),

            actor: lookup("PHARMA_ACTOR")
                .map(|a| a.trim().to_string())
                .filter(|a| !a.is_empty())
                .unwrap_or(defaults.actor),

            log_format: parse_var(&lookup, "PHARMA_LOG_FORMAT")?.unwrap_or(defaults.log_format),
        };

        if config.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("PHARMA_DB_MAX_CONNECTIONS".to_string()));
        }

        Ok(config)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("PHARMA_HOST".to_string()))
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path).max_connections(self.db_max_connections)
    }
}

fn parse_var<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key.to_string())),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),
}
