//! Configuration for laundry-rs

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LaundryError, Result};

/// Main service configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Authentication configuration
    #[serde(default)]
    pub auth: AuthConfig,
    /// Quota accounting configuration
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Listen address (e.g., "0.0.0.0:8000")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// SQLite database URL (e.g., "sqlite://laundry.db")
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum number of pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Secret used to sign JWT access tokens
    #[serde(default = "default_jwt_secret")]
    pub jwt_secret: String,
    /// Access token lifetime in hours
    #[serde(default = "default_token_expiry_hours")]
    pub token_expiry_hours: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct QuotaConfig {
    /// Smallest accepted number of clothes per request
    #[serde(default = "default_min_clothes")]
    pub min_clothes_per_request: i64,
    /// Largest accepted number of clothes per request
    #[serde(default = "default_max_clothes")]
    pub max_clothes_per_request: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "laundry_rs=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format: "pretty" or "json"
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_listen_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_database_url() -> String {
    "sqlite://laundry.db".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_jwt_secret() -> String {
    "change-me-in-production".to_string()
}

fn default_token_expiry_hours() -> u64 {
    24
}

fn default_min_clothes() -> i64 {
    1
}

fn default_max_clothes() -> i64 {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: default_jwt_secret(),
            token_expiry_hours: default_token_expiry_hours(),
        }
    }
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            min_clothes_per_request: default_min_clothes(),
            max_clothes_per_request: default_max_clothes(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            auth: AuthConfig::default(),
            quota: QuotaConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LaundryError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| LaundryError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.listen_addr.is_empty() {
            return Err(LaundryError::Config(
                "server.listen_addr must not be empty".to_string(),
            ));
        }

        if self.auth.jwt_secret.is_empty() {
            return Err(LaundryError::Config(
                "auth.jwt_secret must not be empty".to_string(),
            ));
        }

        if self.auth.token_expiry_hours == 0 {
            return Err(LaundryError::Config(
                "auth.token_expiry_hours must be at least 1".to_string(),
            ));
        }

        if self.quota.min_clothes_per_request < 1 {
            return Err(LaundryError::Config(
                "quota.min_clothes_per_request must be at least 1".to_string(),
            ));
        }

        if self.quota.max_clothes_per_request < self.quota.min_clothes_per_request {
            return Err(LaundryError::Config(
                "quota.max_clothes_per_request must not be below the minimum".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.quota.max_clothes_per_request, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[server]
listen_addr = "127.0.0.1:9000"

[database]
url = "sqlite://test.db"

[auth]
jwt_secret = "test-secret"
token_expiry_hours = 12

[quota]
max_clothes_per_request = 40
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.listen_addr, "127.0.0.1:9000");
        assert_eq!(config.database.url, "sqlite://test.db");
        assert_eq!(config.auth.token_expiry_hours, 12);
        assert_eq!(config.quota.max_clothes_per_request, 40);
        // Omitted sections fall back to defaults
        assert_eq!(config.quota.min_clothes_per_request, 1);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_bad_quota() {
        let mut config = Config::default();
        config.quota.max_clothes_per_request = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.quota.min_clothes_per_request = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let mut config = Config::default();
        config.auth.jwt_secret = String::new();
        assert!(config.validate().is_err());
    }
}
