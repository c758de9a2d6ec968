//! # Application Settings
//!
//! Configuration structures for the storage layer, the crypto plugin registry and
//! logging, validated with the `validator` crate.

use crate::errors::{Result, StrongroomError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use validator::Validate;

/// Default SQLite location used when no URL is configured
pub const DEFAULT_DATABASE_URL: &str = "sqlite://./data/strongroom.db";

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// Database configuration
    #[validate(nested)]
    pub database: DatabaseConfig,

    /// Crypto plugin configuration
    #[validate(nested)]
    pub crypto: CryptoConfig,

    /// Logging configuration
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// Load configuration from the process environment, reading a `.env` file first if present
    pub fn from_env() -> Result<Self> {
        // A missing .env file is the normal case outside development.
        let _ = dotenvy::dotenv();

        let config = Self {
            database: DatabaseConfig::from_env(),
            crypto: CryptoConfig::from_env(),
            observability: ObservabilityConfig::from_env(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(StrongroomError::from)?;

        self.validate_custom()?;

        Ok(())
    }

    /// Rules the derive attributes cannot express
    fn validate_custom(&self) -> Result<()> {
        if !self.database.is_sqlite() {
            return Err(StrongroomError::validation_field(
                "Database URL must start with 'sqlite:'",
                "database.url",
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(StrongroomError::validation_field(
                "min_connections cannot be greater than max_connections",
                "database.min_connections",
            ));
        }

        let mut seen = Vec::new();
        for plugin in &self.crypto.enabled_plugins {
            if seen.contains(&plugin) {
                return Err(StrongroomError::validation_field(
                    format!("Crypto plugin '{}' is listed more than once", plugin),
                    "crypto.enabled_plugins",
                ));
            }
            seen.push(plugin);
        }

        Ok(())
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct DatabaseConfig {
    /// Database connection URL
    #[validate(length(min = 1, message = "Database URL cannot be empty"))]
    pub url: String,

    /// Maximum number of connections in the pool
    #[validate(range(
        min = 1,
        max = 100,
        message = "Max connections must be between 1 and 100"
    ))]
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    #[validate(range(
        min = 0,
        max = 50,
        message = "Min connections must be between 0 and 50"
    ))]
    pub min_connections: u32,

    /// Connection timeout in seconds
    #[validate(range(
        min = 1,
        max = 60,
        message = "Connect timeout must be between 1 and 60 seconds"
    ))]
    pub connect_timeout_seconds: u64,

    /// Seconds after which pooled connections are recycled (0 = never)
    pub idle_timeout_seconds: u64,

    /// Retries after the first failed connection attempt
    #[validate(range(max = 10000, message = "Max retries must be at most 10000"))]
    pub max_retries: u32,

    /// Sleep between connection attempts in seconds
    #[validate(range(
        max = 300,
        message = "Retry interval must be at most 300 seconds"
    ))]
    pub retry_interval_seconds: u64,

    /// Create the schema when the pool is first established
    pub auto_create: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: 10,
            min_connections: 0,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 3600,
            max_retries: 60,
            retry_interval_seconds: 1,
            auto_create: true,
        }
    }
}

impl DatabaseConfig {
    /// Get connection timeout as Duration
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get idle timeout as Duration (None if 0)
    pub fn idle_timeout(&self) -> Option<Duration> {
        if self.idle_timeout_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.idle_timeout_seconds))
        }
    }

    /// Get retry interval as Duration
    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_seconds)
    }

    /// Check if this is a SQLite configuration
    pub fn is_sqlite(&self) -> bool {
        self.url.starts_with("sqlite:")
    }

    /// Create DatabaseConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let url = std::env::var("STRONGROOM_DATABASE_URL").unwrap_or(defaults.url);

        Self {
            url,
            max_connections: env_parse("STRONGROOM_DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.max_connections),
            min_connections: env_parse("STRONGROOM_DATABASE_MIN_CONNECTIONS")
                .unwrap_or(defaults.min_connections),
            connect_timeout_seconds: env_parse("STRONGROOM_DATABASE_CONNECT_TIMEOUT_SECONDS")
                .unwrap_or(defaults.connect_timeout_seconds),
            idle_timeout_seconds: env_parse("STRONGROOM_DATABASE_IDLE_TIMEOUT_SECONDS")
                .unwrap_or(defaults.idle_timeout_seconds),
            max_retries: env_parse("STRONGROOM_DATABASE_MAX_RETRIES")
                .unwrap_or(defaults.max_retries),
            retry_interval_seconds: env_parse("STRONGROOM_DATABASE_RETRY_INTERVAL_SECONDS")
                .unwrap_or(defaults.retry_interval_seconds),
            auto_create: env_flag("STRONGROOM_DATABASE_AUTO_CREATE")
                .unwrap_or(defaults.auto_create),
        }
    }
}

/// Crypto plugin configuration
#[derive(Clone, Serialize, Deserialize, Validate)]
pub struct CryptoConfig {
    /// Ordered plugin identifiers; selection walks them front to back
    #[validate(length(min = 1, message = "At least one crypto plugin must be enabled"))]
    pub enabled_plugins: Vec<String>,

    /// Base64-encoded 32-byte master key encryption key
    pub master_key: Option<String>,

    /// Label recorded with every datum encrypted under the master key
    #[validate(length(min = 1, message = "Master key version cannot be empty"))]
    pub master_key_version: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            enabled_plugins: vec!["simple_crypto".to_string()],
            master_key: None,
            master_key_version: "default".to_string(),
        }
    }
}

impl fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("enabled_plugins", &self.enabled_plugins)
            .field("master_key", &self.master_key.as_ref().map(|_| "[REDACTED]"))
            .field("master_key_version", &self.master_key_version)
            .finish()
    }
}

impl CryptoConfig {
    /// Create CryptoConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let enabled_plugins = std::env::var("STRONGROOM_CRYPTO_PLUGINS")
            .map(|s| parse_plugin_list(&s))
            .unwrap_or(defaults.enabled_plugins);

        Self {
            enabled_plugins,
            master_key: std::env::var("STRONGROOM_MASTER_KEY").ok().filter(|k| !k.is_empty()),
            master_key_version: std::env::var("STRONGROOM_MASTER_KEY_VERSION")
                .unwrap_or(defaults.master_key_version),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ObservabilityConfig {
    /// Log level or filter directive used when RUST_LOG is unset
    #[validate(length(min = 1, message = "Log level cannot be empty"))]
    pub log_level: String,

    /// Enable JSON structured logging
    pub json_logging: bool,

    /// Log every SQL statement
    pub debug: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logging: false,
            debug: false,
        }
    }
}

impl ObservabilityConfig {
    /// Create ObservabilityConfig from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or(defaults.log_level),
            json_logging: env_flag("STRONGROOM_LOG_JSON").unwrap_or(defaults.json_logging),
            debug: env_flag("STRONGROOM_DEBUG").unwrap_or(defaults.debug),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|s| {
        let s = s.trim().to_lowercase();
        s == "true" || s == "1" || s == "yes"
    })
}

/// Split a comma separated plugin list, dropping blanks
pub fn parse_plugin_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
