//! # Structured Logging
//!
//! Subscriber setup and span macros for the storage and crypto layers.

use crate::config::{AppConfig, ObservabilityConfig};
use crate::errors::{Result, StrongroomError};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Create a tracing span for database operations.
///
/// ```rust,ignore
/// let span = db_span!("configure_pool");
/// let span = db_span!("create", entity = "Secret");
/// ```
#[macro_export]
macro_rules! db_span {
    ($operation:expr) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($operation:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "db_operation",
            operation = %$operation,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Create a tracing span for crypto plugin calls
#[macro_export]
macro_rules! crypto_span {
    ($operation:expr, $plugin:expr) => {
        tracing::debug_span!(
            "crypto_operation",
            operation = %$operation,
            plugin = %$plugin
        )
    };
    ($operation:expr, $plugin:expr, $($field:tt)*) => {
        tracing::debug_span!(
            "crypto_operation",
            operation = %$operation,
            plugin = %$plugin,
            $($field)*
        )
    };
}

/// Filter directives for the configured level; SQL statements are logged only in debug mode
pub fn build_env_filter(config: &ObservabilityConfig) -> Result<EnvFilter> {
    let sqlx_directive = if config.debug { "sqlx=debug" } else { "sqlx=warn" };
    let directives = format!("{},{}", config.log_level, sqlx_directive);

    EnvFilter::try_new(&directives).map_err(|e| {
        StrongroomError::config_with_source(
            format!("Invalid log filter '{}'", directives),
            Box::new(e),
        )
    })
}

/// Install the global subscriber: plain text or JSON lines.
pub fn init_logging(config: &ObservabilityConfig) -> Result<()> {
    let filter = build_env_filter(config)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if config.json_logging {
        registry.with(fmt::layer().json()).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    };

    installed.map_err(|e| {
        StrongroomError::config_with_source("Failed to install tracing subscriber", Box::new(e))
    })
}

/// Log configuration at startup
pub fn log_config_info(config: &AppConfig) {
    tracing::info!(
        database_max_connections = config.database.max_connections,
        database_max_retries = config.database.max_retries,
        database_retry_interval_s = config.database.retry_interval_seconds,
        database_auto_create = config.database.auto_create,
        crypto_plugins = ?config.crypto.enabled_plugins,
        master_key_version = %config.crypto.master_key_version,
        sql_debug = config.observability.debug,
        "strongroom configuration"
    );
}
