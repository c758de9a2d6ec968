//! # Configuration Management
//!
//! Settings consumed by the connection manager, the crypto plugin registry and
//! logging setup. Values come from `STRONGROOM_*` environment variables or are
//! built directly by the embedding service.

pub mod settings;

pub use settings::{
    parse_plugin_list, AppConfig, CryptoConfig, DatabaseConfig, ObservabilityConfig,
    DEFAULT_DATABASE_URL,
};
