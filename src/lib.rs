//! # Strongroom
//!
//! The persistence and encryption-plugin core of a secret store. Tenants own
//! secrets through tenant-secret links; each secret's material is kept as an
//! encrypted datum produced by a swappable crypto plugin; orders track
//! asynchronous requests that produce secrets.
//!
//! ## Architecture
//!
//! ```text
//! caller ──► Repository<E> ──► Session ──► ConnectionManager ──► SQLite
//!    │
//!    └────► CryptoPluginRegistry::select ──► CryptoPlugin::encrypt / decrypt
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use strongroom::{values, AppConfig, Result, Strongroom};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = AppConfig::from_env()?;
//!     let store = Strongroom::new(&config).await?;
//!
//!     let tenant = store.repositories.tenants.create(values! { "keystone_id": "abc" }).await?;
//!     println!("created tenant {:?}", tenant.base.id);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod crypto;
pub mod domain;
pub mod errors;
pub mod observability;
pub mod storage;

// Re-export commonly used types and traits
pub use config::AppConfig;
pub use crypto::{CryptoPlugin, CryptoPluginRegistry};
pub use domain::{EncryptedDatum, Entity, Order, Secret, Tenant, TenantSecret, Values};
pub use errors::{Result, StrongroomError};
pub use storage::{ConnectionManager, Repositories, Repository};

use std::sync::Arc;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Everything an embedding service needs: storage, repositories and crypto plugins
#[derive(Debug)]
pub struct Strongroom {
    pub manager: Arc<ConnectionManager>,
    pub repositories: Repositories,
    pub crypto: CryptoPluginRegistry,
}

impl Strongroom {
    /// Build the plugin registry and connect the database.
    ///
    /// Plugins are resolved before the pool so a bad plugin list fails fast
    /// without waiting on database retries.
    pub async fn new(config: &AppConfig) -> Result<Self> {
        config.validate()?;

        let crypto = CryptoPluginRegistry::from_config(&config.crypto)?;

        let manager = Arc::new(ConnectionManager::new(config.database.clone()));
        manager.configure().await?;

        tracing::info!(
            app_name = APP_NAME,
            version = VERSION,
            plugins = ?crypto.plugin_names(),
            "Strongroom initialized"
        );

        Ok(Self {
            repositories: Repositories::new(Arc::clone(&manager)),
            manager,
            crypto,
        })
    }

    /// Load configuration from the environment, then [`new`](Self::new)
    pub async fn from_env() -> Result<Self> {
        let config = AppConfig::from_env()?;
        observability::log_config_info(&config);
        Self::new(&config).await
    }

    /// Close the connection pool
    pub async fn shutdown(&self) {
        self.manager.close().await;
    }
}
