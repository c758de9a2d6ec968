//! # Storage and Persistence
//!
//! Connection management, schema creation and the transactional repository
//! layer for tenants, secrets, encrypted data, tenant links and orders.

pub mod migrations;
pub mod pool;
pub mod repositories;
pub mod repository;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use crate::config::DatabaseConfig;

pub use migrations::{
    get_migration_version, list_applied_migrations, run_migrations, validate_migrations,
    MigrationInfo,
};
pub use pool::{
    connect_with_retry, create_pool, get_pool_stats, is_connection_error, ConnectionManager,
    Connector, DbPool, PoolStats, Session, SessionOptions, SqliteConnector,
};
pub use repositories::{
    EncryptedDatumRepository, OrderRepository, Repositories, SecretRepository, TenantRepository,
    TenantSecretRepository,
};
pub use repository::Repository;

use crate::errors::{Result, StrongroomError};

/// Check database connectivity
pub async fn check_connection(pool: &DbPool) -> Result<()> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(|e| StrongroomError::database(e, "Database connectivity check failed"))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_helpers::TestDatabase;

    #[tokio::test]
    async fn test_check_connection() {
        let db = TestDatabase::new("check_connection").await;
        let pool = db.pool().await;
        assert!(check_connection(&pool).await.is_ok());

        let stats = db.manager.pool_stats().expect("pool is configured");
        assert!(stats.is_healthy());
    }
}
