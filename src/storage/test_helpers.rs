//! Test database utilities for in-library tests.
//!
//! Each `TestDatabase` is a fresh SQLite file in its own temporary directory,
//! reached through a `ConnectionManager` that has already applied the schema.
//! The directory is removed when the struct is dropped.
//!
//! This module is only available in test builds (`#[cfg(test)]`).

use crate::config::DatabaseConfig;
use crate::storage::{ConnectionManager, DbPool, Repositories};
use std::sync::Arc;
use tempfile::TempDir;

/// A schema-initialized SQLite database that lives as long as this struct.
pub struct TestDatabase {
    pub manager: Arc<ConnectionManager>,
    _dir: TempDir,
}

impl TestDatabase {
    /// Create a fresh database with the schema applied
    pub async fn new(prefix: &str) -> Self {
        let dir = tempfile::Builder::new()
            .prefix(&format!("strongroom_{}_", prefix))
            .tempdir()
            .expect("create temporary database directory");

        let config = DatabaseConfig {
            url: format!("sqlite://{}", dir.path().join("strongroom.db").display()),
            max_connections: 5,
            min_connections: 1,
            max_retries: 0,
            retry_interval_seconds: 0,
            auto_create: true,
            ..Default::default()
        };

        let manager = Arc::new(ConnectionManager::new(config));
        manager.configure().await.expect("configure test database");

        Self { manager, _dir: dir }
    }

    /// Handle to the underlying pool
    pub async fn pool(&self) -> DbPool {
        self.manager.pool().await.expect("test database pool")
    }

    /// Repositories bound to this database
    pub fn repositories(&self) -> Repositories {
        Repositories::new(Arc::clone(&self.manager))
    }
}
