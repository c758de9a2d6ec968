//! Test database utilities for integration tests.
//!
//! Provides file-based SQLite databases under `data/test/` for test isolation
//! and easier debugging of test failures.

#![allow(clippy::duplicate_mod)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use strongroom::config::DatabaseConfig;
use strongroom::storage::{ConnectionManager, DbPool, Repositories};
use uuid::Uuid;

/// Counter for generating unique database names within a test run
static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Get the test database directory path
fn test_db_dir() -> PathBuf {
    let manifest_dir = std::env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(manifest_dir).join("data").join("test")
}

/// Generate a unique database filename for a test
fn unique_db_name(prefix: &str) -> String {
    let counter = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let uuid_short = &Uuid::new_v4().to_string()[..8];
    format!("{}_{}_{}_{}.db", prefix, std::process::id(), counter, uuid_short)
}

/// Connection settings for a test database file
pub fn test_db_config(path: &std::path::Path) -> DatabaseConfig {
    DatabaseConfig {
        url: format!("sqlite://{}", path.display()),
        max_connections: 5,
        min_connections: 1,
        max_retries: 0,
        retry_interval_seconds: 0,
        auto_create: true,
        ..Default::default()
    }
}

/// A schema-initialized test database that cleans up on drop.
pub struct TestDatabase {
    pub manager: Arc<ConnectionManager>,
    pub path: PathBuf,
    cleanup_on_drop: bool,
}

impl TestDatabase {
    /// Create a new test database with the schema applied.
    ///
    /// The database file is created under `data/test/` with a unique name.
    /// It will be automatically deleted when this struct is dropped.
    pub async fn new(prefix: &str) -> Self {
        Self::with_cleanup(prefix, true).await
    }

    /// Create a test database that persists after the test (for debugging).
    pub async fn persistent(prefix: &str) -> Self {
        Self::with_cleanup(prefix, false).await
    }

    /// Create a new test database with configurable cleanup behavior.
    pub async fn with_cleanup(prefix: &str, cleanup_on_drop: bool) -> Self {
        let db_dir = test_db_dir();
        std::fs::create_dir_all(&db_dir).expect("create test database directory");

        let path = db_dir.join(unique_db_name(prefix));
        let manager = Arc::new(ConnectionManager::new(test_db_config(&path)));
        manager.configure().await.expect("configure test database");

        Self { manager, path, cleanup_on_drop }
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

impl Drop for TestDatabase {
    fn drop(&mut self) {
        if self.cleanup_on_drop {
            // Best effort cleanup - don't panic in drop
            if let Err(e) = std::fs::remove_file(&self.path) {
                eprintln!("Warning: Failed to cleanup test database {:?}: {}", self.path, e);
            }
            let wal_path = self.path.with_extension("db-wal");
            let shm_path = self.path.with_extension("db-shm");
            let _ = std::fs::remove_file(wal_path);
            let _ = std::fs::remove_file(shm_path);
        }
    }
}
