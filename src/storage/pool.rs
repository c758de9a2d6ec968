//! # Database Connection Pool Management
//!
//! The [`ConnectionManager`] owns the lazily constructed connection pool and
//! hands out [`Session`]s bound to it. Pool construction goes through a
//! [`Connector`] and is retried while the failure looks like a transient
//! connectivity problem; everything after connect time is never retried.

use crate::config::DatabaseConfig;
use crate::errors::{Result, StrongroomError};
use crate::storage::migrations::run_migrations;
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePoolOptions},
    Pool, Sqlite, Transaction,
};
use std::fmt;
use std::io::ErrorKind;
use std::{str::FromStr, sync::Arc, time::Duration};
use tokio::sync::OnceCell;
use tracing::Instrument;

/// Type alias for the database connection pool
pub type DbPool = Pool<Sqlite>;

const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// MySQL client codes for "can't connect" and "server has gone away"
const MYSQL_TRANSIENT_CODES: &[&str] = &["2002", "2003", "2006"];

/// PostgreSQL SQLSTATEs for connection exceptions and "cannot connect now"
const POSTGRES_TRANSIENT_CODES: &[&str] = &["08000", "08001", "08004", "08006", "57P03"];

/// SQLITE_BUSY
const SQLITE_TRANSIENT_CODES: &[&str] = &["5"];

/// Establishes a connection pool from configuration.
///
/// The manager owns one connector; tests swap in connectors that fail on purpose.
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn connect(&self, config: &DatabaseConfig) -> std::result::Result<DbPool, sqlx::Error>;
}

/// Default connector for file-backed SQLite databases
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteConnector;

#[async_trait]
impl Connector for SqliteConnector {
    async fn connect(&self, config: &DatabaseConfig) -> std::result::Result<DbPool, sqlx::Error> {
        let connect_options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .busy_timeout(SQLITE_BUSY_TIMEOUT)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.connect_timeout())
            .test_before_acquire(true);

        let pool_options = if let Some(recycle) = config.idle_timeout() {
            pool_options.idle_timeout(recycle).max_lifetime(recycle)
        } else {
            pool_options
        };

        let pool = pool_options.connect_with(connect_options).await?;

        // Connectivity check so a pool that cannot serve queries counts as a failed connect
        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(pool)
    }
}

/// Whether a connect-time failure is worth another attempt.
pub fn is_connection_error(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(io) => matches!(
            io.kind(),
            ErrorKind::ConnectionRefused
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::NotConnected
                | ErrorKind::TimedOut
                | ErrorKind::BrokenPipe
        ),
        sqlx::Error::PoolTimedOut => true,
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| {
            let code: &str = &code;
            MYSQL_TRANSIENT_CODES.contains(&code)
                || POSTGRES_TRANSIENT_CODES.contains(&code)
                || SQLITE_TRANSIENT_CODES.contains(&code)
        }),
        _ => false,
    }
}

/// Call the connector until it succeeds, fails with a non-transient error, or
/// `max_retries` retries have been spent.
pub async fn connect_with_retry(
    connector: &dyn Connector,
    config: &DatabaseConfig,
) -> Result<DbPool> {
    let mut retries: u32 = 0;

    loop {
        match connector.connect(config).await {
            Ok(pool) => {
                if retries > 0 {
                    tracing::info!(retries, "Database connection established after retries");
                }
                return Ok(pool);
            }
            Err(e) if is_connection_error(&e) => {
                if retries >= config.max_retries {
                    tracing::error!(
                        error = %e,
                        url = %sanitize_url(&config.url),
                        attempts = retries + 1,
                        "Database connection retries exhausted"
                    );
                    return Err(StrongroomError::TransientStorage {
                        attempts: retries + 1,
                        source: e,
                    });
                }

                tracing::warn!(
                    error = %e,
                    url = %sanitize_url(&config.url),
                    attempts_left = config.max_retries - retries,
                    retry_interval_ms = config.retry_interval().as_millis(),
                    "Database connection failed, retrying"
                );
                retries += 1;
                tokio::time::sleep(config.retry_interval()).await;
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    url = %sanitize_url(&config.url),
                    "Failed to create database pool"
                );
                return Err(StrongroomError::database(
                    e,
                    format!("Failed to connect to database: {}", sanitize_url(&config.url)),
                ));
            }
        }
    }
}

/// Validate, connect with retry, and create the schema when asked to.
async fn establish(config: &DatabaseConfig, connector: &dyn Connector) -> Result<DbPool> {
    validate_config(config)?;

    let pool = connect_with_retry(connector, config).await?;

    tracing::info!(
        url = %sanitize_url(&config.url),
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        connect_timeout_ms = config.connect_timeout().as_millis(),
        idle_timeout_ms = config.idle_timeout().map(|d| d.as_millis()),
        "Database connection pool created"
    );

    if config.auto_create {
        tracing::info!("Auto-create enabled, applying schema");
        run_migrations(&pool).await?;
    } else {
        tracing::info!("Auto-create disabled, expecting an existing schema");
    }

    Ok(pool)
}

/// Create a pool directly with the default SQLite connector.
pub async fn create_pool(config: &DatabaseConfig) -> Result<DbPool> {
    establish(config, &SqliteConnector).await
}

/// How a [`Session`] scopes its statements
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    /// Run each statement on its own; when false the session owns a transaction
    pub autocommit: bool,
    /// Reload written entities from storage after commit
    pub expire_on_commit: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::autocommit()
    }
}

impl SessionOptions {
    /// Plain pooled connection for reads
    pub const fn autocommit() -> Self {
        Self {
            autocommit: true,
            expire_on_commit: false,
        }
    }

    /// Explicit transaction, reloading after commit
    pub const fn transactional() -> Self {
        Self {
            autocommit: false,
            expire_on_commit: true,
        }
    }
}

enum SessionScope {
    Autocommit(PoolConnection<Sqlite>),
    Transaction(Transaction<'static, Sqlite>),
}

/// Unit of work over one pooled connection.
///
/// A transactional session rolls back when dropped without [`Session::commit`].
pub struct Session {
    scope: SessionScope,
    options: SessionOptions,
}

impl Session {
    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn is_transactional(&self) -> bool {
        matches!(self.scope, SessionScope::Transaction(_))
    }

    /// Connection to run statements on
    pub fn connection(&mut self) -> &mut SqliteConnection {
        match &mut self.scope {
            SessionScope::Autocommit(conn) => &mut **conn,
            SessionScope::Transaction(tx) => &mut **tx,
        }
    }

    /// Commit the owned transaction; a no-op for autocommit sessions
    pub async fn commit(self) -> Result<()> {
        match self.scope {
            SessionScope::Autocommit(_) => Ok(()),
            SessionScope::Transaction(tx) => tx
                .commit()
                .await
                .map_err(|e| StrongroomError::database(e, "Failed to commit transaction")),
        }
    }

    /// Roll back the owned transaction; a no-op for autocommit sessions
    pub async fn rollback(self) -> Result<()> {
        match self.scope {
            SessionScope::Autocommit(_) => Ok(()),
            SessionScope::Transaction(tx) => tx
                .rollback()
                .await
                .map_err(|e| StrongroomError::database(e, "Failed to roll back transaction")),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("transactional", &self.is_transactional())
            .field("options", &self.options)
            .finish()
    }
}

/// Owns the shared pool and the policy for building it.
///
/// Injected into repositories as `Arc<ConnectionManager>`.
pub struct ConnectionManager {
    config: DatabaseConfig,
    connector: Arc<dyn Connector>,
    pool: OnceCell<DbPool>,
}

impl ConnectionManager {
    /// Manager using the default SQLite connector
    pub fn new(config: DatabaseConfig) -> Self {
        Self::with_connector(config, Arc::new(SqliteConnector))
    }

    pub fn with_connector(config: DatabaseConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            pool: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn is_configured(&self) -> bool {
        self.pool.initialized()
    }

    /// Build the pool on first call; later and concurrent callers share the result.
    ///
    /// A failed build leaves the manager unconfigured so a later call can try again.
    pub async fn configure(&self) -> Result<&DbPool> {
        self.pool
            .get_or_try_init(|| {
                establish(&self.config, self.connector.as_ref())
                    .instrument(crate::db_span!("configure_pool"))
            })
            .await
    }

    /// Handle to the shared pool, configuring it if needed
    pub async fn pool(&self) -> Result<DbPool> {
        self.configure().await.cloned()
    }

    /// New session bound to the shared pool
    pub async fn get_session(&self, options: SessionOptions) -> Result<Session> {
        let pool = self.configure().await?;

        let scope = if options.autocommit {
            let conn = pool.acquire().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to acquire database connection");
                StrongroomError::database(e, "Failed to acquire database connection")
            })?;
            SessionScope::Autocommit(conn)
        } else {
            let tx = pool.begin().await.map_err(|e| {
                tracing::error!(error = %e, "Failed to begin transaction");
                StrongroomError::database(e, "Failed to begin transaction")
            })?;
            SessionScope::Transaction(tx)
        };

        Ok(Session { scope, options })
    }

    /// Statistics for the pool, if it has been built
    pub fn pool_stats(&self) -> Option<PoolStats> {
        self.pool.get().map(get_pool_stats)
    }

    /// Close the pool; sessions can no longer be created afterwards
    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
            tracing::info!("Database connection pool closed");
        }
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("url", &sanitize_url(&self.config.url))
            .field("connector", &self.connector)
            .field("configured", &self.is_configured())
            .finish()
    }
}

/// Validate database configuration
fn validate_config(config: &DatabaseConfig) -> Result<()> {
    if config.max_connections == 0 {
        return Err(StrongroomError::validation("max_connections must be greater than 0"));
    }

    if config.min_connections > config.max_connections {
        return Err(StrongroomError::validation(
            "min_connections cannot be greater than max_connections",
        ));
    }

    if config.url.is_empty() {
        return Err(StrongroomError::validation("database URL cannot be empty"));
    }

    if !config.is_sqlite() {
        return Err(StrongroomError::validation("database URL must start with 'sqlite:'"));
    }

    Ok(())
}

/// Sanitize database URL for logging (remove credentials)
fn sanitize_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        if parsed.password().is_some() || !parsed.username().is_empty() {
            format!(
                "{}://***:***@{}{}",
                parsed.scheme(),
                parsed.host_str().unwrap_or("unknown"),
                parsed.path()
            )
        } else {
            url.to_string()
        }
    } else {
        url.to_string()
    }
}

/// Get pool statistics for monitoring
pub fn get_pool_stats(pool: &DbPool) -> PoolStats {
    PoolStats {
        size: pool.size(),
        idle: pool.num_idle(),
    }
}

/// Pool statistics for monitoring
#[derive(Debug, Clone)]
pub struct PoolStats {
    /// Total connections in the pool
    pub size: u32,
    /// Number of idle connections
    pub idle: usize,
}

impl PoolStats {
    /// Get the number of active connections
    pub fn active(&self) -> u32 {
        self.size.saturating_sub(self.idle as u32)
    }

    /// Check if the pool is healthy (has available connections)
    pub fn is_healthy(&self) -> bool {
        self.size > 0
    }
}
