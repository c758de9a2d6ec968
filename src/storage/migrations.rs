//! # Schema Management
//!
//! Schema migrations are embedded in the library and applied when the
//! connection manager first builds its pool with `auto_create` enabled. Each
//! migration runs in its own transaction and is recorded in
//! `_strongroom_migrations`.

use crate::errors::{Result, StrongroomError};
use crate::storage::DbPool;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::sqlite::{SqliteConnection, SqliteQueryResult};
use sqlx::{Executor, Row};
use std::future::Future;
use std::pin::Pin;
use tracing::{error, info, warn};

/// Embedded migrations as (file stem, SQL), ordered by version
const MIGRATIONS: &[(&str, &str)] = &[(
    "20240101000001_initial_schema",
    include_str!("../../migrations/20240101000001_initial_schema.sql"),
)];

/// A statement on the migration transaction, boxed as `Send` so callers' futures stay `Send`
type Statement<'c> = Pin<Box<dyn Future<Output = std::result::Result<SqliteQueryResult, sqlx::Error>> + Send + 'c>>;

/// Migration information structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationInfo {
    pub version: i64,
    pub description: String,
    pub installed_on: chrono::DateTime<chrono::Utc>,
    pub execution_time: i64,
    pub checksum: Vec<u8>,
}

/// Run all pending database migrations
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    info!("Starting database migration process");

    create_migration_table(pool).await?;

    let applied = get_applied_migration_versions(pool).await?;

    let mut migrations_run = 0;
    for (filename, sql) in MIGRATIONS {
        let version = extract_version_from_filename(filename)?;

        if applied.contains(&version) {
            info!(version = version, "Migration already applied: {}", filename);
            continue;
        }

        info!(version = version, "Running migration: {}", filename);
        let start_time = std::time::Instant::now();

        let mut tx = pool.begin().await.map_err(|e| {
            StrongroomError::database(e, "Failed to start migration transaction")
        })?;

        // raw_sql allows multi-statement migration files
        let conn: &mut SqliteConnection = &mut tx;
        let statement: Statement<'_> = Box::pin(async move { conn.execute(sqlx::raw_sql(sql)).await });
        statement.await.map_err(|e| {
            error!(error = %e, migration = filename, "Migration failed");
            StrongroomError::database(e, format!("Migration failed: {}", filename))
        })?;

        let execution_time = start_time.elapsed().as_millis() as i64;
        let checksum = calculate_checksum(sql);
        let now = chrono::Utc::now();

        let conn: &mut SqliteConnection = &mut tx;
        let statement: Statement<'_> = Box::pin(async move {
            sqlx::query(
                "INSERT INTO _strongroom_migrations (version, description, checksum, execution_time, installed_on) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(version)
            .bind(*filename)
            .bind(&checksum)
            .bind(execution_time)
            .bind(now)
            .execute(conn)
            .await
        });
        statement.await.map_err(|e| {
            error!(error = %e, migration = filename, "Failed to record migration");
            StrongroomError::database(e, format!("Failed to record migration: {}", filename))
        })?;

        tx.commit().await.map_err(|e| {
            StrongroomError::database(e, "Failed to commit migration transaction")
        })?;

        migrations_run += 1;
        info!(
            version = version,
            execution_time_ms = execution_time,
            "Migration completed: {}",
            filename
        );
    }

    if migrations_run > 0 {
        info!(count = migrations_run, "Database migrations completed");
    } else {
        info!("No pending migrations");
    }

    Ok(())
}

/// Create the migration tracking table
async fn create_migration_table(pool: &DbPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS _strongroom_migrations (
            version BIGINT PRIMARY KEY,
            description TEXT NOT NULL,
            checksum BLOB NOT NULL,
            execution_time BIGINT NOT NULL,
            installed_on TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
    "#,
    )
    .execute(pool)
    .await
    .map_err(|e| StrongroomError::database(e, "Failed to create migration tracking table"))?;

    Ok(())
}

fn is_missing_table(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db_err)
        if db_err.message().contains("no such table: _strongroom_migrations"))
}

/// Get list of applied migration versions
async fn get_applied_migration_versions(pool: &DbPool) -> Result<Vec<i64>> {
    let rows = sqlx::query("SELECT version FROM _strongroom_migrations ORDER BY version")
        .fetch_all(pool)
        .await;

    match rows {
        Ok(rows) => Ok(rows.into_iter().map(|row| row.get::<i64, _>("version")).collect()),
        // Table doesn't exist yet, expected before the first run
        Err(e) if is_missing_table(&e) => Ok(Vec::new()),
        Err(e) => Err(StrongroomError::database(e, "Failed to get applied migrations")),
    }
}

/// Extract version number from migration filename
fn extract_version_from_filename(filename: &str) -> Result<i64> {
    let version_str = filename.split('_').next().ok_or_else(|| {
        StrongroomError::validation(format!("Invalid migration filename: {}", filename))
    })?;

    version_str.parse::<i64>().map_err(|_| {
        StrongroomError::validation(format!("Invalid version in filename: {}", filename))
    })
}

/// SHA-256 of the migration text
fn calculate_checksum(content: &str) -> Vec<u8> {
    Sha256::digest(content.as_bytes()).to_vec()
}

/// Validate that exactly the embedded migrations are applied
pub async fn validate_migrations(pool: &DbPool) -> Result<bool> {
    info!("Validating migration integrity");

    let applied = list_applied_migrations(pool).await?;

    for (filename, sql) in MIGRATIONS {
        let version = extract_version_from_filename(filename)?;
        match applied.iter().find(|m| m.version == version) {
            None => {
                warn!(version = version, "Missing migration");
                return Ok(false);
            }
            Some(info) if info.checksum != calculate_checksum(sql) => {
                warn!(version = version, "Migration checksum mismatch");
                return Ok(false);
            }
            Some(_) => {}
        }
    }

    let expected_versions = MIGRATIONS
        .iter()
        .map(|(filename, _)| extract_version_from_filename(filename))
        .collect::<Result<Vec<_>>>()?;
    for info in &applied {
        if !expected_versions.contains(&info.version) {
            warn!(version = info.version, "Unexpected migration found");
            return Ok(false);
        }
    }

    info!("Migration validation successful");
    Ok(true)
}

/// Get the current migration version (highest applied)
pub async fn get_migration_version(pool: &DbPool) -> Result<i64> {
    let applied = get_applied_migration_versions(pool).await?;
    Ok(applied.into_iter().max().unwrap_or(0))
}

/// List all applied migrations
pub async fn list_applied_migrations(pool: &DbPool) -> Result<Vec<MigrationInfo>> {
    let rows = sqlx::query("SELECT version, description, checksum, execution_time, installed_on FROM _strongroom_migrations ORDER BY version")
        .fetch_all(pool)
        .await;

    match rows {
        Ok(rows) => {
            let migrations = rows
                .into_iter()
                .map(|row| MigrationInfo {
                    version: row.get("version"),
                    description: row.get("description"),
                    installed_on: row.get("installed_on"),
                    execution_time: row.get("execution_time"),
                    checksum: row.get("checksum"),
                })
                .collect();
            Ok(migrations)
        }
        Err(e) if is_missing_table(&e) => Ok(Vec::new()),
        Err(e) => Err(StrongroomError::database(e, "Failed to list applied migrations")),
    }
}
