//! # Generic Entity Repository
//!
//! One transactional engine shared by every entity type. The per-entity
//! differences (table, columns, name lookup, purgeable attributes, validation)
//! come from the [`Entity`] implementation; this module owns session handling,
//! value merging, timestamping and the mapping of write failures onto the
//! error taxonomy.
//!
//! Every mutating call runs in exactly one transactional [`Session`]. Reads
//! that decide whether a mutation may proceed happen inside that session, and
//! an early return drops the session, which rolls the transaction back.

use crate::domain::{ColumnValue, Entity, Values};
use crate::errors::{Result, StrongroomError};
use crate::storage::pool::{ConnectionManager, Session, SessionOptions};
use chrono::Utc;
use serde_json::Value;
use sqlx::error::ErrorKind;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnection, SqliteRow};
use sqlx::{FromRow, Sqlite};
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

/// Fields an update may not change; the deleted pair only moves through soft delete
const IMMUTABLE_FIELDS: &[&str] = &["id", "created_at", "deleted", "deleted_at"];

/// A statement running on a borrowed connection.
///
/// Statements are built and awaited outside any generic context and rows are
/// decoded afterwards with [`FromRow`], so repository futures stay `Send`.
pub(crate) type Statement<'c, T> =
    Pin<Box<dyn Future<Output = std::result::Result<T, sqlx::Error>> + Send + 'c>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MergeMode {
    Create,
    Update,
}

/// Repository for one entity type
pub struct Repository<E: Entity> {
    manager: Arc<ConnectionManager>,
    expire_on_commit: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Repository<E> {
    fn clone(&self) -> Self {
        Self {
            manager: Arc::clone(&self.manager),
            expire_on_commit: self.expire_on_commit,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &E::ENTITY_NAME)
            .field("expire_on_commit", &self.expire_on_commit)
            .finish()
    }
}

impl<E: Entity> Repository<E> {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            manager,
            expire_on_commit: true,
            _entity: PhantomData,
        }
    }

    /// Whether writes reload the entity after commit (the default) or return
    /// the row as read inside the transaction
    pub fn with_expire_on_commit(mut self, expire_on_commit: bool) -> Self {
        self.expire_on_commit = expire_on_commit;
        self
    }

    pub fn manager(&self) -> &Arc<ConnectionManager> {
        &self.manager
    }

    fn write_options(&self) -> SessionOptions {
        SessionOptions {
            autocommit: false,
            expire_on_commit: self.expire_on_commit,
        }
    }

    /// Fetch by id, failing with `NotFound` when absent or soft deleted
    #[instrument(skip(self), fields(entity = E::ENTITY_NAME), name = "db_get")]
    pub async fn get(&self, id: &E::Id, include_deleted: bool) -> Result<E> {
        self.find(id, include_deleted)
            .await?
            .ok_or_else(|| StrongroomError::not_found(E::ENTITY_NAME, id))
    }

    /// Fetch by id, returning `None` instead of failing
    pub async fn find(&self, id: &E::Id, include_deleted: bool) -> Result<Option<E>> {
        let mut session = self.manager.get_session(SessionOptions::autocommit()).await?;
        fetch_by_id::<E>(session.connection(), id.as_ref(), include_deleted).await
    }

    /// Live entity with the given name
    #[instrument(skip(self), fields(entity = E::ENTITY_NAME), name = "db_find_by_name")]
    pub async fn find_by_name(&self, name: &str) -> Result<E> {
        self.try_find_by_name(name)
            .await?
            .ok_or_else(|| StrongroomError::not_found_by(E::ENTITY_NAME, "name", name))
    }

    /// Live entity with the given name, or `None`.
    ///
    /// Fails with `UnsupportedOperation` for entities that are not name-addressable,
    /// without touching storage.
    pub async fn try_find_by_name(&self, name: &str) -> Result<Option<E>> {
        let column = E::NAME_COLUMN
            .ok_or_else(|| StrongroomError::unsupported("find_by_name", E::ENTITY_NAME))?;
        self.find_unique_by(column, name).await
    }

    /// All rows ordered by creation time
    pub async fn list(&self, include_deleted: bool) -> Result<Vec<E>> {
        let sql = format!(
            "SELECT * FROM {}{} ORDER BY created_at, id",
            E::TABLE,
            if include_deleted { "" } else { " WHERE deleted = 0" }
        );
        let mut session = self.manager.get_session(SessionOptions::autocommit()).await?;
        let rows = fetch_rows(session.connection(), sql, Vec::new())
            .await
            .map_err(|e| read_error::<E>(e, "list"))?;
        decode_rows(rows).map_err(|e| read_error::<E>(e, "list"))
    }

    /// Rows whose `column` equals `value`, oldest first
    pub(crate) async fn list_by(
        &self,
        column: &'static str,
        value: &str,
        include_deleted: bool,
    ) -> Result<Vec<E>> {
        let sql = format!(
            "SELECT * FROM {} WHERE {} = ?{} ORDER BY created_at, id",
            E::TABLE,
            column,
            if include_deleted { "" } else { " AND deleted = 0" }
        );
        let mut session = self.manager.get_session(SessionOptions::autocommit()).await?;
        let rows = fetch_rows(session.connection(), sql, vec![text(value)])
            .await
            .map_err(|e| read_error::<E>(e, column))?;
        decode_rows(rows).map_err(|e| read_error::<E>(e, column))
    }

    /// The single live row whose `column` equals `value`.
    ///
    /// Several matches are reported as `Duplicate` rather than picking one.
    pub(crate) async fn find_unique_by(
        &self,
        column: &'static str,
        value: &str,
    ) -> Result<Option<E>> {
        let mut rows = self.list_by(column, value, false).await?;
        if rows.len() > 1 {
            return Err(StrongroomError::duplicate(
                format!("{} live rows match {} '{}'", rows.len(), column, value),
                E::ENTITY_NAME,
            ));
        }
        Ok(rows.pop())
    }

    /// Build an entity from a field mapping, validate and insert it.
    ///
    /// An `id` in `values` is kept, so two creates with the same id collide on
    /// the primary key and the second fails with `Duplicate`.
    #[instrument(skip(self, values), fields(entity = E::ENTITY_NAME), name = "db_create")]
    pub async fn create(&self, values: Values) -> Result<E> {
        let mut entity = E::default();
        merge_values(&mut entity, values, false, MergeMode::Create)?;

        let now = Utc::now();
        let base = entity.base_mut();
        if base.id.as_deref().map_or(true, str::is_empty) {
            base.id = Some(Uuid::new_v4().to_string());
        }
        base.created_at = now;
        base.updated_at = now;

        entity.validate()?;
        self.insert(entity).await
    }

    /// Insert an entity built in memory; it must not have an id yet
    #[instrument(skip(self, entity), fields(entity = E::ENTITY_NAME), name = "db_create_from")]
    pub async fn create_from(&self, entity: E) -> Result<E> {
        if entity.base().id.is_some() {
            return Err(StrongroomError::validation_field(
                format!("{} already has an id and cannot be created again", E::ENTITY_NAME),
                "id",
            ));
        }

        let mut entity = canonicalize_entity_owner(entity)?;
        let now = Utc::now();
        let base = entity.base_mut();
        base.id = Some(Uuid::new_v4().to_string());
        base.created_at = now;
        base.updated_at = now;

        entity.validate()?;
        self.insert(entity).await
    }

    async fn insert(&self, entity: E) -> Result<E> {
        let id = entity
            .base()
            .id
            .clone()
            .ok_or_else(|| StrongroomError::internal("insert requires an assigned id"))?;

        let mut session = self.manager.get_session(self.write_options()).await?;
        insert_row(session.connection(), &entity)
            .await
            .map_err(|e| classify_write_error(e, E::ENTITY_NAME, &id))?;

        let stored = self.finish(session, &id).await?;
        tracing::info!(entity = E::ENTITY_NAME, id = %id, "Created entity");
        Ok(stored)
    }

    /// Apply changed fields to the live entity, re-validate and persist.
    ///
    /// With `purge_props`, purgeable attributes missing from `values` are reset to null.
    #[instrument(skip(self, values), fields(entity = E::ENTITY_NAME), name = "db_update")]
    pub async fn update(&self, id: &E::Id, values: Values, purge_props: bool) -> Result<E> {
        let mut session = self.manager.get_session(self.write_options()).await?;

        let mut entity = fetch_by_id::<E>(session.connection(), id.as_ref(), false)
            .await?
            .ok_or_else(|| StrongroomError::not_found(E::ENTITY_NAME, id))?;

        let changed = merge_values(&mut entity, values, purge_props, MergeMode::Update)?;
        entity.base_mut().updated_at = Utc::now();
        entity.validate()?;

        let affected = update_row(session.connection(), &entity)
            .await
            .map_err(|e| classify_write_error(e, E::ENTITY_NAME, id.as_ref()))?;
        if affected == 0 {
            return Err(StrongroomError::not_found(E::ENTITY_NAME, id));
        }

        let stored = self.finish(session, id.as_ref()).await?;
        tracing::info!(entity = E::ENTITY_NAME, id = %id, changed = ?changed, "Updated entity");
        Ok(stored)
    }

    /// Persist an entity mutated in memory.
    ///
    /// Only a live row is written; a copy of a soft-deleted entity fails with
    /// `NotFound` instead of bringing the row back.
    #[instrument(skip(self, entity), fields(entity = E::ENTITY_NAME), name = "db_save")]
    pub async fn save(&self, entity: &E) -> Result<E> {
        let id = entity
            .base()
            .id
            .clone()
            .ok_or_else(|| StrongroomError::not_found(E::ENTITY_NAME, "<unsaved>"))?;

        let mut entity = canonicalize_entity_owner(entity.clone())?;
        entity.base_mut().updated_at = Utc::now();
        entity.validate()?;

        let mut session = self.manager.get_session(self.write_options()).await?;
        let affected = update_row(session.connection(), &entity)
            .await
            .map_err(|e| classify_write_error(e, E::ENTITY_NAME, &id))?;
        if affected == 0 {
            return Err(StrongroomError::not_found(E::ENTITY_NAME, &id));
        }

        let stored = self.finish(session, &id).await?;
        tracing::info!(entity = E::ENTITY_NAME, id = %id, "Saved entity");
        Ok(stored)
    }

    /// Soft delete: set the deleted flag and timestamps, leave the status alone.
    ///
    /// Dependents are not touched.
    #[instrument(skip(self, entity), fields(entity = E::ENTITY_NAME), name = "db_delete")]
    pub async fn delete_entity(&self, entity: &E) -> Result<()> {
        let id = entity
            .base()
            .id
            .clone()
            .ok_or_else(|| StrongroomError::not_found(E::ENTITY_NAME, "<unsaved>"))?;

        let now = Utc::now();
        let sql = format!(
            "UPDATE {} SET deleted = 1, deleted_at = ?, updated_at = ? WHERE id = ? AND deleted = 0",
            E::TABLE
        );

        let params = vec![
            ColumnValue::Timestamp(Some(now)),
            ColumnValue::Timestamp(Some(now)),
            text(&id),
        ];

        let mut session = self.manager.get_session(self.write_options()).await?;
        let affected = execute(session.connection(), sql, params)
            .await
            .map_err(|e| classify_write_error(e, E::ENTITY_NAME, &id))?;

        if affected == 0 {
            return Err(StrongroomError::not_found(E::ENTITY_NAME, &id));
        }

        session.commit().await?;
        tracing::info!(entity = E::ENTITY_NAME, id = %id, "Soft deleted entity");
        Ok(())
    }

    /// Physically remove a row; dependents follow the schema's ON DELETE rules
    #[instrument(skip(self), fields(entity = E::ENTITY_NAME), name = "db_purge")]
    pub async fn purge(&self, id: &E::Id) -> Result<()> {
        let sql = format!("DELETE FROM {} WHERE id = ?", E::TABLE);

        let mut session = self.manager.get_session(self.write_options()).await?;
        let affected = execute(session.connection(), sql, vec![text(id.as_ref())])
            .await
            .map_err(|e| classify_write_error(e, E::ENTITY_NAME, id.as_ref()))?;

        if affected == 0 {
            return Err(StrongroomError::not_found(E::ENTITY_NAME, id));
        }

        session.commit().await?;
        tracing::warn!(entity = E::ENTITY_NAME, id = %id, "Purged entity");
        Ok(())
    }

    /// Commit and produce the entity as stored
    async fn finish(&self, mut session: Session, id: &str) -> Result<E> {
        if session.options().expire_on_commit {
            session.commit().await?;
            let mut reader = self.manager.get_session(SessionOptions::autocommit()).await?;
            fetch_by_id::<E>(reader.connection(), id, true)
                .await?
                .ok_or_else(|| StrongroomError::not_found(E::ENTITY_NAME, id))
        } else {
            let stored = fetch_by_id::<E>(session.connection(), id, true)
                .await?
                .ok_or_else(|| StrongroomError::not_found(E::ENTITY_NAME, id))?;
            session.commit().await?;
            Ok(stored)
        }
    }
}

pub(crate) async fn fetch_by_id<E: Entity>(
    conn: &mut SqliteConnection,
    id: &str,
    include_deleted: bool,
) -> Result<Option<E>> {
    let sql = format!(
        "SELECT * FROM {} WHERE id = ?{}",
        E::TABLE,
        if include_deleted { "" } else { " AND deleted = 0" }
    );

    let rows = fetch_rows(conn, sql, vec![text(id)])
        .await
        .map_err(|e| read_error::<E>(e, "id"))?;
    let mut entities = decode_rows::<E>(rows).map_err(|e| read_error::<E>(e, "id"))?;
    Ok(entities.pop())
}

fn read_error<E: Entity>(error: sqlx::Error, lookup: &str) -> StrongroomError {
    tracing::error!(error = %error, entity = E::ENTITY_NAME, lookup, "Failed to read entities");
    StrongroomError::database(error, format!("Failed to read {} by {}", E::ENTITY_NAME, lookup))
}

pub(crate) fn text(value: &str) -> ColumnValue {
    ColumnValue::Text(Some(value.to_string()))
}

/// Run a query and collect its raw rows
pub(crate) fn fetch_rows(
    conn: &mut SqliteConnection,
    sql: String,
    params: Vec<ColumnValue>,
) -> Statement<'_, Vec<SqliteRow>> {
    Box::pin(async move {
        let mut query = sqlx::query(&sql);
        for value in params {
            query = bind_column(query, value);
        }
        query.fetch_all(&mut *conn).await
    })
}

/// Run a statement and report the number of rows it touched
pub(crate) fn execute(
    conn: &mut SqliteConnection,
    sql: String,
    params: Vec<ColumnValue>,
) -> Statement<'_, u64> {
    Box::pin(async move {
        let mut query = sqlx::query(&sql);
        for value in params {
            query = bind_column(query, value);
        }
        Ok(query.execute(&mut *conn).await?.rows_affected())
    })
}

pub(crate) fn decode_rows<E: Entity>(rows: Vec<SqliteRow>) -> std::result::Result<Vec<E>, sqlx::Error> {
    rows.iter().map(|row| E::from_row(row)).collect()
}

async fn insert_row<E: Entity>(
    conn: &mut SqliteConnection,
    entity: &E,
) -> std::result::Result<(), sqlx::Error> {
    let base = entity.base();
    let columns = entity.columns();

    let mut names = vec!["id", "created_at", "updated_at", "deleted_at", "deleted"];
    names.extend(columns.iter().map(|(name, _)| *name));
    let placeholders = vec!["?"; names.len()].join(", ");
    let sql = format!("INSERT INTO {} ({}) VALUES ({})", E::TABLE, names.join(", "), placeholders);

    let mut params = vec![
        ColumnValue::Text(base.id.clone()),
        ColumnValue::Timestamp(Some(base.created_at)),
        ColumnValue::Timestamp(Some(base.updated_at)),
        ColumnValue::Timestamp(base.deleted_at),
        ColumnValue::Bool(base.deleted),
    ];
    params.extend(columns.into_iter().map(|(_, value)| value));

    execute(conn, sql, params).await?;
    Ok(())
}

/// Write `updated_at` and the entity columns of a live row.
///
/// The deleted flag and timestamp belong to soft delete and are never written here.
async fn update_row<E: Entity>(
    conn: &mut SqliteConnection,
    entity: &E,
) -> std::result::Result<u64, sqlx::Error> {
    let base = entity.base();
    let id = base.id.clone().unwrap_or_default();
    let columns = entity.columns();

    let mut assignments = vec!["updated_at = ?".to_string()];
    assignments.extend(columns.iter().map(|(name, _)| format!("{} = ?", name)));
    let sql = format!(
        "UPDATE {} SET {} WHERE id = ? AND deleted = 0",
        E::TABLE,
        assignments.join(", ")
    );

    let mut params = vec![ColumnValue::Timestamp(Some(base.updated_at))];
    params.extend(columns.into_iter().map(|(_, value)| value));
    params.push(text(&id));

    execute(conn, sql, params).await
}

fn bind_column<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: ColumnValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        ColumnValue::Text(v) => query.bind(v),
        ColumnValue::Int(v) => query.bind(v),
        ColumnValue::Bool(v) => query.bind(v),
        ColumnValue::Blob(v) => query.bind(v),
        ColumnValue::Timestamp(v) => query.bind(v),
    }
}

/// Map a failed write onto the error taxonomy. Write failures are never retried.
pub(crate) fn classify_write_error(
    error: sqlx::Error,
    entity_name: &str,
    id: &str,
) -> StrongroomError {
    if let sqlx::Error::Database(db_err) = &error {
        match db_err.kind() {
            ErrorKind::UniqueViolation => {
                tracing::warn!(entity = entity_name, id, error = %db_err, "Uniqueness violation");
                return StrongroomError::duplicate(
                    format!("'{}' conflicts with an existing row: {}", id, db_err.message()),
                    entity_name,
                );
            }
            ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation => {
                tracing::warn!(entity = entity_name, id, error = %db_err, "Integrity violation");
                return StrongroomError::validation(format!(
                    "{} '{}' failed an integrity check: {}",
                    entity_name,
                    id,
                    db_err.message()
                ));
            }
            _ => {}
        }
    }

    tracing::error!(entity = entity_name, id, error = %error, "Failed to write entity");
    StrongroomError::database(error, format!("Failed to write {} '{}'", entity_name, id))
}

/// Empty string, false, zero and null all mean "no owner"
fn canonicalize_owner(values: &mut Values) {
    if let Some(owner) = values.get_mut("owner") {
        let unowned = match owner {
            Value::Null => true,
            Value::Bool(b) => !*b,
            Value::String(s) => s.is_empty(),
            Value::Number(n) => n.as_f64() == Some(0.0),
            _ => false,
        };
        if unowned {
            *owner = Value::Null;
        }
    }
}

fn entity_fields<E: Entity>(entity: &E) -> Result<Values> {
    match serde_json::to_value(entity) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(_) => Err(StrongroomError::internal(format!(
            "{} did not serialize to a field mapping",
            E::ENTITY_NAME
        ))),
        Err(e) => Err(StrongroomError::Serialization {
            source: e,
            context: format!("Failed to serialize {}", E::ENTITY_NAME),
        }),
    }
}

fn entity_from_fields<E: Entity>(fields: Values) -> Result<E> {
    serde_json::from_value(Value::Object(fields)).map_err(|e| {
        StrongroomError::validation(format!("Invalid field value for {}: {}", E::ENTITY_NAME, e))
    })
}

fn canonicalize_entity_owner<E: Entity>(entity: E) -> Result<E> {
    let mut fields = entity_fields(&entity)?;
    if !fields.contains_key("owner") {
        return Ok(entity);
    }
    canonicalize_owner(&mut fields);
    entity_from_fields(fields)
}

/// Apply `values` onto `entity`, returning the names of the fields that changed.
///
/// Unknown keys and wrongly typed values are `Invalid`; so is changing an
/// immutable field on update.
fn merge_values<E: Entity>(
    entity: &mut E,
    mut values: Values,
    purge_props: bool,
    mode: MergeMode,
) -> Result<Vec<String>> {
    canonicalize_owner(&mut values);

    let mut fields = entity_fields(&*entity)?;
    let mentioned: Vec<String> = values.keys().cloned().collect();
    let mut changed = Vec::new();

    for (key, value) in values {
        let current = fields.get_mut(&key).ok_or_else(|| {
            StrongroomError::validation_field(
                format!("Unknown field '{}' for {}", key, E::ENTITY_NAME),
                key.clone(),
            )
        })?;

        if *current == value {
            continue;
        }

        if mode == MergeMode::Update && IMMUTABLE_FIELDS.contains(&key.as_str()) {
            return Err(StrongroomError::validation_field(
                format!("Field '{}' of {} cannot be changed", key, E::ENTITY_NAME),
                key,
            ));
        }

        *current = value;
        changed.push(key);
    }

    if purge_props {
        for key in E::PURGEABLE {
            if mentioned.iter().any(|m| m == key) {
                continue;
            }
            if let Some(current) = fields.get_mut(*key) {
                if !current.is_null() {
                    *current = Value::Null;
                    changed.push((*key).to_string());
                }
            }
        }
    }

    *entity = entity_from_fields(fields)?;
    Ok(changed)
}
