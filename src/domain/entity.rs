//! The per-entity configuration consumed by the generic repository engine.
//!
//! An [`Entity`] names its table, its column bindings, whether it can be looked
//! up by name, which optional attributes a purging update resets, and how it is
//! validated. The repository supplies everything else.

use super::status::validate_status;
use crate::errors::Result;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::FromRow;
use std::fmt;

/// Field mapping accepted by create and update
pub type Values = serde_json::Map<String, serde_json::Value>;

/// Build a [`Values`] mapping with `serde_json::json!` object syntax.
///
/// ```rust,ignore
/// let values = values! { "name": "s1", "status": "active" };
/// ```
#[macro_export]
macro_rules! values {
    ($($body:tt)*) => {
        match ::serde_json::json!({ $($body)* }) {
            ::serde_json::Value::Object(map) => map,
            _ => ::serde_json::Map::new(),
        }
    };
}

/// Columns every table carries
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ModelBase {
    pub id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted: bool,
}

/// A value bound to an entity-specific column on insert or update
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnValue {
    Text(Option<String>),
    Int(Option<i64>),
    Bool(bool),
    Blob(Vec<u8>),
    Timestamp(Option<DateTime<Utc>>),
}

/// Configuration object describing one persisted entity type.
pub trait Entity:
    Serialize
    + DeserializeOwned
    + Default
    + Clone
    + fmt::Debug
    + Send
    + Sync
    + Unpin
    + for<'r> FromRow<'r, SqliteRow>
    + 'static
{
    /// Typed identifier
    type Id: From<String> + AsRef<str> + Clone + fmt::Debug + fmt::Display + Send + Sync + 'static;

    /// Name used in errors and logs
    const ENTITY_NAME: &'static str;

    /// Backing table
    const TABLE: &'static str;

    /// Column used by name lookups, `None` when the entity is not name-addressable
    const NAME_COLUMN: Option<&'static str> = None;

    /// Optional attributes a purging update nulls when the caller omits them
    const PURGEABLE: &'static [&'static str] = &[];

    fn base(&self) -> &ModelBase;

    fn base_mut(&mut self) -> &mut ModelBase;

    /// Entity-specific columns in insert order, excluding the base columns
    fn columns(&self) -> Vec<(&'static str, ColumnValue)>;

    /// Current lifecycle status, for status-bearing entities
    fn status(&self) -> Option<&str> {
        None
    }

    /// Validation run before every insert or update
    fn validate(&self) -> Result<()> {
        validate_status(Self::ENTITY_NAME, self.status()).map(|_| ())
    }

    fn id(&self) -> Option<Self::Id> {
        self.base().id.clone().map(Self::Id::from)
    }

    fn is_deleted(&self) -> bool {
        self.base().deleted
    }
}
