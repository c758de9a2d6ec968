//! Secret: a named container whose material lives in an [`EncryptedDatum`](super::EncryptedDatum).

use super::entity::{ColumnValue, Entity, ModelBase};
use super::id::SecretId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Secret {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub base: ModelBase,
    pub name: Option<String>,
    /// Content type of the secret material, e.g. `application/aes-256-cbc`
    pub secret_type: Option<String>,
    pub status: Option<String>,
    pub expiration: Option<DateTime<Utc>>,
    /// Owning principal, null when unowned
    pub owner: Option<String>,
}

impl Entity for Secret {
    type Id = SecretId;

    const ENTITY_NAME: &'static str = "Secret";
    const TABLE: &'static str = "secrets";
    const NAME_COLUMN: Option<&'static str> = Some("name");
    const PURGEABLE: &'static [&'static str] = &["expiration", "owner"];

    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn columns(&self) -> Vec<(&'static str, ColumnValue)> {
        vec![
            ("name", ColumnValue::Text(self.name.clone())),
            ("secret_type", ColumnValue::Text(self.secret_type.clone())),
            ("status", ColumnValue::Text(self.status.clone())),
            ("expiration", ColumnValue::Timestamp(self.expiration)),
            ("owner", ColumnValue::Text(self.owner.clone())),
        ]
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}
