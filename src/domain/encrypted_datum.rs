//! EncryptedDatum: ciphertext plus the metadata a crypto plugin needs to reverse it.

use super::entity::{ColumnValue, Entity, ModelBase};
use super::id::{EncryptedDatumId, SecretId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct EncryptedDatum {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub base: ModelBase,
    /// Owning secret; rows are removed with it on purge
    pub secret_id: Option<SecretId>,
    pub mime_type: Option<String>,
    pub cipher_text: Vec<u8>,
    /// JSON written by the producing plugin
    pub kek_metadata: Option<String>,
    pub status: Option<String>,
}

impl Entity for EncryptedDatum {
    type Id = EncryptedDatumId;

    const ENTITY_NAME: &'static str = "EncryptedDatum";
    const TABLE: &'static str = "encrypted_data";

    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn columns(&self) -> Vec<(&'static str, ColumnValue)> {
        vec![
            (
                "secret_id",
                ColumnValue::Text(self.secret_id.as_ref().map(|id| id.to_string())),
            ),
            ("mime_type", ColumnValue::Text(self.mime_type.clone())),
            ("cipher_text", ColumnValue::Blob(self.cipher_text.clone())),
            ("kek_metadata", ColumnValue::Text(self.kek_metadata.clone())),
            ("status", ColumnValue::Text(self.status.clone())),
        ]
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}
