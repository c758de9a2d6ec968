//! TenantSecret: association linking a tenant to a secret.

use super::entity::{ColumnValue, Entity, ModelBase};
use super::id::{SecretId, TenantId, TenantSecretId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct TenantSecret {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub base: ModelBase,
    pub tenant_id: Option<TenantId>,
    pub secret_id: Option<SecretId>,
    /// Relationship role, e.g. `owner` or `reader`
    pub role: Option<String>,
    pub status: Option<String>,
}

impl Entity for TenantSecret {
    type Id = TenantSecretId;

    const ENTITY_NAME: &'static str = "TenantSecret";
    const TABLE: &'static str = "tenant_secrets";
    const PURGEABLE: &'static [&'static str] = &["role"];

    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn columns(&self) -> Vec<(&'static str, ColumnValue)> {
        vec![
            (
                "tenant_id",
                ColumnValue::Text(self.tenant_id.as_ref().map(|id| id.to_string())),
            ),
            (
                "secret_id",
                ColumnValue::Text(self.secret_id.as_ref().map(|id| id.to_string())),
            ),
            ("role", ColumnValue::Text(self.role.clone())),
            ("status", ColumnValue::Text(self.status.clone())),
        ]
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}
