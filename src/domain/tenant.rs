//! Tenant: the principal that owns secrets through [`TenantSecret`](super::TenantSecret) links.

use super::entity::{ColumnValue, Entity, ModelBase};
use super::id::TenantId;
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub base: ModelBase,
    /// External identity reference, unique across tenants
    pub keystone_id: Option<String>,
}

impl Entity for Tenant {
    type Id = TenantId;

    const ENTITY_NAME: &'static str = "Tenant";
    const TABLE: &'static str = "tenants";

    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn columns(&self) -> Vec<(&'static str, ColumnValue)> {
        vec![("keystone_id", ColumnValue::Text(self.keystone_id.clone()))]
    }

    // Tenants have no lifecycle status to check.
    fn validate(&self) -> Result<()> {
        Ok(())
    }
}
