//! Tenant lookups by external identity.

use crate::domain::Tenant;
use crate::errors::{Result, StrongroomError};
use crate::storage::repository::Repository;
use tracing::instrument;

impl Repository<Tenant> {
    /// Live tenant with the given external identity reference
    #[instrument(skip(self), name = "db_find_tenant_by_keystone_id")]
    pub async fn find_by_keystone_id(&self, keystone_id: &str) -> Result<Tenant> {
        self.try_find_by_keystone_id(keystone_id)
            .await?
            .ok_or_else(|| StrongroomError::not_found_by("Tenant", "keystone_id", keystone_id))
    }

    pub async fn try_find_by_keystone_id(&self, keystone_id: &str) -> Result<Option<Tenant>> {
        self.find_unique_by("keystone_id", keystone_id).await
    }
}
