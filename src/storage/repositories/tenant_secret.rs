//! Tenant/secret association lookups.

use crate::domain::{SecretId, TenantId, TenantSecret};
use crate::errors::Result;
use crate::storage::repository::Repository;

impl Repository<TenantSecret> {
    /// Live associations of a tenant, oldest first
    pub async fn list_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<TenantSecret>> {
        self.list_by("tenant_id", tenant_id.as_str(), false).await
    }

    /// Live association between a tenant and a secret
    pub async fn find_link(
        &self,
        tenant_id: &TenantId,
        secret_id: &SecretId,
    ) -> Result<Option<TenantSecret>> {
        let links = self.list_by("secret_id", secret_id.as_str(), false).await?;
        Ok(links.into_iter().find(|link| link.tenant_id.as_ref() == Some(tenant_id)))
    }
}
