//! Secret lookups through tenant links.

use crate::domain::{Secret, TenantId};
use crate::errors::{Result, StrongroomError};
use crate::storage::pool::SessionOptions;
use crate::storage::repository::{decode_rows, fetch_rows, text, Repository};
use tracing::instrument;

impl Repository<Secret> {
    /// Live secrets linked to a tenant through live associations, oldest first
    #[instrument(skip(self), fields(tenant_id = %tenant_id), name = "db_list_secrets_by_tenant")]
    pub async fn list_by_tenant(&self, tenant_id: &TenantId) -> Result<Vec<Secret>> {
        let mut session = self.manager().get_session(SessionOptions::autocommit()).await?;

        let sql = "SELECT s.* FROM secrets s \
                   JOIN tenant_secrets ts ON ts.secret_id = s.id \
                   WHERE ts.tenant_id = ? AND ts.deleted = 0 AND s.deleted = 0 \
                   ORDER BY s.created_at, s.id";

        let list_error = |e: sqlx::Error| {
            tracing::error!(error = %e, tenant_id = %tenant_id, "Failed to list secrets for tenant");
            StrongroomError::database(e, format!("Failed to list secrets for tenant '{}'", tenant_id))
        };

        let rows = fetch_rows(session.connection(), sql.to_string(), vec![text(tenant_id.as_ref())])
            .await
            .map_err(list_error)?;
        decode_rows(rows).map_err(list_error)
    }
}
