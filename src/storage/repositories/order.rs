//! Order work-list queries.

use crate::domain::{EntityStatus, Order};
use crate::errors::Result;
use crate::storage::repository::Repository;

impl Repository<Order> {
    /// Live orders in the given status, oldest first
    pub async fn list_by_status(&self, status: EntityStatus) -> Result<Vec<Order>> {
        self.list_by("status", status.as_str(), false).await
    }
}
