//! Order: a request to produce a new secret asynchronously.

use super::entity::{ColumnValue, Entity, ModelBase};
use super::id::{OrderId, SecretId};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Order {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub base: ModelBase,
    pub status: Option<String>,
    /// Secret produced by the order, set once fulfilled
    pub secret_id: Option<SecretId>,
    pub secret_name: Option<String>,
    pub secret_type: Option<String>,
    pub secret_bit_length: Option<i64>,
    /// Why processing failed, for killed orders
    pub error_reason: Option<String>,
}

impl Entity for Order {
    type Id = OrderId;

    const ENTITY_NAME: &'static str = "Order";
    const TABLE: &'static str = "orders";
    const PURGEABLE: &'static [&'static str] = &["error_reason"];

    fn base(&self) -> &ModelBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut ModelBase {
        &mut self.base
    }

    fn columns(&self) -> Vec<(&'static str, ColumnValue)> {
        vec![
            ("status", ColumnValue::Text(self.status.clone())),
            (
                "secret_id",
                ColumnValue::Text(self.secret_id.as_ref().map(|id| id.to_string())),
            ),
            ("secret_name", ColumnValue::Text(self.secret_name.clone())),
            ("secret_type", ColumnValue::Text(self.secret_type.clone())),
            ("secret_bit_length", ColumnValue::Int(self.secret_bit_length)),
            ("error_reason", ColumnValue::Text(self.error_reason.clone())),
        ]
    }

    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }
}
