//! Domain layer
//!
//! Persisted entities of the secret store and the per-entity configuration the
//! repository engine consumes.
//!
//! ## Module Organization
//!
//! - `id`: Type-safe entity identifiers with NewType pattern
//! - `status`: Lifecycle status enumeration and its validation rule
//! - `entity`: The `Entity` trait, common base columns and column bindings
//! - `tenant`, `secret`, `encrypted_datum`, `tenant_secret`, `order`: the entities
//!
//! Entities reference each other only through typed id fields; none embeds another.

pub mod encrypted_datum;
pub mod entity;
pub mod id;
pub mod order;
pub mod secret;
pub mod status;
pub mod tenant;
pub mod tenant_secret;

pub use encrypted_datum::EncryptedDatum;
pub use entity::{ColumnValue, Entity, ModelBase, Values};
pub use id::{EncryptedDatumId, OrderId, SecretId, TenantId, TenantSecretId};
pub use order::Order;
pub use secret::Secret;
pub use status::{validate_status, EntityStatus};
pub use tenant::Tenant;
pub use tenant_secret::TenantSecret;
