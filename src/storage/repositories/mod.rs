//! # Entity Repositories
//!
//! Aliases of the generic [`Repository`] for each entity, plus the lookups
//! specific to one entity type.

mod encrypted_datum;
mod order;
mod secret;
mod tenant;
mod tenant_secret;

use crate::domain::{EncryptedDatum, Order, Secret, Tenant, TenantSecret};
use crate::storage::pool::ConnectionManager;
use crate::storage::repository::Repository;
use std::sync::Arc;

pub type TenantRepository = Repository<Tenant>;
pub type SecretRepository = Repository<Secret>;
pub type EncryptedDatumRepository = Repository<EncryptedDatum>;
pub type TenantSecretRepository = Repository<TenantSecret>;
pub type OrderRepository = Repository<Order>;

/// One repository per entity, sharing a connection manager
#[derive(Debug, Clone)]
pub struct Repositories {
    pub tenants: TenantRepository,
    pub secrets: SecretRepository,
    pub encrypted_data: EncryptedDatumRepository,
    pub tenant_secrets: TenantSecretRepository,
    pub orders: OrderRepository,
}

impl Repositories {
    pub fn new(manager: Arc<ConnectionManager>) -> Self {
        Self {
            tenants: Repository::new(Arc::clone(&manager)),
            secrets: Repository::new(Arc::clone(&manager)),
            encrypted_data: Repository::new(Arc::clone(&manager)),
            tenant_secrets: Repository::new(Arc::clone(&manager)),
            orders: Repository::new(manager),
        }
    }
}
