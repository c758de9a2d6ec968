//! Common test utilities for all integration tests.
//!
//! Provides shared test database setup and fixtures for tenants, secrets and
//! crypto plugins.

#![allow(dead_code)]
#![allow(clippy::duplicate_mod)]

pub mod test_db;

use strongroom::crypto::{CryptoPluginRegistry, MasterKey, ENVELOPE_CRYPTO, SIMPLE_CRYPTO};
use strongroom::domain::{Secret, Tenant};
use strongroom::storage::Repositories;
use strongroom::values;

pub const AES_256: &str = "application/aes-256-cbc";

/// Both shipped plugins, simple first
pub fn test_registry() -> CryptoPluginRegistry {
    let kek = MasterKey::generate("test").expect("generate master key");
    CryptoPluginRegistry::from_names(&[SIMPLE_CRYPTO, ENVELOPE_CRYPTO], &kek)
        .expect("build plugin registry")
}

pub async fn create_tenant(repos: &Repositories, keystone_id: &str) -> Tenant {
    repos
        .tenants
        .create(values! { "keystone_id": keystone_id })
        .await
        .expect("create tenant")
}

pub async fn create_secret(repos: &Repositories, name: &str) -> Secret {
    repos
        .secrets
        .create(values! {
            "name": name,
            "secret_type": AES_256,
            "status": "active",
        })
        .await
        .expect("create secret")
}
