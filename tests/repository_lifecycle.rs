//! Integration tests for the generic repository: validation, lifecycle,
//! soft delete, purge cascades and the per-entity lookups.

mod common;

use chrono::{DateTime, Utc};
use common::test_db::TestDatabase;
use common::{create_secret, create_tenant, AES_256};
use strongroom::domain::{
    EncryptedDatum, Entity, EntityStatus, Order, SecretId, TenantId, TenantSecret, Values,
};
use strongroom::storage::Repository;
use strongroom::{values, StrongroomError};

/// Every status is accepted on update; unknown and missing statuses are rejected.
async fn assert_status_rules<E: Entity>(repo: &Repository<E>, required: Values) {
    let mut missing = required.clone();
    missing.remove("status");
    let err = repo.create(missing).await.unwrap_err();
    assert!(
        matches!(err, StrongroomError::Validation { .. }),
        "{} without status should be invalid, got {:?}",
        E::ENTITY_NAME,
        err
    );

    let mut bogus = required.clone();
    bogus.insert("status".to_string(), "bogus".into());
    let err = repo.create(bogus).await.unwrap_err();
    assert!(matches!(err, StrongroomError::Validation { .. }));

    let created = repo.create(required).await.expect("create with valid status");
    let id = created.id().expect("created entity has an id");

    for status in EntityStatus::ALL {
        let updated = repo
            .update(&id, values! { "status": status.as_str() }, false)
            .await
            .expect("update to valid status");
        assert_eq!(updated.status(), Some(status.as_str()));
    }

    let err = repo.update(&id, values! { "status": "bogus" }, false).await.unwrap_err();
    assert!(matches!(err, StrongroomError::Validation { .. }));

    // The rejected update left the row untouched
    let stored = repo.get(&id, false).await.unwrap();
    assert_eq!(stored.status(), Some(EntityStatus::Deleted.as_str()));
}

#[tokio::test]
async fn test_status_rules_for_status_bearing_entities() {
    let db = TestDatabase::new("status_rules").await;
    let repos = db.repositories();

    assert_status_rules(
        &repos.secrets,
        values! { "name": "s1", "secret_type": AES_256, "status": "active" },
    )
    .await;

    let secret = create_secret(&repos, "owner-of-data").await;
    let tenant = create_tenant(&repos, "abc").await;
    let secret_id = secret.base.id.clone().unwrap();
    let tenant_id = tenant.base.id.clone().unwrap();

    assert_status_rules(
        &repos.encrypted_data,
        values! { "secret_id": secret_id, "cipher_text": [1, 2, 3], "status": "active" },
    )
    .await;

    assert_status_rules(
        &repos.tenant_secrets,
        values! { "tenant_id": tenant_id, "secret_id": secret_id, "status": "active" },
    )
    .await;

    assert_status_rules(
        &repos.orders,
        values! { "secret_name": "ordered", "secret_type": AES_256, "status": "queued" },
    )
    .await;
}

#[tokio::test]
async fn test_tenant_needs_no_status() {
    let db = TestDatabase::new("tenant_status").await;
    let repos = db.repositories();

    let tenant = create_tenant(&repos, "abc").await;
    assert!(tenant.base.id.is_some());
    assert_eq!(tenant.keystone_id.as_deref(), Some("abc"));
}

#[tokio::test]
async fn test_get_after_create_returns_supplied_fields() {
    let db = TestDatabase::new("get_after_create").await;
    let repos = db.repositories();

    let expiration: DateTime<Utc> = "2030-01-01T00:00:00Z".parse().unwrap();
    let created = repos
        .secrets
        .create(values! {
            "name": "db-password",
            "secret_type": AES_256,
            "status": "active",
            "expiration": expiration,
            "owner": "alice",
        })
        .await
        .unwrap();

    let id = created.id().unwrap();
    let fetched = repos.secrets.get(&id, false).await.unwrap();

    assert_eq!(fetched, created);
    assert_eq!(fetched.name.as_deref(), Some("db-password"));
    assert_eq!(fetched.secret_type.as_deref(), Some(AES_256));
    assert_eq!(fetched.expiration, Some(expiration));
    assert_eq!(fetched.owner.as_deref(), Some("alice"));
    assert!(!fetched.base.deleted);
    assert!(fetched.base.deleted_at.is_none());
    assert!(fetched.base.updated_at >= fetched.base.created_at);
}

#[tokio::test]
async fn test_create_keeps_supplied_id() {
    let db = TestDatabase::new("supplied_id").await;
    let repos = db.repositories();

    let created = repos
        .tenants
        .create(values! { "id": "tenant-fixed", "keystone_id": "abc" })
        .await
        .unwrap();
    assert_eq!(created.base.id.as_deref(), Some("tenant-fixed"));

    let err = repos
        .tenants
        .create(values! { "id": "tenant-fixed", "keystone_id": "other" })
        .await
        .unwrap_err();
    assert!(matches!(err, StrongroomError::Duplicate { .. }));
}

#[tokio::test]
async fn test_update_changes_only_named_field() {
    let db = TestDatabase::new("update_one_field").await;
    let repos = db.repositories();

    let before = create_secret(&repos, "s1").await;
    let id = before.id().unwrap();

    let after = repos.secrets.update(&id, values! { "name": "renamed" }, false).await.unwrap();

    assert_eq!(after.name.as_deref(), Some("renamed"));
    assert_eq!(after.secret_type, before.secret_type);
    assert_eq!(after.status, before.status);
    assert_eq!(after.owner, before.owner);
    assert_eq!(after.base.created_at, before.base.created_at);
    assert!(after.base.updated_at >= before.base.updated_at);
}

#[tokio::test]
async fn test_update_rejections() {
    let db = TestDatabase::new("update_rejections").await;
    let repos = db.repositories();

    let secret = create_secret(&repos, "s1").await;
    let id = secret.id().unwrap();

    let err = repos.secrets.update(&id, values! { "colour": "blue" }, false).await.unwrap_err();
    assert!(matches!(err, StrongroomError::Validation { field: Some(ref f), .. } if f == "colour"));

    let err = repos.secrets.update(&id, values! { "id": "stolen" }, false).await.unwrap_err();
    assert!(matches!(err, StrongroomError::Validation { .. }));

    let err = repos
        .secrets
        .update(&SecretId::from("missing"), values! { "name": "x" }, false)
        .await
        .unwrap_err();
    assert!(matches!(err, StrongroomError::NotFound { .. }));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_update_with_purge_props_resets_unmentioned_attributes() {
    let db = TestDatabase::new("purge_props").await;
    let repos = db.repositories();

    let secret = repos
        .secrets
        .create(values! {
            "name": "s1",
            "secret_type": AES_256,
            "status": "active",
            "owner": "alice",
            "expiration": "2030-01-01T00:00:00Z",
        })
        .await
        .unwrap();
    let id = secret.id().unwrap();

    let kept = repos.secrets.update(&id, values! { "name": "s2" }, false).await.unwrap();
    assert_eq!(kept.owner.as_deref(), Some("alice"));
    assert!(kept.expiration.is_some());

    let purged = repos.secrets.update(&id, values! { "owner": "alice" }, true).await.unwrap();
    assert_eq!(purged.owner.as_deref(), Some("alice"));
    assert!(purged.expiration.is_none());
    assert_eq!(purged.name.as_deref(), Some("s2"));
}

#[tokio::test]
async fn test_owner_is_canonicalized() {
    let db = TestDatabase::new("owner_canonical").await;
    let repos = db.repositories();

    for unowned in [serde_json::json!(""), serde_json::json!(false), serde_json::json!(0)] {
        let secret = repos
            .secrets
            .create(values! { "name": "s", "status": "active", "owner": unowned })
            .await
            .unwrap();
        assert!(secret.owner.is_none());
    }

    // Saving an in-memory copy normalizes the owner the same way
    let mut secret = repos
        .secrets
        .create(values! { "name": "s", "status": "active", "owner": "alice" })
        .await
        .unwrap();
    assert_eq!(secret.owner.as_deref(), Some("alice"));

    secret.owner = Some(String::new());
    let saved = repos.secrets.save(&secret).await.unwrap();
    assert!(saved.owner.is_none());
    let stored = repos.secrets.get(&secret.id().unwrap(), false).await.unwrap();
    assert!(stored.owner.is_none());
}

#[tokio::test]
async fn test_delete_then_get() {
    let db = TestDatabase::new("soft_delete").await;
    let repos = db.repositories();

    let secret = create_secret(&repos, "s1").await;
    let id = secret.id().unwrap();

    repos.secrets.delete_entity(&secret).await.unwrap();

    let err = repos.secrets.get(&id, false).await.unwrap_err();
    assert!(matches!(err, StrongroomError::NotFound { .. }));
    assert!(repos.secrets.find(&id, false).await.unwrap().is_none());

    let deleted = repos.secrets.get(&id, true).await.unwrap();
    assert!(deleted.base.deleted);
    assert!(deleted.base.deleted_at.is_some());
    assert_eq!(deleted.status.as_deref(), Some("active"));

    assert!(repos.secrets.list(false).await.unwrap().is_empty());
    assert_eq!(repos.secrets.list(true).await.unwrap().len(), 1);

    // A second delete finds no live row
    let err = repos.secrets.delete_entity(&secret).await.unwrap_err();
    assert!(matches!(err, StrongroomError::NotFound { .. }));

    // Deleted rows can no longer be updated
    let err = repos.secrets.update(&id, values! { "name": "x" }, false).await.unwrap_err();
    assert!(matches!(err, StrongroomError::NotFound { .. }));
}

#[tokio::test]
async fn test_save_of_stale_copy_does_not_undelete() {
    let db = TestDatabase::new("save_after_delete").await;
    let repos = db.repositories();

    let secret = create_secret(&repos, "s1").await;
    let id = secret.id().unwrap();
    let mut stale = secret.clone();

    repos.secrets.delete_entity(&secret).await.unwrap();

    stale.name = Some("renamed".to_string());
    let err = repos.secrets.save(&stale).await.unwrap_err();
    assert!(matches!(err, StrongroomError::NotFound { .. }));

    assert!(repos.secrets.find(&id, false).await.unwrap().is_none());
    let stored = repos.secrets.get(&id, true).await.unwrap();
    assert!(stored.base.deleted);
    assert!(stored.base.deleted_at.is_some());
    assert_eq!(stored.name.as_deref(), Some("s1"));
}

#[tokio::test]
async fn test_update_cannot_touch_deleted_flag() {
    let db = TestDatabase::new("update_deleted_flag").await;
    let repos = db.repositories();

    let secret = create_secret(&repos, "s1").await;
    let id = secret.id().unwrap();

    let err = repos
        .secrets
        .update(&id, values! { "deleted": true }, false)
        .await
        .unwrap_err();
    assert!(matches!(err, StrongroomError::Validation { field: Some(ref f), .. } if f == "deleted"));
    assert!(!repos.secrets.get(&id, false).await.unwrap().base.deleted);
}

#[tokio::test]
async fn test_soft_delete_does_not_cascade() {
    let db = TestDatabase::new("delete_no_cascade").await;
    let repos = db.repositories();

    let tenant = create_tenant(&repos, "abc").await;
    let secret = create_secret(&repos, "s1").await;
    let link = repos
        .tenant_secrets
        .create(values! {
            "tenant_id": tenant.base.id.clone(),
            "secret_id": secret.base.id.clone(),
            "status": "active",
        })
        .await
        .unwrap();

    repos.secrets.delete_entity(&secret).await.unwrap();

    let still_there = repos.tenant_secrets.get(&link.id().unwrap(), false).await.unwrap();
    assert!(!still_there.base.deleted);
}

#[tokio::test]
async fn test_purge_cascades_to_dependents() {
    let db = TestDatabase::new("purge_cascade").await;
    let repos = db.repositories();

    let tenant = create_tenant(&repos, "abc").await;
    let secret = create_secret(&repos, "s1").await;
    let secret_id = secret.id().unwrap();

    let datum = repos
        .encrypted_data
        .create(values! { "secret_id": secret_id.as_str(), "cipher_text": [9, 9], "status": "active" })
        .await
        .unwrap();
    let link = repos
        .tenant_secrets
        .create(values! {
            "tenant_id": tenant.base.id.clone(),
            "secret_id": secret_id.as_str(),
            "status": "active",
        })
        .await
        .unwrap();
    let order = repos
        .orders
        .create(values! { "secret_id": secret_id.as_str(), "status": "active" })
        .await
        .unwrap();

    repos.secrets.purge(&secret_id).await.unwrap();

    assert!(repos.secrets.find(&secret_id, true).await.unwrap().is_none());
    assert!(repos.encrypted_data.find(&datum.id().unwrap(), true).await.unwrap().is_none());
    assert!(repos.tenant_secrets.find(&link.id().unwrap(), true).await.unwrap().is_none());

    let order = repos.orders.get(&order.id().unwrap(), false).await.unwrap();
    assert!(order.secret_id.is_none());

    let err = repos.secrets.purge(&secret_id).await.unwrap_err();
    assert!(matches!(err, StrongroomError::NotFound { .. }));
}

#[tokio::test]
async fn test_create_from() {
    let db = TestDatabase::new("create_from").await;
    let repos = db.repositories();

    let order = Order {
        status: Some("queued".to_string()),
        secret_name: Some("ordered".to_string()),
        secret_bit_length: Some(256),
        ..Default::default()
    };
    let stored = repos.orders.create_from(order).await.unwrap();
    assert!(stored.base.id.is_some());
    assert_eq!(stored.secret_bit_length, Some(256));

    let err = repos.orders.create_from(stored).await.unwrap_err();
    assert!(matches!(err, StrongroomError::Validation { .. }));
}

#[tokio::test]
async fn test_save_persists_in_memory_changes() {
    let db = TestDatabase::new("save").await;
    let repos = db.repositories();

    let mut order = repos
        .orders
        .create(values! { "status": "queued", "secret_name": "ordered" })
        .await
        .unwrap();

    order.status = Some("active".to_string());
    order.error_reason = Some("none".to_string());
    let saved = repos.orders.save(&order).await.unwrap();
    assert_eq!(saved.status.as_deref(), Some("active"));
    assert_eq!(saved.error_reason.as_deref(), Some("none"));

    order.status = Some("bogus".to_string());
    assert!(matches!(
        repos.orders.save(&order).await,
        Err(StrongroomError::Validation { .. })
    ));

    let unsaved = Order {
        status: Some("queued".to_string()),
        ..Default::default()
    };
    assert!(matches!(
        repos.orders.save(&unsaved).await,
        Err(StrongroomError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_keystone_id_is_unique() {
    let db = TestDatabase::new("keystone_unique").await;
    let repos = db.repositories();

    let tenant = create_tenant(&repos, "abc").await;
    let err = repos.tenants.create(values! { "keystone_id": "abc" }).await.unwrap_err();
    assert!(matches!(err, StrongroomError::Duplicate { .. }));
    assert_eq!(err.status_code(), 400);

    let found = repos.tenants.find_by_keystone_id("abc").await.unwrap();
    assert_eq!(found, tenant);
    assert!(repos.tenants.try_find_by_keystone_id("nope").await.unwrap().is_none());
    assert!(matches!(
        repos.tenants.find_by_keystone_id("nope").await,
        Err(StrongroomError::NotFound { .. })
    ));
}

#[tokio::test]
async fn test_missing_required_reference_is_invalid() {
    let db = TestDatabase::new("fk_invalid").await;
    let repos = db.repositories();

    let err = repos
        .tenant_secrets
        .create(values! { "tenant_id": "ghost", "secret_id": "ghost", "status": "active" })
        .await
        .unwrap_err();
    assert!(matches!(err, StrongroomError::Validation { .. }));

    // No owning secret at all
    let err = repos.encrypted_data.create(values! { "status": "active" }).await.unwrap_err();
    assert!(matches!(err, StrongroomError::Validation { .. }));
}

#[tokio::test]
async fn test_find_by_name() {
    let db = TestDatabase::new("find_by_name").await;
    let repos = db.repositories();

    let secret = create_secret(&repos, "db-password").await;
    assert_eq!(repos.secrets.find_by_name("db-password").await.unwrap(), secret);
    assert!(matches!(
        repos.secrets.find_by_name("missing").await,
        Err(StrongroomError::NotFound { .. })
    ));

    create_secret(&repos, "db-password").await;
    assert!(matches!(
        repos.secrets.find_by_name("db-password").await,
        Err(StrongroomError::Duplicate { .. })
    ));
}

#[tokio::test]
async fn test_find_by_name_unsupported_without_name_column() {
    let db = TestDatabase::new("find_by_name_unsupported").await;
    let repos = db.repositories();

    fn is_unsupported<T: std::fmt::Debug>(result: strongroom::Result<T>) -> bool {
        matches!(result, Err(StrongroomError::UnsupportedOperation { .. }))
    }

    assert!(is_unsupported(repos.orders.find_by_name("x").await));
    assert!(is_unsupported(repos.tenants.find_by_name("x").await));
    assert!(is_unsupported(repos.encrypted_data.find_by_name("x").await));
    assert!(is_unsupported(repos.tenant_secrets.find_by_name("x").await));
    assert!(is_unsupported(repos.tenant_secrets.try_find_by_name("x").await));
}

#[tokio::test]
async fn test_lookups_through_tenant_links() {
    let db = TestDatabase::new("tenant_links").await;
    let repos = db.repositories();

    let tenant = create_tenant(&repos, "abc").await;
    let other = create_tenant(&repos, "xyz").await;
    let tenant_id: TenantId = tenant.id().unwrap();

    let s1 = create_secret(&repos, "s1").await;
    let s2 = create_secret(&repos, "s2").await;
    let unlinked = create_secret(&repos, "s3").await;

    for (owner, secret) in [(&tenant, &s1), (&tenant, &s2), (&other, &unlinked)] {
        let link = TenantSecret {
            tenant_id: owner.id(),
            secret_id: secret.id(),
            role: Some("admin".to_string()),
            status: Some("active".to_string()),
            ..Default::default()
        };
        repos.tenant_secrets.create_from(link).await.unwrap();
    }

    let names: Vec<_> = repos
        .secrets
        .list_by_tenant(&tenant_id)
        .await
        .unwrap()
        .into_iter()
        .filter_map(|s| s.name)
        .collect();
    assert_eq!(names, vec!["s1".to_string(), "s2".to_string()]);

    assert_eq!(repos.tenant_secrets.list_by_tenant(&tenant_id).await.unwrap().len(), 2);

    let link = repos.tenant_secrets.find_link(&tenant_id, &s1.id().unwrap()).await.unwrap();
    assert_eq!(link.and_then(|l| l.role).as_deref(), Some("admin"));
    assert!(repos
        .tenant_secrets
        .find_link(&tenant_id, &unlinked.id().unwrap())
        .await
        .unwrap()
        .is_none());

    // A deleted link hides the secret from the tenant
    let link = repos.tenant_secrets.find_link(&tenant_id, &s2.id().unwrap()).await.unwrap();
    repos.tenant_secrets.delete_entity(&link.unwrap()).await.unwrap();
    assert_eq!(repos.secrets.list_by_tenant(&tenant_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_orders_by_status() {
    let db = TestDatabase::new("orders_by_status").await;
    let repos = db.repositories();

    for (name, status) in [("a", "queued"), ("b", "active"), ("c", "queued")] {
        repos
            .orders
            .create(values! { "secret_name": name, "status": status })
            .await
            .unwrap();
    }

    let queued = repos.orders.list_by_status(EntityStatus::Queued).await.unwrap();
    let names: Vec<_> = queued.iter().filter_map(|o| o.secret_name.as_deref()).collect();
    assert_eq!(names, vec!["a", "c"]);
    assert!(repos.orders.list_by_status(EntityStatus::Killed).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_find_by_secret_returns_newest_live_datum() {
    let db = TestDatabase::new("find_by_secret").await;
    let repos = db.repositories();

    let secret = create_secret(&repos, "s1").await;
    let secret_id = secret.id().unwrap();
    assert!(repos.encrypted_data.find_by_secret(&secret_id).await.unwrap().is_none());

    let datum = EncryptedDatum {
        secret_id: Some(secret_id.clone()),
        cipher_text: vec![1],
        status: Some("active".to_string()),
        ..Default::default()
    };
    repos.encrypted_data.create_from(datum.clone()).await.unwrap();
    let newest = repos
        .encrypted_data
        .create_from(EncryptedDatum {
            cipher_text: vec![2],
            ..datum
        })
        .await
        .unwrap();

    let found = repos.encrypted_data.find_by_secret(&secret_id).await.unwrap().unwrap();
    assert_eq!(found.id(), newest.id());
    assert_eq!(found.cipher_text, vec![2]);
}

#[tokio::test]
async fn test_writes_without_reload_after_commit() {
    let db = TestDatabase::new("no_expire").await;
    let repo = db.repositories().secrets.with_expire_on_commit(false);

    let secret = repo
        .create(values! { "name": "s1", "status": "active" })
        .await
        .unwrap();
    let fetched = repo.get(&secret.id().unwrap(), false).await.unwrap();
    assert_eq!(fetched, secret);
}
