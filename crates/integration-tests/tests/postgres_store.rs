//! Sync records and settings on `PostgreSQL`.
//!
//! These tests require a database reachable through `ADDON_DATABASE_URL`.
//! Migrations are applied on connect.
//!
//! Run with: cargo test -p shop-mailchimp-integration-tests -- --ignored

#![allow(clippy::unwrap_used)]

use chrono::{Duration, Utc};
use secrecy::SecretString;
use serde_json::json;
use shop_mailchimp_addon::db;
use shop_mailchimp_addon::store::{SettingsStore, SyncRecordStore};
use shop_mailchimp_core::{ContactId, ShopId, settings_keys};
use shop_mailchimp_integration_tests::email_of;
use sqlx::PgPool;

async fn pool() -> PgPool {
    let url = std::env::var("ADDON_DATABASE_URL").expect("ADDON_DATABASE_URL must be set");
    let pool = db::create_pool(&SecretString::from(url)).await.unwrap();
    db::run_migrations(&pool).await.unwrap();
    pool
}

/// A shop id no other run has used.
fn fresh_shop() -> ShopId {
    ShopId::new(Utc::now().timestamp_micros())
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_record_upsert_is_unique_per_shop_and_email() {
    let store = SyncRecordStore::postgres(pool().await);
    let shop = fresh_shop();
    let email = email_of("pg@example.com");
    let earlier = Utc::now() - Duration::minutes(5);

    let created = store
        .upsert(shop, &email, Some(ContactId::new(1)), earlier)
        .await
        .unwrap();
    let updated = store
        .upsert(shop, &email, Some(ContactId::new(2)), Utc::now())
        .await
        .unwrap();

    assert_eq!(created.id, updated.id);
    assert_eq!(updated.contact_id, Some(ContactId::new(2)));
    assert!(updated.sent_to_mailchimp.unwrap() > earlier);

    let found = store.find(shop, &email).await.unwrap().unwrap();
    assert_eq!(found, updated);
    assert_eq!(store.list(shop).await.unwrap().len(), 1);
}

#[tokio::test]
#[ignore = "Requires PostgreSQL database"]
async fn test_settings_values_are_per_shop() {
    let store = SettingsStore::postgres(pool().await);
    let shop = fresh_shop();
    let other = ShopId::new(shop.as_i64() + 1);

    store
        .set(shop, settings_keys::LIST_ID, &json!("list1"))
        .await
        .unwrap();
    store
        .set(shop, settings_keys::LIST_ID, &json!("list2"))
        .await
        .unwrap();

    assert_eq!(
        store.get(shop, settings_keys::LIST_ID).await.unwrap(),
        Some(json!("list2"))
    );
    assert_eq!(store.get(other, settings_keys::LIST_ID).await.unwrap(), None);
    assert_eq!(store.get_all(shop).await.unwrap().len(), 1);
}
