//! In-memory storage backends.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use shop_mailchimp_core::{ContactId, Email, ShopId, SyncRecord};
use tokio::sync::RwLock;

/// In-memory per-shop configuration values.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    values: Arc<RwLock<HashMap<ShopId, BTreeMap<String, JsonValue>>>>,
}

impl MemorySettingsStore {
    pub async fn get(&self, shop: ShopId, key: &str) -> Option<JsonValue> {
        self.values
            .read()
            .await
            .get(&shop)
            .and_then(|entries| entries.get(key).cloned())
    }

    pub async fn get_all(&self, shop: ShopId) -> Vec<(String, JsonValue)> {
        self.values
            .read()
            .await
            .get(&shop)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub async fn set(&self, shop: ShopId, key: &str, value: JsonValue) {
        self.values
            .write()
            .await
            .entry(shop)
            .or_default()
            .insert(key.to_string(), value);
    }
}

/// In-memory sync records keyed by `(shop, email)`.
#[derive(Debug, Clone, Default)]
pub struct MemorySyncRecordStore {
    records: Arc<RwLock<HashMap<(ShopId, Email), SyncRecord>>>,
}

impl MemorySyncRecordStore {
    pub async fn find(&self, shop: ShopId, email: &Email) -> Option<SyncRecord> {
        self.records
            .read()
            .await
            .get(&(shop, email.clone()))
            .cloned()
    }

    pub async fn upsert(
        &self,
        shop: ShopId,
        email: &Email,
        contact: Option<ContactId>,
        sent_at: DateTime<Utc>,
    ) -> SyncRecord {
        let mut records = self.records.write().await;
        let record = records
            .entry((shop, email.clone()))
            .or_insert_with(|| SyncRecord::new(shop, email.clone(), contact));
        record.contact_id = contact;
        record.sent_to_mailchimp = Some(sent_at);
        record.clone()
    }

    /// Store a record as-is, replacing any record for the same `(shop, email)`.
    pub async fn insert(&self, record: SyncRecord) {
        self.records
            .write()
            .await
            .insert((record.shop_id, record.email.clone()), record);
    }

    pub async fn list(&self, shop: ShopId) -> Vec<SyncRecord> {
        let mut records: Vec<SyncRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.shop_id == shop)
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.sent_to_mailchimp
                .cmp(&a.sent_to_mailchimp)
                .then_with(|| a.email.cmp(&b.email))
        });
        records
    }

    pub async fn count(&self) -> i64 {
        i64::try_from(self.records.read().await.len()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[tokio::test]
    async fn test_settings_round_trip_per_shop() {
        let store = MemorySettingsStore::default();
        store
            .set(ShopId::new(1), "mailchimp_enabled", JsonValue::Bool(true))
            .await;

        assert_eq!(
            store.get(ShopId::new(1), "mailchimp_enabled").await,
            Some(JsonValue::Bool(true))
        );
        assert_eq!(store.get(ShopId::new(2), "mailchimp_enabled").await, None);
        assert_eq!(store.get_all(ShopId::new(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_keeps_one_record_per_shop_and_email() {
        let store = MemorySyncRecordStore::default();
        let shop = ShopId::new(1);
        let email = Email::parse("a@b.com").unwrap();
        let first = Utc::now() - Duration::hours(1);

        let created = store
            .upsert(shop, &email, Some(ContactId::new(1)), first)
            .await;
        let updated = store
            .upsert(shop, &email, Some(ContactId::new(2)), Utc::now())
            .await;

        assert_eq!(created.id, updated.id);
        assert_eq!(updated.contact_id, Some(ContactId::new(2)));
        assert!(updated.sent_to_mailchimp.unwrap() > first);
        assert_eq!(store.count().await, 1);

        store
            .upsert(ShopId::new(2), &email, None, Utc::now())
            .await;
        assert_eq!(store.count().await, 2);
        assert_eq!(store.list(shop).await.len(), 1);
    }
}
