//! Storage backends for shop settings and sync records.
//!
//! Production runs on `PostgreSQL` ([`crate::db`]); the in-memory backend
//! serves tests. Both honor the same contract: settings are
//! plain key/value pairs per shop, and sync records are unique per
//! `(shop, email)` with last-write-wins upserts.

pub mod memory;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use shop_mailchimp_core::{ContactId, Email, ShopId, SyncRecord};
use sqlx::PgPool;

use crate::db::{RepositoryError, SettingsRepository, SyncRecordRepository};

pub use memory::{MemorySettingsStore, MemorySyncRecordStore};

/// Per-shop configuration store.
#[derive(Debug, Clone)]
pub enum SettingsStore {
    Postgres(SettingsRepository),
    Memory(MemorySettingsStore),
}

impl SettingsStore {
    /// A `PostgreSQL`-backed store.
    #[must_use]
    pub const fn postgres(pool: PgPool) -> Self {
        Self::Postgres(SettingsRepository::new(pool))
    }

    /// An empty in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemorySettingsStore::default())
    }

    /// Get a single value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn get(&self, shop: ShopId, key: &str) -> Result<Option<JsonValue>, RepositoryError> {
        match self {
            Self::Postgres(repo) => repo.get(shop, key).await,
            Self::Memory(store) => Ok(store.get(shop, key).await),
        }
    }

    /// Get every value stored for a shop.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn get_all(&self, shop: ShopId) -> Result<Vec<(String, JsonValue)>, RepositoryError> {
        match self {
            Self::Postgres(repo) => repo.get_all(shop).await,
            Self::Memory(store) => Ok(store.get_all(shop).await),
        }
    }

    /// Set a value.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn set(&self, shop: ShopId, key: &str, value: &JsonValue) -> Result<(), RepositoryError> {
        match self {
            Self::Postgres(repo) => repo.set(shop, key, value).await,
            Self::Memory(store) => {
                store.set(shop, key, value.clone()).await;
                Ok(())
            }
        }
    }
}

/// Sync record store.
#[derive(Debug, Clone)]
pub enum SyncRecordStore {
    Postgres(SyncRecordRepository),
    Memory(MemorySyncRecordStore),
}

impl SyncRecordStore {
    /// A `PostgreSQL`-backed store.
    #[must_use]
    pub const fn postgres(pool: PgPool) -> Self {
        Self::Postgres(SyncRecordRepository::new(pool))
    }

    /// An empty in-memory store.
    #[must_use]
    pub fn memory() -> Self {
        Self::Memory(MemorySyncRecordStore::default())
    }

    /// Find the record for a shop and email.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn find(
        &self,
        shop: ShopId,
        email: &Email,
    ) -> Result<Option<SyncRecord>, RepositoryError> {
        match self {
            Self::Postgres(repo) => repo.find(shop, email).await,
            Self::Memory(store) => Ok(store.find(shop, email).await),
        }
    }

    /// Insert or update the record for `(shop, email)`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn upsert(
        &self,
        shop: ShopId,
        email: &Email,
        contact: Option<ContactId>,
        sent_at: DateTime<Utc>,
    ) -> Result<SyncRecord, RepositoryError> {
        match self {
            Self::Postgres(repo) => repo.upsert(shop, email, contact, sent_at).await,
            Self::Memory(store) => Ok(store.upsert(shop, email, contact, sent_at).await),
        }
    }

    /// List a shop's records, most recently sent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn list(&self, shop: ShopId) -> Result<Vec<SyncRecord>, RepositoryError> {
        match self {
            Self::Postgres(repo) => repo.list(shop).await,
            Self::Memory(store) => Ok(store.list(shop).await),
        }
    }

    /// Count records across all shops.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        match self {
            Self::Postgres(repo) => repo.count().await,
            Self::Memory(store) => Ok(store.count().await),
        }
    }
}
