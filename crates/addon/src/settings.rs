//! Per-shop Mailchimp settings service.
//!
//! Wraps the configuration store with a short-lived `moka` cache so a burst
//! of events for one shop reads its settings once. Every write through
//! [`ShopSettings::save`] invalidates the shop's entry.
//!
//! The cache only sees writes made by this process. The enabled flag is the
//! kill switch for a shop, so [`ShopSettings::is_enabled`] always reads it
//! from the store and drops a cached entry that disagrees.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use shop_mailchimp_core::{
    MailchimpSettings, SettingsError, SettingsField, SettingsForm, ShopId, settings_keys,
};
use thiserror::Error;
use tracing::instrument;

use crate::db::RepositoryError;
use crate::store::SettingsStore;

/// Errors from loading or saving settings.
#[derive(Debug, Error)]
pub enum ShopSettingsError {
    /// Storage backend failed.
    #[error("settings store error: {0}")]
    Store(#[from] RepositoryError),

    /// Submitted form is invalid.
    #[error("invalid settings: {0}")]
    Invalid(#[from] SettingsError),
}

/// Cached access to per-shop settings.
#[derive(Clone)]
pub struct ShopSettings {
    store: SettingsStore,
    cache: Cache<ShopId, Arc<MailchimpSettings>>,
}

impl ShopSettings {
    /// Create a settings service over a store.
    #[must_use]
    pub fn new(store: SettingsStore, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();

        Self { store, cache }
    }

    /// Load a shop's settings, from cache when fresh.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn load(&self, shop: ShopId) -> Result<Arc<MailchimpSettings>, ShopSettingsError> {
        if let Some(settings) = self.cache.get(&shop).await {
            return Ok(settings);
        }

        let entries = self.store.get_all(shop).await?;
        let settings = Arc::new(MailchimpSettings::from_entries(
            entries.iter().map(|(k, v)| (k.as_str(), v)),
        ));
        self.cache.insert(shop, Arc::clone(&settings)).await;

        Ok(settings)
    }

    /// Read the enabled flag straight from the store.
    ///
    /// A cached entry with a different flag was written elsewhere (another
    /// replica or the CLI) and is evicted, so the next [`load`](Self::load)
    /// sees the new credentials too.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub async fn is_enabled(&self, shop: ShopId) -> Result<bool, ShopSettingsError> {
        let value = self.store.get(shop, settings_keys::ENABLED).await?;
        let enabled = value.as_ref().is_some_and(|v| {
            MailchimpSettings::from_entries([(settings_keys::ENABLED, v)]).enabled
        });

        if let Some(cached) = self.cache.get(&shop).await
            && cached.enabled != enabled
        {
            tracing::debug!(shop = %shop, enabled, "Cached settings are stale, evicting");
            self.cache.invalidate(&shop).await;
        }

        Ok(enabled)
    }

    /// Validate and save a settings form.
    ///
    /// Only fields whose value changed are written; an unchanged form writes
    /// nothing. Returns the fields that were written.
    ///
    /// # Errors
    ///
    /// Returns an error if the form is invalid or the store write fails.
    #[instrument(skip(self, form), fields(shop = %shop))]
    pub async fn save(
        &self,
        shop: ShopId,
        form: &SettingsForm,
    ) -> Result<Vec<SettingsField>, ShopSettingsError> {
        form.validate()?;

        self.cache.invalidate(&shop).await;
        let current = self.load(shop).await?;
        let changed = form.changed_fields(&current);
        if changed.is_empty() {
            tracing::debug!("Settings unchanged, nothing to save");
            return Ok(changed);
        }

        for field in &changed {
            self.store
                .set(shop, field.key(), &form.value_of(*field))
                .await?;
        }
        self.cache.invalidate(&shop).await;

        tracing::info!(fields = ?changed, "Mailchimp settings saved");
        Ok(changed)
    }

    /// Set only the enabled flag.
    ///
    /// # Errors
    ///
    /// Returns an error if the store write fails.
    pub async fn set_enabled(&self, shop: ShopId, enabled: bool) -> Result<(), ShopSettingsError> {
        self.store
            .set(
                shop,
                SettingsField::IsEnabled.key(),
                &serde_json::Value::Bool(enabled),
            )
            .await?;
        self.cache.invalidate(&shop).await;
        Ok(())
    }
}

impl std::fmt::Debug for ShopSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopSettings")
            .field("store", &self.store)
            .field("cached_shops", &self.cache.entry_count())
            .finish()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    fn service() -> ShopSettings {
        ShopSettings::new(SettingsStore::memory(), Duration::from_secs(60))
    }

    fn form() -> SettingsForm {
        SettingsForm {
            api_key: Some("abc123-us6".to_string()),
            list_id: Some("list1".to_string()),
            is_enabled: true,
            username: Some("shopkeeper".to_string()),
        }
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let settings = service();
        let shop = ShopId::new(1);

        let written = settings.save(shop, &form()).await.unwrap();
        assert_eq!(written.len(), 4);

        let loaded = settings.load(shop).await.unwrap();
        assert!(loaded.enabled);
        assert_eq!(loaded.api_key.as_ref().unwrap().expose_secret(), "abc123-us6");
        assert!(!loaded.needs_setup());
    }

    #[tokio::test]
    async fn test_unchanged_form_writes_nothing() {
        let settings = service();
        let shop = ShopId::new(1);
        settings.save(shop, &form()).await.unwrap();

        let written = settings.save(shop, &form()).await.unwrap();
        assert!(written.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_form_is_rejected() {
        let settings = service();
        let bad = SettingsForm {
            username: Some("u".repeat(161)),
            ..form()
        };

        let err = settings.save(ShopId::new(1), &bad).await.unwrap_err();
        assert!(matches!(err, ShopSettingsError::Invalid(_)));
        assert!(settings.load(ShopId::new(1)).await.unwrap().needs_setup());
    }

    #[tokio::test]
    async fn test_set_enabled_invalidates_cache() {
        let settings = service();
        let shop = ShopId::new(3);
        assert!(!settings.load(shop).await.unwrap().enabled);

        settings.set_enabled(shop, true).await.unwrap();
        assert!(settings.load(shop).await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_is_enabled_sees_writes_from_another_instance() {
        let store = SettingsStore::memory();
        let addon = ShopSettings::new(store.clone(), Duration::from_secs(60));
        let cli = ShopSettings::new(store, Duration::from_secs(60));
        let shop = ShopId::new(5);

        addon.save(shop, &form()).await.unwrap();
        assert!(addon.load(shop).await.unwrap().enabled);

        cli.set_enabled(shop, false).await.unwrap();

        assert!(!addon.is_enabled(shop).await.unwrap());
        assert!(!addon.load(shop).await.unwrap().enabled);
    }

    #[tokio::test]
    async fn test_is_enabled_unknown_shop() {
        assert!(!service().is_enabled(ShopId::new(99)).await.unwrap());
    }
}
