//! Per-shop settings commands.
//!
//! Writes go through the same form validation as the settings endpoint, so
//! over-long values are rejected and unchanged fields are not rewritten.

use shop_mailchimp_addon::settings::{ShopSettings, ShopSettingsError};
use shop_mailchimp_addon::store::SettingsStore;
use shop_mailchimp_core::{SettingsForm, ShopId};
use thiserror::Error;

use super::{CACHE_TTL, CommandError, connect};

/// Errors that can occur during settings operations.
#[derive(Debug, Error)]
pub enum SettingsCommandError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error(transparent)]
    Settings(#[from] ShopSettingsError),

    #[error("Output error: {0}")]
    Output(#[from] serde_json::Error),
}

/// Values given on the command line; `None` keeps the stored value.
#[derive(Debug, Default)]
pub struct SettingsChanges {
    pub api_key: Option<String>,
    pub list_id: Option<String>,
    pub username: Option<String>,
    pub enabled: Option<bool>,
}

impl SettingsChanges {
    /// Overlay the changes on the current form values.
    fn apply(self, mut form: SettingsForm) -> SettingsForm {
        // Absent key means "keep"; only send one when asked to change it.
        form.api_key = self.api_key;
        if let Some(list_id) = self.list_id {
            form.list_id = Some(list_id);
        }
        if let Some(username) = self.username {
            form.username = Some(username);
        }
        if let Some(enabled) = self.enabled {
            form.is_enabled = enabled;
        }
        form
    }
}

async fn shop_settings() -> Result<ShopSettings, CommandError> {
    let pool = connect().await?;
    Ok(ShopSettings::new(SettingsStore::postgres(pool), CACHE_TTL))
}

/// Print a shop's settings as JSON.
pub async fn show(shop: i64) -> Result<(), SettingsCommandError> {
    let shop = ShopId::new(shop);
    let settings = shop_settings().await?.load(shop).await?;

    let view = serde_json::json!({
        "shop": shop,
        "is_enabled": settings.enabled,
        "api_key": settings.masked_api_key(),
        "list_id": settings.list_id,
        "username": settings.username,
        "needs_setup": settings.needs_setup(),
    });

    #[allow(clippy::print_stdout)]
    {
        println!("{}", serde_json::to_string_pretty(&view)?);
    }
    Ok(())
}

/// Update a shop's settings.
pub async fn set(shop: i64, changes: SettingsChanges) -> Result<(), SettingsCommandError> {
    let shop = ShopId::new(shop);
    let settings = shop_settings().await?;

    let current = settings.load(shop).await?;
    let form = changes.apply(SettingsForm::from_settings(&current));
    let changed = settings.save(shop, &form).await?;

    if changed.is_empty() {
        tracing::info!(shop = %shop, "Settings unchanged");
    } else {
        tracing::info!(shop = %shop, changed = ?changed, "Settings saved");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_changes_keep_unset_values() {
        let current = SettingsForm {
            api_key: Some("abc-us6".to_string()),
            list_id: Some("list1".to_string()),
            is_enabled: true,
            username: None,
        };
        let changes = SettingsChanges {
            list_id: Some("list2".to_string()),
            ..SettingsChanges::default()
        };

        let form = changes.apply(current);
        assert_eq!(form.api_key, None);
        assert_eq!(form.list_id.as_deref(), Some("list2"));
        assert!(form.is_enabled);
    }

    #[test]
    fn test_changes_can_disable() {
        let changes = SettingsChanges {
            enabled: Some(false),
            ..SettingsChanges::default()
        };
        let form = changes.apply(SettingsForm {
            is_enabled: true,
            ..SettingsForm::default()
        });
        assert!(!form.is_enabled);
    }
}
