//! Per-shop Mailchimp settings.
//!
//! Settings are persisted as four JSON values per shop (see [`keys`]).
//! [`MailchimpSettings`] is the typed view the sync code works with, and
//! [`SettingsForm`] is the validated write path used by the settings endpoint
//! and the CLI.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

/// Storage keys for the per-shop configuration store.
pub mod keys {
    /// Mailchimp API key (`<key>-<dc>`).
    pub const API_KEY: &str = "mailchimp_api_key";
    /// Audience ("list") to subscribe contacts to.
    pub const LIST_ID: &str = "mailchimp_list_id";
    /// Whether the integration is enabled for the shop.
    pub const ENABLED: &str = "mailchimp_enabled";
    /// Username for HTTP basic auth.
    pub const USERNAME: &str = "mailchimp_username";
}

/// Maximum length of the API key field.
pub const API_KEY_MAX_LENGTH: usize = 160;
/// Maximum length of the list id field.
pub const LIST_ID_MAX_LENGTH: usize = 24;
/// Maximum length of the username field.
pub const USERNAME_MAX_LENGTH: usize = 160;

/// Settings form validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// A field exceeds its maximum length.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: SettingsField, max: usize },
}

/// A single settings field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsField {
    ApiKey,
    ListId,
    IsEnabled,
    Username,
}

impl SettingsField {
    /// The configuration store key backing this field.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::ApiKey => keys::API_KEY,
            Self::ListId => keys::LIST_ID,
            Self::IsEnabled => keys::ENABLED,
            Self::Username => keys::USERNAME,
        }
    }
}

impl std::fmt::Display for SettingsField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::ApiKey => "api_key",
            Self::ListId => "list_id",
            Self::IsEnabled => "is_enabled",
            Self::Username => "username",
        };
        f.write_str(label)
    }
}

/// Typed Mailchimp settings for one shop.
///
/// Missing or blank values are `None`; a missing enabled flag means disabled.
#[derive(Debug, Clone, Default)]
pub struct MailchimpSettings {
    pub enabled: bool,
    pub api_key: Option<SecretString>,
    pub list_id: Option<String>,
    pub username: Option<String>,
}

impl MailchimpSettings {
    /// Build settings from raw store entries.
    ///
    /// Unknown keys are ignored. The enabled flag accepts JSON booleans as
    /// well as the strings `"true"`/`"1"`, which older rows may hold.
    pub fn from_entries<'a, I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a JsonValue)>,
    {
        let mut settings = Self::default();
        for (key, value) in entries {
            match key {
                keys::API_KEY => settings.api_key = json_string(value).map(SecretString::from),
                keys::LIST_ID => settings.list_id = json_string(value),
                keys::USERNAME => settings.username = json_string(value),
                keys::ENABLED => settings.enabled = json_flag(value),
                _ => {}
            }
        }
        settings
    }

    /// Whether the admin still has credentials to fill in.
    #[must_use]
    pub const fn needs_setup(&self) -> bool {
        self.api_key.is_none() || self.list_id.is_none() || self.username.is_none()
    }

    /// API key with everything but the data-center suffix hidden.
    #[must_use]
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| {
            let key = key.expose_secret();
            key.rsplit_once('-')
                .map_or_else(|| "********".to_string(), |(_, dc)| format!("********-{dc}"))
        })
    }
}

/// Settings form as submitted by an admin.
///
/// An absent `api_key` keeps the stored key, so a form rendered with a masked
/// key can be resubmitted without clearing it. An empty string clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsForm {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub list_id: Option<String>,
    #[serde(default)]
    pub is_enabled: bool,
    #[serde(default)]
    pub username: Option<String>,
}

impl SettingsForm {
    /// Initial form values for the current settings.
    #[must_use]
    pub fn from_settings(settings: &MailchimpSettings) -> Self {
        Self {
            api_key: settings
                .api_key
                .as_ref()
                .map(|k| k.expose_secret().to_string()),
            list_id: settings.list_id.clone(),
            is_enabled: settings.enabled,
            username: settings.username.clone(),
        }
    }

    /// Check field lengths.
    ///
    /// # Errors
    ///
    /// Returns the first field that exceeds its maximum length.
    pub fn validate(&self) -> Result<(), SettingsError> {
        check_length(SettingsField::ApiKey, self.api_key.as_deref(), API_KEY_MAX_LENGTH)?;
        check_length(SettingsField::ListId, self.list_id.as_deref(), LIST_ID_MAX_LENGTH)?;
        check_length(SettingsField::Username, self.username.as_deref(), USERNAME_MAX_LENGTH)?;
        Ok(())
    }

    /// Fields whose submitted value differs from `current`.
    #[must_use]
    pub fn changed_fields(&self, current: &MailchimpSettings) -> Vec<SettingsField> {
        let mut changed = Vec::new();
        if let Some(api_key) = &self.api_key {
            let stored = current.api_key.as_ref().map(|k| k.expose_secret());
            if blank_to_none(api_key) != stored {
                changed.push(SettingsField::ApiKey);
            }
        }
        if self.list_id.as_deref().and_then(blank_to_none) != current.list_id.as_deref() {
            changed.push(SettingsField::ListId);
        }
        if self.is_enabled != current.enabled {
            changed.push(SettingsField::IsEnabled);
        }
        if self.username.as_deref().and_then(blank_to_none) != current.username.as_deref() {
            changed.push(SettingsField::Username);
        }
        changed
    }

    /// The store value for a field. Blank strings are stored as `null`.
    #[must_use]
    pub fn value_of(&self, field: SettingsField) -> JsonValue {
        let text = |v: Option<&str>| {
            v.and_then(blank_to_none)
                .map_or(JsonValue::Null, |s| JsonValue::String(s.to_string()))
        };
        match field {
            SettingsField::ApiKey => text(self.api_key.as_deref()),
            SettingsField::ListId => text(self.list_id.as_deref()),
            SettingsField::IsEnabled => JsonValue::Bool(self.is_enabled),
            SettingsField::Username => text(self.username.as_deref()),
        }
    }
}

fn check_length(field: SettingsField, value: Option<&str>, max: usize) -> Result<(), SettingsError> {
    match value {
        Some(v) if v.trim().chars().count() > max => Err(SettingsError::TooLong { field, max }),
        _ => Ok(()),
    }
}

fn blank_to_none(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn json_string(value: &JsonValue) -> Option<String> {
    value.as_str().and_then(blank_to_none).map(ToString::to_string)
}

fn json_flag(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::String(s) => matches!(s.trim(), "true" | "1"),
        JsonValue::Number(n) => n.as_i64() == Some(1),
        _ => false,
    }
}
