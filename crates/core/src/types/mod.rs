//! Core types for the shop Mailchimp addon.
//!
//! This module provides type-safe wrappers for the sync domain.

pub mod email;
pub mod entity;
pub mod id;
pub mod settings;
pub mod sync_record;

pub use email::{Email, EmailError};
pub use entity::{Contact, ContactKind, Order};
pub use id::*;
pub use settings::{
    MailchimpSettings, SettingsError, SettingsField, SettingsForm, keys as settings_keys,
};
pub use sync_record::SyncRecord;
