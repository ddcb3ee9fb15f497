//! Manual sync command.
//!
//! Pushes a single email to a shop's list with the same write path the
//! service uses. Eligibility checks are skipped except for the enabled flag.

use shop_mailchimp_addon::config::{ConfigError, MailchimpClientConfig};
use shop_mailchimp_addon::mailchimp::{MailchimpClient, MailchimpError};
use shop_mailchimp_addon::settings::{ShopSettings, ShopSettingsError};
use shop_mailchimp_addon::store::{SettingsStore, SyncRecordStore};
use shop_mailchimp_addon::sync::{MailchimpSync, SyncError};
use shop_mailchimp_core::{Contact, ContactId, ContactKind, Email, EmailError, ShopId};
use thiserror::Error;

use super::{CACHE_TTL, CommandError, connect};

/// Errors that can occur during a manual sync.
#[derive(Debug, Error)]
pub enum SyncCommandError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Mailchimp client error: {0}")]
    Client(#[from] MailchimpError),

    #[error("Invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    #[error(transparent)]
    Settings(#[from] ShopSettingsError),

    #[error("Mailchimp sync is disabled for shop {0}")]
    Disabled(ShopId),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Add or update `email` in the shop's list.
pub async fn email(shop: i64, email: &str, contact: Option<i64>) -> Result<(), SyncCommandError> {
    let shop = ShopId::new(shop);
    let email = Email::parse(email)?;

    let pool = connect().await?;
    let client = MailchimpClient::new(&MailchimpClientConfig::from_env()?)?;
    let settings = ShopSettings::new(SettingsStore::postgres(pool.clone()), CACHE_TTL);
    let sync = MailchimpSync::new(client, settings, SyncRecordStore::postgres(pool));

    if !sync.settings().load(shop).await?.enabled {
        return Err(SyncCommandError::Disabled(shop));
    }

    // Only the id matters for the record; names are not known here.
    let contact = contact.map(|id| Contact {
        id: ContactId::new(id),
        kind: ContactKind::Person {
            first_name: None,
            last_name: None,
        },
        email: Some(email.to_string()),
        marketing_permission: true,
        shops: vec![shop],
    });

    let record = sync.add_email_to_list(shop, &email, contact.as_ref()).await?;
    tracing::info!(
        shop = %shop,
        email = %record.email,
        record_id = %record.id,
        "Email synced"
    );
    Ok(())
}
