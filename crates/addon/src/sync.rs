//! Pushing one email to a shop's Mailchimp list.
//!
//! [`MailchimpSync::add_email_to_list`] is the single write path to
//! Mailchimp. It checks whether the member exists, then updates (`PUT`) or
//! creates (`POST`) it, and on success upserts the local sync record.

use chrono::Utc;
use shop_mailchimp_core::{Contact, Email, ShopId, SyncRecord};
use thiserror::Error;
use tracing::instrument;

use crate::db::RepositoryError;
use crate::mailchimp::{ListTarget, MailchimpClient, MailchimpError, MergeFields};
use crate::settings::{ShopSettings, ShopSettingsError};
use crate::store::SyncRecordStore;

/// HTTP method of a member write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMethod {
    Put,
    Post,
}

impl std::fmt::Display for WriteMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Put => f.write_str("PUT"),
            Self::Post => f.write_str("POST"),
        }
    }
}

/// Errors from a sync attempt.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Mailchimp rejected or never received every write attempt.
    #[error("remote sync failed ({method}): {source}")]
    Remote {
        method: WriteMethod,
        #[source]
        source: MailchimpError,
    },

    /// The shop lacks credentials or a list id.
    #[error("shop {shop} is not configured for Mailchimp: {source}")]
    NotConfigured {
        shop: ShopId,
        #[source]
        source: MailchimpError,
    },

    /// Settings could not be loaded.
    #[error(transparent)]
    Settings(#[from] ShopSettingsError),

    /// The sync record could not be read or written.
    #[error("sync record store error: {0}")]
    Store(#[from] RepositoryError),
}

impl SyncError {
    /// Whether the failure came from Mailchimp itself.
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

/// What the member lookup told us.
enum Membership {
    Member,
    NotMember,
    Unknown,
}

impl Membership {
    /// Write methods to try, in order.
    const fn write_plan(&self) -> &'static [WriteMethod] {
        match self {
            Self::Member => &[WriteMethod::Put],
            Self::NotMember => &[WriteMethod::Post],
            // PUT adds or updates, so it is safe without knowing
            Self::Unknown => &[WriteMethod::Put, WriteMethod::Post],
        }
    }
}

/// Mailchimp list sync for all shops.
#[derive(Debug, Clone)]
pub struct MailchimpSync {
    client: MailchimpClient,
    settings: ShopSettings,
    records: SyncRecordStore,
}

impl MailchimpSync {
    /// Create the sync service.
    #[must_use]
    pub const fn new(
        client: MailchimpClient,
        settings: ShopSettings,
        records: SyncRecordStore,
    ) -> Self {
        Self {
            client,
            settings,
            records,
        }
    }

    /// Per-shop settings.
    #[must_use]
    pub const fn settings(&self) -> &ShopSettings {
        &self.settings
    }

    /// Sync record store.
    #[must_use]
    pub const fn records(&self) -> &SyncRecordStore {
        &self.records
    }

    /// Add or update `email` in the shop's list and record the result.
    ///
    /// The contact, when given, supplies merge fields and becomes the sync
    /// record's contact reference. This does not check the enabled flag or
    /// marketing permission; callers decide eligibility.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Remote`] when every write to Mailchimp failed,
    /// leaving any existing sync record untouched. Returns other variants for
    /// missing configuration or store failures.
    #[instrument(skip(self, contact), fields(shop = %shop, email = %email))]
    pub async fn add_email_to_list(
        &self,
        shop: ShopId,
        email: &Email,
        contact: Option<&Contact>,
    ) -> Result<SyncRecord, SyncError> {
        let settings = self.settings.load(shop).await?;
        let target = self
            .client
            .target(&settings)
            .map_err(|source| SyncError::NotConfigured { shop, source })?;

        let existing = self.records.find(shop, email).await?;
        if let Some(record) = &existing {
            tracing::debug!(
                record_id = %record.id,
                previous_contact = ?record.contact_id,
                "Existing sync record found"
            );
        }

        let membership = match self.client.get_member(&target, email).await {
            Ok(Some(member)) => {
                tracing::debug!(member_id = %member.id, "Email is already a list member");
                Membership::Member
            }
            Ok(None) => Membership::NotMember,
            Err(e) => {
                tracing::warn!(
                    status = ?e.status(),
                    error = %e,
                    "Member lookup failed, falling back to add-or-update"
                );
                Membership::Unknown
            }
        };

        let merge_fields = MergeFields::from_contact(contact);
        let method = self
            .write_member(&target, email, &merge_fields, membership.write_plan())
            .await?;

        let record = self
            .records
            .upsert(shop, email, contact.map(|c| c.id), Utc::now())
            .await?;

        tracing::info!(
            method = %method,
            record_id = %record.id,
            created = existing.is_none(),
            "Email synced to Mailchimp"
        );
        Ok(record)
    }

    /// Try each write in turn; the first success wins.
    async fn write_member(
        &self,
        target: &ListTarget,
        email: &Email,
        merge_fields: &MergeFields,
        plan: &[WriteMethod],
    ) -> Result<WriteMethod, SyncError> {
        let mut last_error = None;
        for &method in plan {
            let result = match method {
                WriteMethod::Put => self.client.update_member(target, email, merge_fields).await,
                WriteMethod::Post => self.client.create_member(target, email, merge_fields).await,
            };
            match result {
                Ok(_) => return Ok(method),
                Err(e) => {
                    tracing::warn!(
                        method = %method,
                        status = ?e.status(),
                        error = %e,
                        "Mailchimp write failed"
                    );
                    last_error = Some((method, e));
                }
            }
        }

        let (method, source) = last_error.unwrap_or_else(|| {
            (WriteMethod::Put, MailchimpError::MissingSetting("write plan"))
        });
        Err(SyncError::Remote { method, source })
    }
}
