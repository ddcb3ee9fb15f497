//! Eligibility checks and sync dispatch.
//!
//! The dispatcher decides, per shop, whether a saved contact or a finalized
//! order should be pushed to Mailchimp, and swallows every failure after
//! logging it: a sync problem must never break the platform action that
//! triggered it.

use serde::Serialize;
use shop_mailchimp_core::{Contact, ContactId, Email, Order, ShopId, SyncRecord};
use tracing::instrument;

use crate::settings::ShopSettingsError;
use crate::sync::{MailchimpSync, SyncError};

/// Why a shop was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Integration switched off for the shop.
    Disabled,
    /// Enabled, but API key or list id missing.
    NotConfigured,
    /// The entity did not grant marketing permission.
    NoMarketingPermission,
    /// Missing, blank or malformed email.
    InvalidEmail,
}

/// Result of dispatching to one shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncOutcome {
    Synced { record: SyncRecord },
    Skipped { reason: SkipReason },
    Failed { error: String },
}

impl SyncOutcome {
    /// Whether the email reached Mailchimp.
    #[must_use]
    pub const fn is_synced(&self) -> bool {
        matches!(self, Self::Synced { .. })
    }
}

/// Outcome for one shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShopOutcome {
    pub shop: ShopId,
    #[serde(flatten)]
    pub outcome: SyncOutcome,
}

/// Routes contacts and orders to [`MailchimpSync`] when eligible.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    sync: MailchimpSync,
}

/// The eligibility-relevant parts of a contact or order.
struct Candidate<'a> {
    shops: &'a [ShopId],
    email: Option<Email>,
    marketing_permission: bool,
    contact: Option<&'a Contact>,
}

impl Dispatcher {
    /// Create a dispatcher over the sync service.
    #[must_use]
    pub const fn new(sync: MailchimpSync) -> Self {
        Self { sync }
    }

    /// The underlying sync service.
    #[must_use]
    pub const fn sync(&self) -> &MailchimpSync {
        &self.sync
    }

    /// Sync a saved person or company to every shop it belongs to.
    ///
    /// Returns one outcome per shop; a contact without shops yields none.
    #[instrument(skip(self, contact), fields(contact_id = %contact.id, kind = contact.kind_label()))]
    pub async fn sync_contact(&self, contact: &Contact) -> Vec<ShopOutcome> {
        self.dispatch(Candidate {
            shops: &contact.shops,
            email: contact.valid_email(),
            marketing_permission: contact.marketing_permission,
            contact: Some(contact),
        })
        .await
    }

    /// Sync the email captured on a finalized order to the order's shop.
    ///
    /// The order's own email and consent decide eligibility; the ordering
    /// customer, if any, becomes the sync record's contact.
    #[instrument(skip(self, order), fields(order_id = %order.id, shop = %order.shop))]
    pub async fn sync_from_order(&self, order: &Order) -> Vec<ShopOutcome> {
        self.dispatch(Candidate {
            shops: std::slice::from_ref(&order.shop),
            email: order.valid_email(),
            marketing_permission: order.marketing_permission,
            contact: order.customer.as_ref(),
        })
        .await
    }

    async fn dispatch(&self, candidate: Candidate<'_>) -> Vec<ShopOutcome> {
        if candidate.shops.is_empty() {
            tracing::debug!("No shops associated, nothing to sync");
            return Vec::new();
        }

        let mut outcomes = Vec::with_capacity(candidate.shops.len());
        for &shop in candidate.shops {
            let outcome = self.dispatch_to_shop(shop, &candidate).await;
            outcomes.push(ShopOutcome { shop, outcome });
        }
        outcomes
    }

    async fn dispatch_to_shop(&self, shop: ShopId, candidate: &Candidate<'_>) -> SyncOutcome {
        // The flag bypasses the cache; credentials may come from it.
        let enabled = match self.sync.settings().is_enabled(shop).await {
            Ok(enabled) => enabled,
            Err(e) => return settings_failure(shop, &e),
        };
        if !enabled {
            return skipped(shop, SkipReason::Disabled);
        }

        let settings = match self.sync.settings().load(shop).await {
            Ok(settings) => settings,
            Err(e) => return settings_failure(shop, &e),
        };
        if settings.api_key.is_none() || settings.list_id.is_none() {
            return skipped(shop, SkipReason::NotConfigured);
        }
        if !candidate.marketing_permission {
            return skipped(shop, SkipReason::NoMarketingPermission);
        }
        let Some(email) = &candidate.email else {
            return skipped(shop, SkipReason::InvalidEmail);
        };

        match self
            .sync
            .add_email_to_list(shop, email, candidate.contact)
            .await
        {
            Ok(record) => SyncOutcome::Synced { record },
            Err(e) => {
                log_failure(shop, candidate.contact.map(|c| c.id), &e);
                SyncOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

fn settings_failure(shop: ShopId, error: &ShopSettingsError) -> SyncOutcome {
    tracing::error!(shop = %shop, error = %error, "Failed to load Mailchimp settings");
    SyncOutcome::Failed {
        error: error.to_string(),
    }
}

fn skipped(shop: ShopId, reason: SkipReason) -> SyncOutcome {
    tracing::debug!(shop = %shop, reason = ?reason, "Not eligible for Mailchimp sync");
    SyncOutcome::Skipped { reason }
}

fn log_failure(shop: ShopId, contact: Option<ContactId>, error: &SyncError) {
    if error.is_remote() {
        tracing::warn!(shop = %shop, contact = ?contact, error = %error, "Mailchimp sync failed");
    } else {
        tracing::error!(shop = %shop, contact = ?contact, error = %error, "Mailchimp sync failed");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use shop_mailchimp_core::{ContactKind, SettingsForm};

    use super::*;
    use crate::config::MailchimpClientConfig;
    use crate::mailchimp::MailchimpClient;
    use crate::settings::ShopSettings;
    use crate::store::{SettingsStore, SyncRecordStore};

    fn dispatcher() -> Dispatcher {
        let client = MailchimpClient::new(&MailchimpClientConfig::default()).unwrap();
        let settings = ShopSettings::new(SettingsStore::memory(), Duration::from_secs(60));
        Dispatcher::new(MailchimpSync::new(
            client,
            settings,
            SyncRecordStore::memory(),
        ))
    }

    fn contact(shops: &[i64]) -> Contact {
        Contact {
            id: ContactId::new(1),
            kind: ContactKind::Person {
                first_name: None,
                last_name: None,
            },
            email: Some("jane@example.com".to_string()),
            marketing_permission: true,
            shops: shops.iter().copied().map(ShopId::new).collect(),
        }
    }

    #[tokio::test]
    async fn test_unknown_shop_is_disabled() {
        let outcomes = dispatcher().sync_contact(&contact(&[1])).await;
        assert_eq!(
            outcomes,
            vec![ShopOutcome {
                shop: ShopId::new(1),
                outcome: SyncOutcome::Skipped {
                    reason: SkipReason::Disabled
                },
            }]
        );
    }

    #[tokio::test]
    async fn test_enabled_without_list_is_not_configured() {
        let dispatcher = dispatcher();
        let form = SettingsForm {
            api_key: Some("abc-us6".to_string()),
            is_enabled: true,
            ..SettingsForm::default()
        };
        dispatcher
            .sync()
            .settings()
            .save(ShopId::new(1), &form)
            .await
            .unwrap();

        let outcomes = dispatcher.sync_contact(&contact(&[1])).await;
        assert_eq!(
            outcomes[0].outcome,
            SyncOutcome::Skipped {
                reason: SkipReason::NotConfigured
            }
        );
        assert_eq!(dispatcher.sync().records().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_disabled_by_another_process_is_skipped() {
        let store = SettingsStore::memory();
        let client = MailchimpClient::new(&MailchimpClientConfig::default()).unwrap();
        let dispatcher = Dispatcher::new(MailchimpSync::new(
            client,
            ShopSettings::new(store.clone(), Duration::from_secs(60)),
            SyncRecordStore::memory(),
        ));
        let cli = ShopSettings::new(store, Duration::from_secs(60));
        let shop = ShopId::new(1);
        let form = SettingsForm {
            is_enabled: true,
            ..SettingsForm::default()
        };
        dispatcher.sync().settings().save(shop, &form).await.unwrap();

        // Warm the cache with the enabled settings.
        let outcomes = dispatcher.sync_contact(&contact(&[1])).await;
        assert_eq!(
            outcomes[0].outcome,
            SyncOutcome::Skipped {
                reason: SkipReason::NotConfigured
            }
        );

        cli.set_enabled(shop, false).await.unwrap();

        let outcomes = dispatcher.sync_contact(&contact(&[1])).await;
        assert_eq!(
            outcomes[0].outcome,
            SyncOutcome::Skipped {
                reason: SkipReason::Disabled
            }
        );
    }

    #[tokio::test]
    async fn test_no_shops_no_outcomes() {
        assert!(dispatcher().sync_contact(&contact(&[])).await.is_empty());
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let outcome = ShopOutcome {
            shop: ShopId::new(4),
            outcome: SyncOutcome::Skipped {
                reason: SkipReason::NoMarketingPermission,
            },
        };
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            serde_json::json!({
                "shop": 4,
                "status": "skipped",
                "reason": "no_marketing_permission"
            })
        );
    }
}
