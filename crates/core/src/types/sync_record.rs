//! Local mirror of a Mailchimp list member.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::email::Email;
use super::id::{ContactId, ShopId};

/// Tracks whether and when an email was pushed to a shop's Mailchimp list.
///
/// There is at most one record per `(shop, email)`. A record is never
/// deleted by the sync; later syncs of the same address reassign `contact`
/// and refresh `sent_to_mailchimp`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::FromRow))]
pub struct SyncRecord {
    pub id: Uuid,
    pub shop_id: ShopId,
    pub email: Email,
    /// Contact the address was last synced for, if any.
    pub contact_id: Option<ContactId>,
    /// Last successful write to Mailchimp.
    pub sent_to_mailchimp: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl SyncRecord {
    /// A fresh, not yet sent record.
    #[must_use]
    pub fn new(shop_id: ShopId, email: Email, contact_id: Option<ContactId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            shop_id,
            email,
            contact_id,
            sent_to_mailchimp: None,
            created_at: Utc::now(),
        }
    }

    /// Whether the address has ever reached Mailchimp.
    #[must_use]
    pub const fn is_sent(&self) -> bool {
        self.sent_to_mailchimp.is_some()
    }
}
