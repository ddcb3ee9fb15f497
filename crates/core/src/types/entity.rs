//! Source entities delivered by the host platform.
//!
//! These are read-only snapshots carried in event payloads. The addon never
//! writes them back; it only looks at the email, the marketing permission and
//! enough of the name to fill Mailchimp merge fields.

use serde::{Deserialize, Serialize};

use super::email::Email;
use super::id::{ContactId, OrderId, ShopId};

/// What kind of contact a [`Contact`] is, with its naming data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContactKind {
    /// A natural person.
    Person {
        #[serde(default)]
        first_name: Option<String>,
        #[serde(default)]
        last_name: Option<String>,
    },
    /// A company contact.
    Company { name: String },
}

/// A person or company contact as saved on the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: ContactId,
    #[serde(flatten)]
    pub kind: ContactKind,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub marketing_permission: bool,
    /// Shops the contact is a member of.
    #[serde(default)]
    pub shops: Vec<ShopId>,
}

impl Contact {
    /// The contact's email, if present and well-formed.
    #[must_use]
    pub fn valid_email(&self) -> Option<Email> {
        Email::from_field(self.email.as_deref())
    }

    /// First-name merge value. Companies use their name here.
    #[must_use]
    pub fn first_name(&self) -> Option<&str> {
        match &self.kind {
            ContactKind::Person { first_name, .. } => non_blank(first_name.as_deref()),
            ContactKind::Company { name } => non_blank(Some(name)),
        }
    }

    /// Last-name merge value.
    #[must_use]
    pub fn last_name(&self) -> Option<&str> {
        match &self.kind {
            ContactKind::Person { last_name, .. } => non_blank(last_name.as_deref()),
            ContactKind::Company { .. } => None,
        }
    }

    /// Short label for logs.
    #[must_use]
    pub const fn kind_label(&self) -> &'static str {
        match self.kind {
            ContactKind::Person { .. } => "person",
            ContactKind::Company { .. } => "company",
        }
    }
}

/// A finalized order.
///
/// Orders carry their own email and marketing consent, captured at checkout,
/// independently of any customer account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub shop: ShopId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub marketing_permission: bool,
    /// The ordering customer, when the order was placed by a known contact.
    #[serde(default)]
    pub customer: Option<Contact>,
}

impl Order {
    /// The order email, if present and well-formed.
    #[must_use]
    pub fn valid_email(&self) -> Option<Email> {
        Email::from_field(self.email.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}
