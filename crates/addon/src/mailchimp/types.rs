//! Mailchimp Marketing API v3 list-member payloads.

use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use shop_mailchimp_core::{Contact, Email};

/// Mailchimp's member ID: lowercase hex MD5 of the lowercased address.
#[must_use]
pub fn subscriber_hash(email: &Email) -> String {
    // Email is already lowercased on parse
    hex::encode(Md5::digest(email.as_str().as_bytes()))
}

/// Member subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Subscribed,
    Unsubscribed,
    Cleaned,
    Pending,
    Transactional,
    Archived,
}

/// Standard merge fields filled from the contact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeFields {
    #[serde(rename = "FNAME", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(rename = "LNAME", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl MergeFields {
    /// Merge fields for a contact. No contact means no merge fields.
    #[must_use]
    pub fn from_contact(contact: Option<&Contact>) -> Self {
        contact.map_or_else(Self::default, |c| Self {
            first_name: c.first_name().map(ToString::to_string),
            last_name: c.last_name().map(ToString::to_string),
        })
    }

    /// Whether there is nothing to send.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none()
    }
}

/// Body of `POST /lists/{list_id}/members`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateMember<'a> {
    pub email_address: &'a str,
    pub status: MemberStatus,
    #[serde(skip_serializing_if = "MergeFields::is_empty")]
    pub merge_fields: &'a MergeFields,
}

/// Body of `PUT /lists/{list_id}/members/{subscriber_hash}`.
///
/// PUT is Mailchimp's add-or-update: `status_if_new` applies only when the
/// member does not exist yet, and an existing member's status is left alone.
#[derive(Debug, Clone, Serialize)]
pub struct UpsertMember<'a> {
    pub email_address: &'a str,
    pub status_if_new: MemberStatus,
    #[serde(skip_serializing_if = "MergeFields::is_empty")]
    pub merge_fields: &'a MergeFields,
}

/// List member as returned by Mailchimp.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Member {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email_address: String,
    #[serde(default)]
    pub status: Option<MemberStatus>,
}

/// Problem-details error body returned by Mailchimp.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiProblem {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;
    use shop_mailchimp_core::{ContactId, ContactKind};

    use super::*;

    #[test]
    fn test_subscriber_hash_is_md5_of_lowercase() {
        // md5("urist.mcvankab@freddiesjokes.com"), from the Mailchimp docs
        let email = Email::parse("Urist.McVankab@freddiesjokes.com").unwrap();
        assert_eq!(subscriber_hash(&email), "62eeb292278cc15f5817cb78f7790b08");
    }

    #[test]
    fn test_merge_fields_for_person() {
        let contact = Contact {
            id: ContactId::new(1),
            kind: ContactKind::Person {
                first_name: Some("Jane".to_string()),
                last_name: Some("Doe".to_string()),
            },
            email: Some("jane@example.com".to_string()),
            marketing_permission: true,
            shops: vec![],
        };

        let fields = MergeFields::from_contact(Some(&contact));
        assert_eq!(
            serde_json::to_value(&fields).unwrap(),
            json!({ "FNAME": "Jane", "LNAME": "Doe" })
        );
    }

    #[test]
    fn test_create_member_omits_empty_merge_fields() {
        let fields = MergeFields::from_contact(None);
        let body = CreateMember {
            email_address: "a@b.com",
            status: MemberStatus::Subscribed,
            merge_fields: &fields,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({ "email_address": "a@b.com", "status": "subscribed" })
        );
    }

    #[test]
    fn test_member_parses_partial_body() {
        let member: Member = serde_json::from_str(r#"{ "id": "abc", "status": "subscribed" }"#).unwrap();
        assert_eq!(member.id, "abc");
        assert_eq!(member.status, Some(MemberStatus::Subscribed));
        assert!(member.email_address.is_empty());
    }
}
