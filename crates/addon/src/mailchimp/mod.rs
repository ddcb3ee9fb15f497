//! Mailchimp API client for list member management.
//!
//! One client serves every shop: credentials and list IDs come from each
//! shop's settings and are passed per call as a [`ListTarget`].
//!
//! # API Reference
//!
//! - Base URL: `https://<dc>.api.mailchimp.com/3.0`, where `<dc>` is the
//!   data-center suffix of the API key (`…-us6`)
//! - Authentication: HTTP basic auth, `<username>:<api key>` (any username works)
//! - Member ID: MD5 of the lowercased email ([`subscriber_hash`])

mod types;

pub use types::*;

use std::sync::Arc;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use shop_mailchimp_core::{Email, MailchimpSettings};
use thiserror::Error;
use tracing::instrument;
use url::Url;

use crate::config::MailchimpClientConfig;

/// Username sent when the shop has not configured one.
const DEFAULT_USERNAME: &str = "anystring";

/// Errors that can occur when interacting with the Mailchimp API.
#[derive(Debug, Error)]
pub enum MailchimpError {
    /// HTTP request failed (connection, timeout, TLS).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited by Mailchimp.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// Unauthorized (invalid API key or username).
    #[error("Unauthorized: invalid API key")]
    Unauthorized,

    /// API key has no data-center suffix.
    #[error("Invalid API key: expected a data-center suffix such as '-us6'")]
    InvalidApiKey,

    /// A required setting is missing.
    #[error("Missing Mailchimp setting: {0}")]
    MissingSetting(&'static str),

    /// The base URL cannot carry a path.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),
}

impl MailchimpError {
    /// HTTP status of the failed call, when there was a response.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimited(_) => Some(429),
            Self::Unauthorized => Some(401),
            Self::Http(e) => e.status().map(|s| s.as_u16()),
            Self::InvalidApiKey | Self::MissingSetting(_) | Self::InvalidBaseUrl(_) => None,
        }
    }
}

/// The list a request operates on, with the credentials to reach it.
#[derive(Clone)]
pub struct ListTarget {
    base_url: Url,
    list_id: String,
    username: String,
    api_key: SecretString,
}

impl ListTarget {
    /// Build a target from a shop's settings.
    ///
    /// `base_override` replaces the data-center URL derived from the API key.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key or list id is missing, or the API key
    /// has no data-center suffix and no override is given.
    pub fn from_settings(
        settings: &MailchimpSettings,
        base_override: Option<&Url>,
    ) -> Result<Self, MailchimpError> {
        let api_key = settings
            .api_key
            .clone()
            .ok_or(MailchimpError::MissingSetting("api_key"))?;
        let list_id = settings
            .list_id
            .clone()
            .ok_or(MailchimpError::MissingSetting("list_id"))?;

        let base_url = match base_override {
            Some(url) => url.clone(),
            None => data_center_url(api_key.expose_secret())?,
        };

        Ok(Self {
            base_url,
            list_id,
            username: settings
                .username
                .clone()
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            api_key,
        })
    }

    fn members_url(&self, hash: Option<&str>) -> Result<Url, MailchimpError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| MailchimpError::InvalidBaseUrl(self.base_url.to_string()))?;
            segments
                .pop_if_empty()
                .extend(["lists", self.list_id.as_str(), "members"]);
            if let Some(hash) = hash {
                segments.push(hash);
            }
        }
        Ok(url)
    }
}

impl std::fmt::Debug for ListTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListTarget")
            .field("base_url", &self.base_url.as_str())
            .field("list_id", &self.list_id)
            .field("username", &self.username)
            .field("api_key", &"[REDACTED]")
            .finish()
    }
}

/// Derive `https://<dc>.api.mailchimp.com/3.0` from an API key.
fn data_center_url(api_key: &str) -> Result<Url, MailchimpError> {
    let dc = api_key
        .rsplit_once('-')
        .map(|(_, dc)| dc)
        .filter(|dc| !dc.is_empty() && dc.chars().all(|c| c.is_ascii_alphanumeric()))
        .ok_or(MailchimpError::InvalidApiKey)?;

    Url::parse(&format!("https://{dc}.api.mailchimp.com/3.0"))
        .map_err(|_| MailchimpError::InvalidApiKey)
}

/// Mailchimp API client.
#[derive(Clone)]
pub struct MailchimpClient {
    inner: Arc<MailchimpClientInner>,
}

struct MailchimpClientInner {
    client: reqwest::Client,
    base_override: Option<Url>,
}

impl MailchimpClient {
    /// Create a new Mailchimp API client.
    ///
    /// Every request carries the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client fails to build.
    pub fn new(config: &MailchimpClientConfig) -> Result<Self, MailchimpError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("shop-mailchimp-addon/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            inner: Arc::new(MailchimpClientInner {
                client,
                base_override: config.base_url.clone(),
            }),
        })
    }

    /// Resolve the list target for a shop's settings.
    ///
    /// # Errors
    ///
    /// See [`ListTarget::from_settings`].
    pub fn target(&self, settings: &MailchimpSettings) -> Result<ListTarget, MailchimpError> {
        ListTarget::from_settings(settings, self.inner.base_override.as_ref())
    }

    /// Look up a list member. `Ok(None)` means Mailchimp answered 404.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Mailchimp answers with any other
    /// non-success status.
    #[instrument(skip(self, target), fields(list_id = %target.list_id))]
    pub async fn get_member(
        &self,
        target: &ListTarget,
        email: &Email,
    ) -> Result<Option<Member>, MailchimpError> {
        let url = target.members_url(Some(&subscriber_hash(email)))?;
        let response = self
            .inner
            .client
            .get(url)
            .basic_auth(&target.username, Some(target.api_key.expose_secret()))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_status(response).await?;
        Ok(Some(response.json().await.unwrap_or_default()))
    }

    /// Add or update a member (`PUT`).
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Mailchimp answers non-success.
    #[instrument(skip(self, target, merge_fields), fields(list_id = %target.list_id))]
    pub async fn update_member(
        &self,
        target: &ListTarget,
        email: &Email,
        merge_fields: &MergeFields,
    ) -> Result<Member, MailchimpError> {
        let url = target.members_url(Some(&subscriber_hash(email)))?;
        let body = UpsertMember {
            email_address: email.as_str(),
            status_if_new: MemberStatus::Subscribed,
            merge_fields,
        };

        let response = self
            .inner
            .client
            .put(url)
            .basic_auth(&target.username, Some(target.api_key.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await.unwrap_or_default())
    }

    /// Create a subscribed member (`POST`).
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or Mailchimp answers non-success.
    #[instrument(skip(self, target, merge_fields), fields(list_id = %target.list_id))]
    pub async fn create_member(
        &self,
        target: &ListTarget,
        email: &Email,
        merge_fields: &MergeFields,
    ) -> Result<Member, MailchimpError> {
        let url = target.members_url(None)?;
        let body = CreateMember {
            email_address: email.as_str(),
            status: MemberStatus::Subscribed,
            merge_fields,
        };

        let response = self
            .inner
            .client
            .post(url)
            .basic_auth(&target.username, Some(target.api_key.expose_secret()))
            .json(&body)
            .send()
            .await?;

        let response = check_status(response).await?;
        Ok(response.json().await.unwrap_or_default())
    }
}

impl std::fmt::Debug for MailchimpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MailchimpClient")
            .field(
                "base_override",
                &self.inner.base_override.as_ref().map(Url::as_str),
            )
            .finish_non_exhaustive()
    }
}

/// Pass a success response through, or turn it into an error.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, MailchimpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .unwrap_or(60);
        return Err(MailchimpError::RateLimited(retry_after));
    }

    if status == StatusCode::UNAUTHORIZED {
        return Err(MailchimpError::Unauthorized);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiProblem>(&body)
        .ok()
        .map(|p| {
            if p.detail.is_empty() {
                p.title
            } else {
                format!("{}: {}", p.title, p.detail)
            }
        })
        .filter(|m| !m.is_empty())
        .unwrap_or(body);

    Err(MailchimpError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn settings(api_key: &str) -> MailchimpSettings {
        MailchimpSettings {
            enabled: true,
            api_key: Some(SecretString::from(api_key)),
            list_id: Some("abc123".to_string()),
            username: None,
        }
    }

    #[test]
    fn test_data_center_url() {
        let target = ListTarget::from_settings(&settings("0123456789abcdef-us6"), None).unwrap();
        assert_eq!(target.base_url.as_str(), "https://us6.api.mailchimp.com/3.0");
        assert_eq!(target.username, DEFAULT_USERNAME);
    }

    #[test]
    fn test_api_key_without_data_center() {
        let err = ListTarget::from_settings(&settings("0123456789abcdef"), None).unwrap_err();
        assert!(matches!(err, MailchimpError::InvalidApiKey));
    }

    #[test]
    fn test_missing_list_id() {
        let mut settings = settings("key-us1");
        settings.list_id = None;
        let err = ListTarget::from_settings(&settings, None).unwrap_err();
        assert!(matches!(err, MailchimpError::MissingSetting("list_id")));
    }

    #[test]
    fn test_members_url_with_override() {
        let base = Url::parse("http://127.0.0.1:9999/3.0/").unwrap();
        let target = ListTarget::from_settings(&settings("key"), Some(&base)).unwrap();
        let email = Email::parse("a@b.com").unwrap();

        let collection = target.members_url(None).unwrap();
        assert_eq!(
            collection.as_str(),
            "http://127.0.0.1:9999/3.0/lists/abc123/members"
        );

        let member = target.members_url(Some(&subscriber_hash(&email))).unwrap();
        assert!(member.path().starts_with("/3.0/lists/abc123/members/"));
        assert_eq!(member.path_segments().unwrap().count(), 5);
    }

    #[test]
    fn test_target_debug_redacts_api_key() {
        let target = ListTarget::from_settings(&settings("supersecretkey-us2"), None).unwrap();
        let debug_output = format!("{target:?}");
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("supersecretkey"));
    }
}
