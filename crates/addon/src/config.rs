//! Addon configuration loaded from environment variables.
//!
//! Per-shop Mailchimp credentials are NOT configured here; they live in the
//! configuration store and are edited through the settings endpoint or CLI.
//!
//! # Environment Variables
//!
//! ## Required
//! - `ADDON_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `ADDON_ADMIN_TOKEN` - Bearer token for the shop settings and contacts endpoints
//! - `ADDON_WEBHOOK_SECRET` - HMAC-SHA256 key the platform signs event webhooks with
//!
//! ## Optional
//! - `ADDON_HOST` - Bind address (default: 127.0.0.1)
//! - `ADDON_PORT` - Listen port (default: 3002)
//! - `MAILCHIMP_HTTP_TIMEOUT_SECS` - Per-request timeout for Mailchimp calls (default: 10)
//! - `MAILCHIMP_API_BASE_URL` - Override the data-center API URL (e.g. for a sandbox)
//! - `SETTINGS_CACHE_TTL_SECS` - How long per-shop settings are cached (default: 60)
//! - `EVENT_QUEUE_CAPACITY` - Platform events buffered before webhooks answer 503 (default: 1024)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_SAMPLE_RATE` - Error sample rate (default: 1.0)
//! - `SENTRY_TRACES_SAMPLE_RATE` - Traces sample rate (default: 0.1)

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const DEFAULT_PORT: &str = "3002";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const DEFAULT_SETTINGS_CACHE_TTL_SECS: u64 = 60;
const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Addon service configuration.
#[derive(Debug, Clone)]
pub struct AddonConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Mailchimp HTTP client settings
    pub mailchimp: MailchimpClientConfig,
    /// Shared secrets for admin and webhook routes
    pub auth: AuthConfig,
    /// TTL of the per-shop settings cache
    pub settings_cache_ttl: Duration,
    /// Number of platform events buffered for the sync worker
    pub event_queue_capacity: usize,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry error sample rate (0.0 to 1.0)
    pub sentry_sample_rate: f32,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Settings shared by every Mailchimp request, whatever the shop.
#[derive(Debug, Clone)]
pub struct MailchimpClientConfig {
    /// Timeout applied to each HTTP request.
    pub timeout: Duration,
    /// Fixed API base URL. When unset, the URL is derived from the data-center
    /// suffix of each shop's API key.
    pub base_url: Option<Url>,
}

/// Shared secrets checked by the route guards.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Expected `Authorization: Bearer` value on admin routes.
    pub admin_token: SecretString,
    /// Key for the HMAC-SHA256 signature on event webhooks.
    pub webhook_secret: SecretString,
}

impl AuthConfig {
    /// Load the shared secrets from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if either secret is unset or empty.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            admin_token: get_secret("ADDON_ADMIN_TOKEN")?,
            webhook_secret: get_secret("ADDON_WEBHOOK_SECRET")?,
        })
    }
}

impl Default for MailchimpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            base_url: None,
        }
    }
}

impl AddonConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the database URL or a shared secret is missing, or
    /// any variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let host = get_env_or_default("ADDON_HOST", "127.0.0.1")
            .parse()
            .map_err(|e| ConfigError::InvalidEnvVar("ADDON_HOST".to_string(), format!("{e}")))?;

        let port = get_env_or_default("ADDON_PORT", DEFAULT_PORT)
            .parse()
            .map_err(|e| ConfigError::InvalidEnvVar("ADDON_PORT".to_string(), format!("{e}")))?;

        Ok(Self {
            database_url: get_database_url("ADDON_DATABASE_URL")?,
            host,
            port,
            mailchimp: MailchimpClientConfig::from_env()?,
            auth: AuthConfig::from_env()?,
            settings_cache_ttl: Duration::from_secs(get_parsed_env(
                "SETTINGS_CACHE_TTL_SECS",
                DEFAULT_SETTINGS_CACHE_TTL_SECS,
            )?),
            event_queue_capacity: get_parsed_env(
                "EVENT_QUEUE_CAPACITY",
                DEFAULT_EVENT_QUEUE_CAPACITY,
            )?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: get_parsed_env("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: get_parsed_env("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    /// Get the socket address to bind to.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl MailchimpClientConfig {
    /// Load the Mailchimp client settings from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if the timeout is not a positive integer or the base
    /// URL does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        let timeout_secs = get_parsed_env("MAILCHIMP_HTTP_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "MAILCHIMP_HTTP_TIMEOUT_SECS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let base_url = get_optional_env("MAILCHIMP_API_BASE_URL")
            .map(|raw| {
                Url::parse(&raw).map_err(|e| {
                    ConfigError::InvalidEnvVar("MAILCHIMP_API_BASE_URL".to_string(), e.to_string())
                })
            })
            .transpose()?;

        Ok(Self {
            timeout: Duration::from_secs(timeout_secs),
            base_url,
        })
    }
}

fn get_database_url(primary_key: &str) -> Result<SecretString, ConfigError> {
    get_optional_env(primary_key)
        .or_else(|| get_optional_env("DATABASE_URL"))
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(primary_key.to_string()))
}

fn get_secret(key: &str) -> Result<SecretString, ConfigError> {
    get_optional_env(key)
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
}

fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn get_parsed_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_optional_env(key).map_or(Ok(default), |raw| {
        raw.parse()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), format!("{e}")))
    })
}
