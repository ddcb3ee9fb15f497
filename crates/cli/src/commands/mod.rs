//! CLI subcommands.

pub mod migrate;
pub mod settings;
pub mod sync;

use std::time::Duration;

use secrecy::SecretString;
use sqlx::PgPool;
use thiserror::Error;

/// Settings cache lifetime for one-shot commands.
pub const CACHE_TTL: Duration = Duration::from_secs(1);

/// Errors shared by every command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Connect to the addon database named by `ADDON_DATABASE_URL` (or `DATABASE_URL`).
pub async fn connect() -> Result<PgPool, CommandError> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("ADDON_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| CommandError::MissingEnvVar("ADDON_DATABASE_URL"))?;

    tracing::info!("Connecting to addon database...");
    Ok(shop_mailchimp_addon::db::create_pool(&database_url).await?)
}
