//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! smc-cli migrate
//! ```
//!
//! Migrations live in `crates/addon/migrations/` and create the `mailchimp`
//! schema: `shop_settings` (per-shop key/value settings) and `contacts`
//! (one sync record per shop and email).

use thiserror::Error;

use super::{CommandError, connect};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run the addon migrations.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running addon migrations...");
    shop_mailchimp_addon::db::run_migrations(&pool).await?;

    tracing::info!("Addon migrations complete!");
    Ok(())
}
