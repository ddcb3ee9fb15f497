//! Database operations for the addon `PostgreSQL` schema.
//!
//! # Schema: `mailchimp`
//!
//! ## Tables
//!
//! - `shop_settings` - Per-shop configuration values (JSONB), keyed by `(shop_id, key)`
//! - `contacts` - Sync records, unique on `(shop_id, email)`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/addon/migrations/` and run via:
//! ```bash
//! cargo run -p shop-mailchimp-cli -- migrate
//! ```

pub mod settings;
pub mod sync_records;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use settings::SettingsRepository;
pub use sync_records::SyncRecordRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Run the addon migrations.
///
/// # Errors
///
/// Returns an error if a migration fails to apply.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
