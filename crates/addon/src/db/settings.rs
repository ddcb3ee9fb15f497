//! Per-shop configuration store backed by `mailchimp.shop_settings`.

use serde_json::Value as JsonValue;
use shop_mailchimp_core::ShopId;
use sqlx::PgPool;

use super::RepositoryError;

/// Repository for per-shop configuration values.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    /// Create a repository over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a single configuration value.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, shop: ShopId, key: &str) -> Result<Option<JsonValue>, RepositoryError> {
        let value = sqlx::query_scalar::<_, JsonValue>(
            r"
            SELECT value FROM mailchimp.shop_settings
            WHERE shop_id = $1 AND key = $2
            ",
        )
        .bind(shop)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(value)
    }

    /// Get every configuration value stored for a shop.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get_all(&self, shop: ShopId) -> Result<Vec<(String, JsonValue)>, RepositoryError> {
        let rows = sqlx::query_as::<_, (String, JsonValue)>(
            r"
            SELECT key, value FROM mailchimp.shop_settings
            WHERE shop_id = $1
            ORDER BY key
            ",
        )
        .bind(shop)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Set a configuration value, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn set(&self, shop: ShopId, key: &str, value: &JsonValue) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO mailchimp.shop_settings (shop_id, key, value)
            VALUES ($1, $2, $3)
            ON CONFLICT (shop_id, key) DO UPDATE SET value = $3, updated_at = NOW()
            ",
        )
        .bind(shop)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
