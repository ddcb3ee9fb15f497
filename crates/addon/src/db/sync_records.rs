//! Sync record storage backed by `mailchimp.contacts`.

use chrono::{DateTime, Utc};
use shop_mailchimp_core::{ContactId, Email, ShopId, SyncRecord};
use sqlx::PgPool;
use uuid::Uuid;

use super::RepositoryError;

/// Repository for sync records.
#[derive(Debug, Clone)]
pub struct SyncRecordRepository {
    pool: PgPool,
}

impl SyncRecordRepository {
    /// Create a repository over the given pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find the record for a shop and email.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find(
        &self,
        shop: ShopId,
        email: &Email,
    ) -> Result<Option<SyncRecord>, RepositoryError> {
        let record = sqlx::query_as::<_, SyncRecord>(
            r"
            SELECT id, shop_id, email, contact_id, sent_to_mailchimp, created_at
            FROM mailchimp.contacts
            WHERE shop_id = $1 AND email = $2
            ",
        )
        .bind(shop)
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Insert or update the record for `(shop, email)`.
    ///
    /// The unique constraint serializes concurrent writers; the last write
    /// wins for `contact_id` and `sent_to_mailchimp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn upsert(
        &self,
        shop: ShopId,
        email: &Email,
        contact: Option<ContactId>,
        sent_at: DateTime<Utc>,
    ) -> Result<SyncRecord, RepositoryError> {
        let record = sqlx::query_as::<_, SyncRecord>(
            r"
            INSERT INTO mailchimp.contacts (id, shop_id, email, contact_id, sent_to_mailchimp)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (shop_id, email) DO UPDATE
                SET contact_id = EXCLUDED.contact_id,
                    sent_to_mailchimp = EXCLUDED.sent_to_mailchimp
            RETURNING id, shop_id, email, contact_id, sent_to_mailchimp, created_at
            ",
        )
        .bind(Uuid::new_v4())
        .bind(shop)
        .bind(email)
        .bind(contact)
        .bind(sent_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    /// List a shop's records, most recently sent first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self, shop: ShopId) -> Result<Vec<SyncRecord>, RepositoryError> {
        let records = sqlx::query_as::<_, SyncRecord>(
            r"
            SELECT id, shop_id, email, contact_id, sent_to_mailchimp, created_at
            FROM mailchimp.contacts
            WHERE shop_id = $1
            ORDER BY sent_to_mailchimp DESC NULLS LAST, email
            ",
        )
        .bind(shop)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    /// Count records across all shops.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM mailchimp.contacts")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}
