//! # Payment Method Repository
//!
//! Database operations for cash drawers, bank accounts and wallets.
//!
//! The running `amount` column is written only by the ledger engine.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use bahi_core::{PaymentMethod, SyncStatus};

/// Repository for payment method database operations.
#[derive(Debug, Clone)]
pub struct PaymentMethodRepository {
    pool: SqlitePool,
}

impl PaymentMethodRepository {
    /// Creates a new PaymentMethodRepository.
    pub fn new(pool: SqlitePool) -> Self {
        PaymentMethodRepository { pool }
    }

    /// Inserts a locally created payment method (always dirty).
    pub async fn insert(&self, method: &PaymentMethod) -> DbResult<i64> {
        debug!(slug = %method.slug, name = %method.name, "Inserting payment method");

        let result = sqlx::query(
            r#"
            INSERT INTO payment_methods (
                slug, business_slug, name, opening_amount, amount,
                sync_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&method.slug)
        .bind(&method.business_slug)
        .bind(&method.name)
        .bind(method.opening_amount)
        .bind(method.amount)
        .bind(SyncStatus::Dirty)
        .bind(method.created_at)
        .bind(method.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Gets a payment method by slug.
    pub async fn get_by_slug(&self, slug: &str) -> DbResult<Option<PaymentMethod>> {
        let method =
            sqlx::query_as::<_, PaymentMethod>("SELECT * FROM payment_methods WHERE slug = ?")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(method)
    }

    /// Lists all payment methods for a business.
    pub async fn list(&self, business_slug: &str) -> DbResult<Vec<PaymentMethod>> {
        let methods = sqlx::query_as::<_, PaymentMethod>(
            "SELECT * FROM payment_methods WHERE business_slug = ? ORDER BY name",
        )
        .bind(business_slug)
        .fetch_all(&self.pool)
        .await?;
        Ok(methods)
    }

    /// Lists rows awaiting push.
    pub async fn list_dirty(&self, business_slug: &str) -> DbResult<Vec<PaymentMethod>> {
        let methods = sqlx::query_as::<_, PaymentMethod>(
            "SELECT * FROM payment_methods WHERE business_slug = ? AND sync_status = ? ORDER BY id",
        )
        .bind(business_slug)
        .bind(SyncStatus::Dirty)
        .fetch_all(&self.pool)
        .await?;
        Ok(methods)
    }

    /// Marks a pushed row as synced if it was not edited since push time.
    pub async fn mark_synced(&self, slug: &str, pushed_at: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE payment_methods SET sync_status = ? WHERE slug = ? AND updated_at = ?",
        )
        .bind(SyncStatus::Synced)
        .bind(slug)
        .bind(pushed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Upserts a row pulled from the server (remote is authoritative).
    pub async fn upsert_remote(&self, method: &PaymentMethod) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payment_methods (
                slug, business_slug, name, opening_amount, amount,
                sync_status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(slug) DO UPDATE SET
                business_slug = excluded.business_slug,
                name = excluded.name,
                opening_amount = excluded.opening_amount,
                amount = excluded.amount,
                sync_status = excluded.sync_status,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&method.slug)
        .bind(&method.business_slug)
        .bind(&method.name)
        .bind(method.opening_amount)
        .bind(method.amount)
        .bind(SyncStatus::Synced)
        .bind(method.created_at)
        .bind(method.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Deletes a payment method by slug (tombstone application).
    pub async fn delete_by_slug(&self, slug: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM payment_methods WHERE slug = ?")
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
