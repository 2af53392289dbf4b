//! # Sync Gateway Repository
//!
//! Kind-dispatched bridge between the typed repositories and the sync
//! engine's JSON world.
//!
//! ## Why JSON At This Seam
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  The sync engine iterates over EntityKind values and moves opaque   │
//! │  row payloads. It never needs the entity types themselves, so the   │
//! │  transport trait stays small and mock-friendly.                     │
//! │                                                                     │
//! │  push:  list_dirty_rows(kind)  → Vec<SyncRow { slug, updated_at,    │
//! │                                  payload }>                         │
//! │  ack:   mark_row_synced(kind, row)   (updated_at snapshot guard)    │
//! │  pull:  apply_remote_row(kind, payload)   → typed upsert, Synced    │
//! │  tomb:  apply_tombstone(kind, slug)       → typed delete            │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::party::PartyRepository;
use crate::repository::payment_method::PaymentMethodRepository;
use crate::repository::product::ProductRepository;
use crate::repository::reference::{
    CategoryRepository, QuantityUnitRepository, WarehouseRepository,
};
use crate::repository::tombstone::TombstoneRepository;
use crate::repository::transaction::TransactionRepository;
use bahi_core::{
    DeletedRecord, EntityKind, Party, PaymentMethod, Product, ProductCategory, ProductStock,
    QuantityUnit, Transaction, Warehouse,
};

/// One row as the sync engine sees it.
#[derive(Debug, Clone)]
pub struct SyncRow {
    /// The row's sync key.
    pub slug: String,
    /// Revision snapshot captured when the row was listed. The
    /// acknowledgement only sticks if the row still carries this revision.
    pub updated_at: DateTime<Utc>,
    /// Full entity as JSON, exactly what goes over the wire.
    pub payload: serde_json::Value,
}

/// Kind-dispatched sync operations over every entity table.
#[derive(Debug, Clone)]
pub struct SyncRepository {
    pool: SqlitePool,
}

impl SyncRepository {
    /// Creates a new SyncRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SyncRepository { pool }
    }

    /// Lists the dirty rows of one kind, serialized for push.
    pub async fn list_dirty_rows(
        &self,
        kind: EntityKind,
        business_slug: &str,
    ) -> DbResult<Vec<SyncRow>> {
        let rows = match kind {
            EntityKind::Category => {
                to_rows(CategoryRepository::new(self.pool.clone()).list_dirty(business_slug).await?)?
            }
            EntityKind::QuantityUnit => to_rows(
                QuantityUnitRepository::new(self.pool.clone())
                    .list_dirty(business_slug)
                    .await?,
            )?,
            EntityKind::Warehouse => to_rows(
                WarehouseRepository::new(self.pool.clone())
                    .list_dirty(business_slug)
                    .await?,
            )?,
            EntityKind::PaymentMethod => to_rows(
                PaymentMethodRepository::new(self.pool.clone())
                    .list_dirty(business_slug)
                    .await?,
            )?,
            EntityKind::Product => {
                to_rows(ProductRepository::new(self.pool.clone()).list_dirty(business_slug).await?)?
            }
            EntityKind::Party => {
                to_rows(PartyRepository::new(self.pool.clone()).list_dirty(business_slug).await?)?
            }
            EntityKind::Transaction => to_rows(
                TransactionRepository::new(self.pool.clone())
                    .list_dirty(business_slug)
                    .await?,
            )?,
            EntityKind::ProductStock => to_rows(
                ProductRepository::new(self.pool.clone())
                    .list_dirty_stocks(business_slug)
                    .await?,
            )?,
            EntityKind::DeletedRecord => TombstoneRepository::new(self.pool.clone())
                .list_dirty(business_slug)
                .await?
                .into_iter()
                .map(|record| {
                    Ok(SyncRow {
                        slug: record.record_slug.clone(),
                        updated_at: record.deleted_at,
                        payload: to_payload(&record, EntityKind::DeletedRecord)?,
                    })
                })
                .collect::<DbResult<Vec<_>>>()?,
        };

        debug!(kind = kind.as_str(), rows = rows.len(), "Listed dirty rows");
        Ok(rows)
    }

    /// Marks an acknowledged row as synced.
    ///
    /// Guarded by the `updated_at` snapshot in the row: an edit that raced
    /// the push keeps the newer revision dirty. Returns whether the mark
    /// took effect.
    pub async fn mark_row_synced(&self, kind: EntityKind, row: &SyncRow) -> DbResult<bool> {
        match kind {
            EntityKind::Category => {
                CategoryRepository::new(self.pool.clone())
                    .mark_synced(&row.slug, row.updated_at)
                    .await
            }
            EntityKind::QuantityUnit => {
                QuantityUnitRepository::new(self.pool.clone())
                    .mark_synced(&row.slug, row.updated_at)
                    .await
            }
            EntityKind::Warehouse => {
                WarehouseRepository::new(self.pool.clone())
                    .mark_synced(&row.slug, row.updated_at)
                    .await
            }
            EntityKind::PaymentMethod => {
                PaymentMethodRepository::new(self.pool.clone())
                    .mark_synced(&row.slug, row.updated_at)
                    .await
            }
            EntityKind::Product => {
                ProductRepository::new(self.pool.clone())
                    .mark_synced(&row.slug, row.updated_at)
                    .await
            }
            EntityKind::Party => {
                PartyRepository::new(self.pool.clone())
                    .mark_synced(&row.slug, row.updated_at)
                    .await
            }
            EntityKind::Transaction => {
                TransactionRepository::new(self.pool.clone())
                    .mark_synced(&row.slug, row.updated_at)
                    .await
            }
            EntityKind::ProductStock => {
                ProductRepository::new(self.pool.clone())
                    .mark_stock_synced(&row.slug, row.updated_at)
                    .await
            }
            EntityKind::DeletedRecord => {
                let record: DeletedRecord = from_payload(&row.payload, kind)?;
                TombstoneRepository::new(self.pool.clone())
                    .mark_synced(record.entity_kind, &record.record_slug)
                    .await
            }
        }
    }

    /// Applies one pulled row: typed upsert, marked `Synced`.
    ///
    /// Remote is authoritative (last write wins). Balance columns arrive
    /// already settled; the effect calculator never runs on pulled rows.
    pub async fn apply_remote_row(
        &self,
        kind: EntityKind,
        payload: &serde_json::Value,
    ) -> DbResult<()> {
        match kind {
            EntityKind::Category => {
                let entity: ProductCategory = from_payload(payload, kind)?;
                CategoryRepository::new(self.pool.clone()).upsert_remote(&entity).await
            }
            EntityKind::QuantityUnit => {
                let entity: QuantityUnit = from_payload(payload, kind)?;
                QuantityUnitRepository::new(self.pool.clone()).upsert_remote(&entity).await
            }
            EntityKind::Warehouse => {
                let entity: Warehouse = from_payload(payload, kind)?;
                WarehouseRepository::new(self.pool.clone()).upsert_remote(&entity).await
            }
            EntityKind::PaymentMethod => {
                let entity: PaymentMethod = from_payload(payload, kind)?;
                PaymentMethodRepository::new(self.pool.clone()).upsert_remote(&entity).await
            }
            EntityKind::Product => {
                let entity: Product = from_payload(payload, kind)?;
                ProductRepository::new(self.pool.clone()).upsert_remote(&entity).await
            }
            EntityKind::Party => {
                let entity: Party = from_payload(payload, kind)?;
                PartyRepository::new(self.pool.clone()).upsert_remote(&entity).await
            }
            EntityKind::Transaction => {
                let entity: Transaction = from_payload(payload, kind)?;
                TransactionRepository::new(self.pool.clone()).upsert_remote(&entity).await
            }
            EntityKind::ProductStock => {
                let entity: ProductStock = from_payload(payload, kind)?;
                ProductRepository::new(self.pool.clone()).upsert_remote_stock(&entity).await
            }
            // Tombstones arrive through the dedicated tombstone pull, not
            // as entity rows.
            EntityKind::DeletedRecord => Err(DbError::MalformedPayload {
                entity: kind.as_str().to_string(),
                message: "tombstones are not pulled as entity rows".to_string(),
            }),
        }
    }

    /// Applies a pulled tombstone: deletes the named row locally.
    ///
    /// Returns whether anything was deleted (a row may already be gone,
    /// which is fine).
    pub async fn apply_tombstone(&self, kind: EntityKind, slug: &str) -> DbResult<bool> {
        debug!(kind = kind.as_str(), slug = %slug, "Applying remote tombstone");
        match kind {
            EntityKind::Category => {
                CategoryRepository::new(self.pool.clone()).delete_by_slug(slug).await
            }
            EntityKind::QuantityUnit => {
                QuantityUnitRepository::new(self.pool.clone()).delete_by_slug(slug).await
            }
            EntityKind::Warehouse => {
                WarehouseRepository::new(self.pool.clone()).delete_by_slug(slug).await
            }
            EntityKind::PaymentMethod => {
                PaymentMethodRepository::new(self.pool.clone()).delete_by_slug(slug).await
            }
            EntityKind::Product => {
                ProductRepository::new(self.pool.clone()).delete_by_slug(slug).await
            }
            EntityKind::Party => {
                PartyRepository::new(self.pool.clone()).delete_by_slug(slug).await
            }
            EntityKind::Transaction => {
                TransactionRepository::new(self.pool.clone()).delete_by_slug(slug).await
            }
            EntityKind::ProductStock => {
                ProductRepository::new(self.pool.clone()).delete_stock_by_slug(slug).await
            }
            // A tombstone of a tombstone has no meaning.
            EntityKind::DeletedRecord => Ok(false),
        }
    }
}

// =============================================================================
// Serialization helpers
// =============================================================================

trait Keyed {
    fn sync_key(&self) -> (String, DateTime<Utc>);
}

macro_rules! impl_keyed {
    ($($ty:ty),+) => {$(
        impl Keyed for $ty {
            fn sync_key(&self) -> (String, DateTime<Utc>) {
                (self.slug.clone(), self.updated_at)
            }
        }
    )+};
}

impl_keyed!(
    Party,
    PaymentMethod,
    Product,
    ProductStock,
    ProductCategory,
    QuantityUnit,
    Warehouse,
    Transaction
);

fn to_rows<T: Keyed + Serialize>(entities: Vec<T>) -> DbResult<Vec<SyncRow>> {
    entities
        .into_iter()
        .map(|entity| {
            let (slug, updated_at) = entity.sync_key();
            let payload = serde_json::to_value(&entity).map_err(|e| DbError::Internal(
                format!("serializing sync row {slug}: {e}"),
            ))?;
            Ok(SyncRow {
                slug,
                updated_at,
                payload,
            })
        })
        .collect()
}

fn to_payload<T: Serialize>(entity: &T, kind: EntityKind) -> DbResult<serde_json::Value> {
    serde_json::to_value(entity).map_err(|e| DbError::Internal(format!(
        "serializing {} payload: {e}",
        kind.as_str()
    )))
}

fn from_payload<T: DeserializeOwned>(
    payload: &serde_json::Value,
    kind: EntityKind,
) -> DbResult<T> {
    serde_json::from_value(payload.clone()).map_err(|e| DbError::MalformedPayload {
        entity: kind.as_str().to_string(),
        message: e.to_string(),
    })
}
