//! # Reference Entity Repositories
//!
//! Warehouses, product categories and quantity units share one shape:
//! slug + name rows that other entities point at. They sync FIRST so the
//! rows that reference them always find them on the server.
//!
//! One macro generates the three repositories; the tables differ only by
//! name.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::DbResult;
use bahi_core::{ProductCategory, QuantityUnit, SyncStatus, Warehouse};

macro_rules! named_entity_repository {
    ($repo:ident, $entity:ty, $table:literal, $label:literal) => {
        #[doc = concat!("Repository for ", $label, " database operations.")]
        #[derive(Debug, Clone)]
        pub struct $repo {
            pool: SqlitePool,
        }

        impl $repo {
            #[doc = concat!("Creates a new ", stringify!($repo), ".")]
            pub fn new(pool: SqlitePool) -> Self {
                $repo { pool }
            }

            /// Inserts a locally created row (always dirty).
            pub async fn insert(&self, entity: &$entity) -> DbResult<i64> {
                debug!(slug = %entity.slug, name = %entity.name, concat!("Inserting ", $label));

                let result = sqlx::query(concat!(
                    "INSERT INTO ",
                    $table,
                    " (slug, business_slug, name, sync_status, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?)"
                ))
                .bind(&entity.slug)
                .bind(&entity.business_slug)
                .bind(&entity.name)
                .bind(SyncStatus::Dirty)
                .bind(entity.created_at)
                .bind(entity.updated_at)
                .execute(&self.pool)
                .await?;

                Ok(result.last_insert_rowid())
            }

            /// Gets a row by slug.
            pub async fn get_by_slug(&self, slug: &str) -> DbResult<Option<$entity>> {
                let entity = sqlx::query_as::<_, $entity>(concat!(
                    "SELECT * FROM ",
                    $table,
                    " WHERE slug = ?"
                ))
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
                Ok(entity)
            }

            /// Lists all rows for a business.
            pub async fn list(&self, business_slug: &str) -> DbResult<Vec<$entity>> {
                let entities = sqlx::query_as::<_, $entity>(concat!(
                    "SELECT * FROM ",
                    $table,
                    " WHERE business_slug = ? ORDER BY name"
                ))
                .bind(business_slug)
                .fetch_all(&self.pool)
                .await?;
                Ok(entities)
            }

            /// Lists rows awaiting push.
            pub async fn list_dirty(&self, business_slug: &str) -> DbResult<Vec<$entity>> {
                let entities = sqlx::query_as::<_, $entity>(concat!(
                    "SELECT * FROM ",
                    $table,
                    " WHERE business_slug = ? AND sync_status = ? ORDER BY id"
                ))
                .bind(business_slug)
                .bind(SyncStatus::Dirty)
                .fetch_all(&self.pool)
                .await?;
                Ok(entities)
            }

            /// Marks a pushed row as synced if not edited since push time.
            pub async fn mark_synced(
                &self,
                slug: &str,
                pushed_at: DateTime<Utc>,
            ) -> DbResult<bool> {
                let result = sqlx::query(concat!(
                    "UPDATE ",
                    $table,
                    " SET sync_status = ? WHERE slug = ? AND updated_at = ?"
                ))
                .bind(SyncStatus::Synced)
                .bind(slug)
                .bind(pushed_at)
                .execute(&self.pool)
                .await?;
                Ok(result.rows_affected() > 0)
            }

            /// Upserts a row pulled from the server (remote is authoritative).
            pub async fn upsert_remote(&self, entity: &$entity) -> DbResult<()> {
                sqlx::query(concat!(
                    "INSERT INTO ",
                    $table,
                    " (slug, business_slug, name, sync_status, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?) \
                     ON CONFLICT(slug) DO UPDATE SET \
                        business_slug = excluded.business_slug, \
                        name = excluded.name, \
                        sync_status = excluded.sync_status, \
                        created_at = excluded.created_at, \
                        updated_at = excluded.updated_at"
                ))
                .bind(&entity.slug)
                .bind(&entity.business_slug)
                .bind(&entity.name)
                .bind(SyncStatus::Synced)
                .bind(entity.created_at)
                .bind(entity.updated_at)
                .execute(&self.pool)
                .await?;
                Ok(())
            }

            /// Deletes a row by slug (tombstone application).
            pub async fn delete_by_slug(&self, slug: &str) -> DbResult<bool> {
                let result =
                    sqlx::query(concat!("DELETE FROM ", $table, " WHERE slug = ?"))
                        .bind(slug)
                        .execute(&self.pool)
                        .await?;
                Ok(result.rows_affected() > 0)
            }
        }
    };
}

named_entity_repository!(WarehouseRepository, Warehouse, "warehouses", "warehouse");
named_entity_repository!(
    CategoryRepository,
    ProductCategory,
    "categories",
    "product category"
);
named_entity_repository!(
    QuantityUnitRepository,
    QuantityUnit,
    "quantity_units",
    "quantity unit"
);
