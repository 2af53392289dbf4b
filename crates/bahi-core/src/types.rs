//! # Domain Types
//!
//! Entity definitions shared across the workspace.
//!
//! ## Entity Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                       Every Syncable Entity                         │
//! │                                                                     │
//! │  id            - Local autoincrement key. NEVER leaves the device.  │
//! │  slug          - Business-scoped identity. THE sync key.            │
//! │  business_slug - Owning business.                                   │
//! │  sync_status   - Dirty (0) until the server acknowledges, then      │
//! │                  Synced (1). Any local mutation resets to Dirty.    │
//! │  created_at /  - UTC timestamps; updated_at doubles as the          │
//! │  updated_at      push-acknowledgement guard.                        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Slugs are generated locally (UUID-derived) so entities can be created
//! fully offline with no id coordination.
//!
//! Monetary and stock amounts are `f64`. Running balances are maintained by
//! additive deltas, so the representation only needs addition to be
//! associative and commutative, which it is for the magnitudes involved.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::taxonomy::TransactionType;

// =============================================================================
// Slug Generation
// =============================================================================

/// Generates a new business-scoped slug.
///
/// 8 uppercase hex characters from a v4 UUID. Uniqueness is per business,
/// not global, so the short form is plenty.
pub fn new_slug() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_uppercase()
}

// =============================================================================
// Sync Status
// =============================================================================

/// Whether a row has been acknowledged by the server.
///
/// Stored as an integer so `sync_status = 0` scans stay index-friendly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i64)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Local changes not yet acknowledged by the server.
    Dirty = 0,
    /// Server holds this exact revision.
    Synced = 1,
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Dirty
    }
}

// =============================================================================
// Entity Kind
// =============================================================================

/// The syncable entity kinds, one per table.
///
/// [`EntityKind::PUSH_ORDER`] fixes the push sequence so referenced rows
/// always land on the server before the rows that point at them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Category,
    QuantityUnit,
    Warehouse,
    PaymentMethod,
    Product,
    Party,
    Transaction,
    ProductStock,
    DeletedRecord,
}

impl EntityKind {
    /// Dependency-safe push order. Referenced kinds before referencing ones;
    /// tombstones last so a delete never races its own entity's upsert.
    pub const PUSH_ORDER: [EntityKind; 9] = [
        EntityKind::Category,
        EntityKind::QuantityUnit,
        EntityKind::Warehouse,
        EntityKind::PaymentMethod,
        EntityKind::Product,
        EntityKind::Party,
        EntityKind::Transaction,
        EntityKind::ProductStock,
        EntityKind::DeletedRecord,
    ];

    /// Stable wire/storage name.
    pub const fn as_str(self) -> &'static str {
        match self {
            EntityKind::Category => "category",
            EntityKind::QuantityUnit => "quantity_unit",
            EntityKind::Warehouse => "warehouse",
            EntityKind::PaymentMethod => "payment_method",
            EntityKind::Product => "product",
            EntityKind::Party => "party",
            EntityKind::Transaction => "transaction",
            EntityKind::ProductStock => "product_stock",
            EntityKind::DeletedRecord => "deleted_record",
        }
    }

    /// Human-readable label for progress reporting.
    pub const fn display_name(self) -> &'static str {
        match self {
            EntityKind::Category => "Categories",
            EntityKind::QuantityUnit => "Quantity Units",
            EntityKind::Warehouse => "Warehouses",
            EntityKind::PaymentMethod => "Payment Methods",
            EntityKind::Product => "Products",
            EntityKind::Party => "Parties",
            EntityKind::Transaction => "Transactions",
            EntityKind::ProductStock => "Product Stocks",
            EntityKind::DeletedRecord => "Deleted Records",
        }
    }
}

// =============================================================================
// Party
// =============================================================================

/// How a party relates to the business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Customer,
    Vendor,
    Investor,
}

/// A customer, vendor or investor with a signed running balance.
///
/// Balance sign convention: positive means the business owes the party,
/// negative means the party owes the business.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Party {
    pub id: i64,
    pub slug: String,
    pub business_slug: String,
    pub name: String,
    pub phone: Option<String>,
    pub role: PartyRole,
    pub opening_balance: f64,
    /// Running balance. Only the ledger engine writes this.
    pub balance: f64,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Party {
    pub fn new(business_slug: impl Into<String>, name: impl Into<String>, role: PartyRole) -> Self {
        let now = Utc::now();
        Party {
            id: 0,
            slug: new_slug(),
            business_slug: business_slug.into(),
            name: name.into(),
            phone: None,
            role,
            opening_balance: 0.0,
            balance: 0.0,
            sync_status: SyncStatus::Dirty,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// A cash drawer, bank account or wallet with a running amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentMethod {
    pub id: i64,
    pub slug: String,
    pub business_slug: String,
    pub name: String,
    pub opening_amount: f64,
    /// Running amount. Only the ledger engine writes this.
    pub amount: f64,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentMethod {
    pub fn new(business_slug: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        PaymentMethod {
            id: 0,
            slug: new_slug(),
            business_slug: business_slug.into(),
            name: name.into(),
            opening_amount: 0.0,
            amount: 0.0,
            sync_status: SyncStatus::Dirty,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A sellable item or service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub slug: String,
    pub business_slug: String,
    pub name: String,
    pub sale_price: f64,
    pub purchase_price: f64,
    /// Weighted average of purchase prices. Only the ledger engine writes
    /// this, under the global commit lock.
    pub avg_purchase_price: f64,
    /// Services have no stock; every stock effect skips them.
    pub is_service: bool,
    /// Recipe products gain stock only when manufactured (Purchase category).
    pub is_recipe: bool,
    pub category_slug: Option<String>,
    pub quantity_unit_slug: Option<String>,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(business_slug: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Product {
            id: 0,
            slug: new_slug(),
            business_slug: business_slug.into(),
            name: name.into(),
            sale_price: 0.0,
            purchase_price: 0.0,
            avg_purchase_price: 0.0,
            is_service: false,
            is_recipe: false,
            category_slug: None,
            quantity_unit_slug: None,
            sync_status: SyncStatus::Dirty,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Product Stock
// =============================================================================

/// Per-warehouse stock level for one product.
///
/// Rows are created lazily by the ledger engine the first time a
/// (product, warehouse) pair is touched. A missing row means quantity 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductStock {
    pub id: i64,
    pub slug: String,
    pub business_slug: String,
    pub product_slug: String,
    pub warehouse_slug: String,
    pub opening_quantity: f64,
    /// Running quantity. Only the ledger engine writes this. The stock
    /// validator guarantees it never goes below zero.
    pub current_quantity: f64,
    pub minimum_quantity: f64,
    pub maximum_quantity: f64,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Reference Entities
// =============================================================================

/// A named warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Warehouse {
    pub id: i64,
    pub slug: String,
    pub business_slug: String,
    pub name: String,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A product category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct ProductCategory {
    pub id: i64,
    pub slug: String,
    pub business_slug: String,
    pub name: String,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A unit of measure (piece, kg, litre).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct QuantityUnit {
    pub id: i64,
    pub slug: String,
    pub business_slug: String,
    pub name: String,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

macro_rules! impl_named_entity_new {
    ($($ty:ident),+) => {$(
        impl $ty {
            pub fn new(business_slug: impl Into<String>, name: impl Into<String>) -> Self {
                let now = Utc::now();
                $ty {
                    id: 0,
                    slug: new_slug(),
                    business_slug: business_slug.into(),
                    name: name.into(),
                    sync_status: SyncStatus::Dirty,
                    created_at: now,
                    updated_at: now,
                }
            }
        }
    )+};
}

impl_named_entity_new!(Warehouse, ProductCategory, QuantityUnit);

// =============================================================================
// Amount Mode
// =============================================================================

/// Whether a discount or tax value is a flat amount or a percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[repr(i64)]
#[serde(rename_all = "snake_case")]
pub enum AmountMode {
    Flat = 0,
    Percent = 1,
}

impl Default for AmountMode {
    fn default() -> Self {
        AmountMode::Flat
    }
}

// =============================================================================
// Transaction
// =============================================================================

/// A transaction header with its embedded line items.
///
/// ## Update Semantics
/// Details are replaced wholesale on update: the engine deletes every
/// existing detail row and reinserts the new list. There is no per-line
/// diffing, which keeps edit semantics equivalent to reverse-then-apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Transaction {
    pub id: i64,
    pub slug: String,
    pub business_slug: String,
    pub transaction_type: TransactionType,
    /// Required when the profile says so; checked by validation.
    pub party_slug: Option<String>,
    /// The payment method money moves into (or out of, for outflows).
    pub to_payment_method_slug: Option<String>,
    /// Source method for Payment Transfer only.
    pub from_payment_method_slug: Option<String>,
    /// The warehouse stock moves in. Required for stock-affecting kinds.
    pub warehouse_slug: Option<String>,
    /// Destination warehouse for Stock Transfer only.
    pub to_warehouse_slug: Option<String>,
    /// Links composite children (Manufacture, Journal Voucher) to their
    /// effect-free parent.
    pub parent_slug: Option<String>,
    pub total_paid: f64,
    pub discount: f64,
    pub discount_mode: AmountMode,
    pub tax: f64,
    pub tax_mode: AmountMode,
    pub additional_charges: f64,
    /// Derived by [`crate::totals::grand_total`]; persisted for queries.
    pub grand_total: f64,
    pub description: Option<String>,
    pub transaction_date: DateTime<Utc>,
    pub sync_status: SyncStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Line items. Loaded separately; never a column.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    #[serde(default)]
    pub details: Vec<TransactionDetail>,
}

impl Transaction {
    pub fn new(business_slug: impl Into<String>, transaction_type: TransactionType) -> Self {
        let now = Utc::now();
        Transaction {
            id: 0,
            slug: new_slug(),
            business_slug: business_slug.into(),
            transaction_type,
            party_slug: None,
            to_payment_method_slug: None,
            from_payment_method_slug: None,
            warehouse_slug: None,
            to_warehouse_slug: None,
            parent_slug: None,
            total_paid: 0.0,
            discount: 0.0,
            discount_mode: AmountMode::Flat,
            tax: 0.0,
            tax_mode: AmountMode::Flat,
            additional_charges: 0.0,
            grand_total: 0.0,
            description: None,
            transaction_date: now,
            sync_status: SyncStatus::Dirty,
            created_at: now,
            updated_at: now,
            details: Vec::new(),
        }
    }
}

// =============================================================================
// Transaction Detail
// =============================================================================

/// One line item of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct TransactionDetail {
    pub id: i64,
    pub slug: String,
    pub business_slug: String,
    pub transaction_slug: String,
    pub product_slug: String,
    pub quantity: f64,
    pub unit_price: f64,
    /// Flat per-line tax amount.
    pub tax: f64,
    /// Flat per-line discount amount.
    pub discount: f64,
    /// `(unit_price − avg_purchase_price) × quantity` for sales, negated
    /// for customer returns, zero otherwise. Set by the engine at commit.
    pub profit: f64,
    pub quantity_unit_slug: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionDetail {
    pub fn new(
        business_slug: impl Into<String>,
        transaction_slug: impl Into<String>,
        product_slug: impl Into<String>,
        quantity: f64,
        unit_price: f64,
    ) -> Self {
        let now = Utc::now();
        TransactionDetail {
            id: 0,
            slug: new_slug(),
            business_slug: business_slug.into(),
            transaction_slug: transaction_slug.into(),
            product_slug: product_slug.into(),
            quantity,
            unit_price,
            tax: 0.0,
            discount: 0.0,
            profit: 0.0,
            quantity_unit_slug: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Deleted Record (Tombstone)
// =============================================================================

/// Append-only deletion marker, pushed so other devices drop the row too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DeletedRecord {
    pub id: i64,
    pub business_slug: String,
    pub entity_kind: EntityKind,
    pub record_slug: String,
    pub deleted_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
}

impl DeletedRecord {
    pub fn new(
        business_slug: impl Into<String>,
        entity_kind: EntityKind,
        record_slug: impl Into<String>,
    ) -> Self {
        DeletedRecord {
            id: 0,
            business_slug: business_slug.into(),
            entity_kind,
            record_slug: record_slug.into(),
            deleted_at: Utc::now(),
            sync_status: SyncStatus::Dirty,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
