//! # Bahi Core
//!
//! Pure business logic for the Bahi bookkeeping and inventory engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          bahi-core                                  │
//! │                                                                     │
//! │  taxonomy    - Transaction kinds, stable codes, the ONE effect      │
//! │                lookup table, reversal substitution                  │
//! │  types       - Entities, slugs, sync status, entity kinds           │
//! │  totals      - Grand total / subtotal / profit arithmetic           │
//! │  effects     - Effect calculator, stock check, average price        │
//! │  validation  - Structural checks per transaction kind               │
//! │  error       - CoreError / ValidationError                          │
//! │                                                                     │
//! │  No I/O. Every function is a deterministic map from inputs to       │
//! │  deltas, verdicts or errors. Storage application lives in bahi-db.  │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use bahi_core::{effects_of, ensure_valid, ProductFlagMap, Transaction, TransactionType};
//!
//! let mut tx = Transaction::new("BIZ1", TransactionType::Sale);
//! tx.party_slug = Some("PARTY1".into());
//! tx.to_payment_method_slug = Some("CASH".into());
//! tx.grand_total = 100.0;
//! tx.total_paid = 60.0;
//!
//! ensure_valid(&tx).unwrap();
//! let effects = effects_of(&tx, &ProductFlagMap::new());
//! assert_eq!(effects.party_deltas["PARTY1"], -40.0);
//! assert_eq!(effects.cash_deltas["CASH"], 60.0);
//! ```

pub mod effects;
pub mod error;
pub mod taxonomy;
pub mod totals;
pub mod types;
pub mod validation;

// Re-export the main API surface at the crate root.
pub use effects::{
    effects_of, net_effects, recompute_avg_price, reversal_effects, LedgerEffects,
    PriceAdjustment, ProductFlagMap, ProductFlags, StockLevelMap,
};
pub use error::{CoreError, CoreResult, ValidationError};
pub use taxonomy::{Category, EffectProfile, PriceUpdate, TransactionType};
pub use totals::{discount_amount, grand_total, line_profit, round_to_2, subtotal, tax_amount};
pub use types::{
    new_slug, AmountMode, DeletedRecord, EntityKind, Party, PartyRole, PaymentMethod, Product,
    ProductCategory, ProductStock, QuantityUnit, SyncStatus, Transaction, TransactionDetail,
    Warehouse,
};
pub use validation::ensure_valid;
