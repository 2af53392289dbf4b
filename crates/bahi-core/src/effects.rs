//! # Effect Calculator
//!
//! Pure computation of every balance change a transaction causes.
//!
//! ## Data Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Effect Calculation                             │
//! │                                                                     │
//! │  Transaction ──► profile() ──► signs ──► LedgerEffects {            │
//! │       │                                    party_deltas,            │
//! │       │                                    cash_deltas,             │
//! │       ▼                                    stock_deltas,            │
//! │  ProductFlags (is_service,                 price_adjustments,       │
//! │  is_recipe, per line)                    }                          │
//! │                                                                     │
//! │  Reversal: substitute reverse() type (swap endpoints for the        │
//! │  symmetric kinds) and re-derive. Never ad-hoc negation.             │
//! │                                                                     │
//! │  Edit: reversal_effects(old) merged with effects_of(new) gives      │
//! │  the net change applied in ONE storage transaction.                 │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here reads or writes storage. The caller supplies product flags
//! and current stock levels; this module returns deltas and verdicts.

use std::collections::BTreeMap;

use tracing::warn;

use crate::error::{CoreError, CoreResult};
use crate::taxonomy::{PriceUpdate, TransactionType};
use crate::types::Transaction;

// =============================================================================
// Inputs
// =============================================================================

/// The two product attributes the calculator needs per line.
///
/// A product missing from the flags map is treated as a plain physical
/// product (stock-affecting everywhere).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProductFlags {
    /// Services never move stock.
    pub is_service: bool,
    /// Recipe products move stock only when produced by a Purchase
    /// (the recipe-output child of a manufacture).
    pub is_recipe: bool,
}

/// Product flags keyed by product slug.
pub type ProductFlagMap = BTreeMap<String, ProductFlags>;

/// Current stock quantities keyed by (product slug, warehouse slug).
///
/// A missing entry means quantity zero.
pub type StockLevelMap = BTreeMap<(String, String), f64>;

// =============================================================================
// Outputs
// =============================================================================

/// A pending change to one product's weighted average purchase price.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceAdjustment {
    pub product_slug: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub update: PriceUpdate,
}

/// Every balance change one (or one net pair of) transaction(s) causes.
///
/// Deltas are additive and keyed by slug, so merging two effect sets is
/// plain map addition. Price adjustments are ordered; the engine replays
/// them in sequence against the live quantity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerEffects {
    /// Party balance deltas by party slug.
    pub party_deltas: BTreeMap<String, f64>,
    /// Payment method amount deltas by method slug.
    pub cash_deltas: BTreeMap<String, f64>,
    /// Stock quantity deltas by (product slug, warehouse slug).
    pub stock_deltas: BTreeMap<(String, String), f64>,
    /// Average purchase price adjustments, in application order.
    pub price_adjustments: Vec<PriceAdjustment>,
}

impl LedgerEffects {
    pub fn is_empty(&self) -> bool {
        self.party_deltas.is_empty()
            && self.cash_deltas.is_empty()
            && self.stock_deltas.is_empty()
            && self.price_adjustments.is_empty()
    }

    /// Adds another effect set into this one (map addition).
    ///
    /// Used for edits (reversal of old + application of new) and for
    /// composite transactions whose children commit together.
    pub fn merge(&mut self, other: LedgerEffects) {
        for (slug, delta) in other.party_deltas {
            *self.party_deltas.entry(slug).or_insert(0.0) += delta;
        }
        for (slug, delta) in other.cash_deltas {
            *self.cash_deltas.entry(slug).or_insert(0.0) += delta;
        }
        for (key, delta) in other.stock_deltas {
            *self.stock_deltas.entry(key).or_insert(0.0) += delta;
        }
        self.price_adjustments.extend(other.price_adjustments);
    }

    /// Verifies no stock-decreasing leg drives a quantity below zero.
    ///
    /// Checks NET deltas, so an edit that sells 5 where 5 were already sold
    /// needs no headroom at all. Positive legs (including stock-transfer
    /// destinations) are never rejected. Nothing may be written before this
    /// passes.
    pub fn check_stock(&self, levels: &StockLevelMap) -> CoreResult<()> {
        for (key, delta) in &self.stock_deltas {
            if *delta >= 0.0 {
                continue;
            }
            let available = levels.get(key).copied().unwrap_or(0.0);
            if available + delta < 0.0 {
                return Err(CoreError::InsufficientStock {
                    product_slug: key.0.clone(),
                    available,
                    required: -delta,
                    shortfall: -(available + delta),
                });
            }
        }
        Ok(())
    }
}

// =============================================================================
// Forward Effects
// =============================================================================

/// Computes every effect of applying `tx`.
pub fn effects_of(tx: &Transaction, flags: &ProductFlagMap) -> LedgerEffects {
    let profile = tx.transaction_type.profile();
    let mut effects = LedgerEffects::default();

    // Party balance: the credit portion of the grand total.
    if profile.party_sign != 0.0 {
        if let Some(party) = &tx.party_slug {
            let delta = profile.party_sign * (tx.grand_total - tx.total_paid);
            if delta != 0.0 {
                *effects.party_deltas.entry(party.clone()).or_insert(0.0) += delta;
            }
        }
    }

    // Payment method: the paid portion.
    if profile.cash_sign != 0.0 && tx.total_paid != 0.0 {
        if let Some(to) = &tx.to_payment_method_slug {
            let delta = profile.cash_sign * tx.total_paid;
            *effects.cash_deltas.entry(to.clone()).or_insert(0.0) += delta;
            // A transfer drains the source by the same amount.
            if tx.transaction_type == TransactionType::PaymentTransfer {
                if let Some(from) = &tx.from_payment_method_slug {
                    *effects.cash_deltas.entry(from.clone()).or_insert(0.0) -= delta;
                }
            }
        }
    }

    // Stock and price adjustments, per line.
    if profile.affects_stock {
        if let Some(warehouse) = &tx.warehouse_slug {
            for detail in &tx.details {
                let f = flags.get(&detail.product_slug).copied().unwrap_or_default();
                if f.is_service {
                    continue;
                }
                if f.is_recipe && tx.transaction_type != TransactionType::Purchase {
                    continue;
                }

                let delta = profile.stock_sign * detail.quantity;
                let key = (detail.product_slug.clone(), warehouse.clone());
                *effects.stock_deltas.entry(key).or_insert(0.0) += delta;

                if tx.transaction_type == TransactionType::StockTransfer {
                    if let Some(to) = &tx.to_warehouse_slug {
                        let key = (detail.product_slug.clone(), to.clone());
                        *effects.stock_deltas.entry(key).or_insert(0.0) -= delta;
                    }
                }

                if let Some(update) = profile.price_update {
                    effects.price_adjustments.push(PriceAdjustment {
                        product_slug: detail.product_slug.clone(),
                        quantity: detail.quantity,
                        unit_price: detail.unit_price,
                        update,
                    });
                }
            }
        }
    }

    effects
}

// =============================================================================
// Reversal
// =============================================================================

/// Computes the effects of un-applying `tx`.
///
/// Re-derives through the reverse type so every rule (including the
/// average-price direction) flips consistently. The symmetric kinds
/// (Payment Transfer, Stock Transfer) keep their own type and swap their
/// from/to endpoints instead.
pub fn reversal_effects(tx: &Transaction, flags: &ProductFlagMap) -> LedgerEffects {
    let mut reversed = tx.clone();
    if tx.transaction_type.is_endpoint_symmetric() {
        std::mem::swap(
            &mut reversed.to_payment_method_slug,
            &mut reversed.from_payment_method_slug,
        );
        std::mem::swap(&mut reversed.warehouse_slug, &mut reversed.to_warehouse_slug);
    } else {
        reversed.transaction_type = tx.transaction_type.reverse();
    }
    effects_of(&reversed, flags)
}

/// The net effect of replacing `old` with `new` (or of a fresh commit when
/// `old` is `None`).
pub fn net_effects(
    old: Option<&Transaction>,
    new: &Transaction,
    flags: &ProductFlagMap,
) -> LedgerEffects {
    let mut effects = match old {
        Some(old_tx) => reversal_effects(old_tx, flags),
        None => LedgerEffects::default(),
    };
    effects.merge(effects_of(new, flags));
    effects
}

// =============================================================================
// Average Purchase Price
// =============================================================================

/// Recomputes a product's weighted average purchase price for one
/// adjustment.
///
/// Accumulate blends incoming units into the average; decumulate removes
/// units priced at `unit_price` from it. `current_qty` is the stock level
/// BEFORE the adjustment's own stock delta is applied.
///
/// Returns `None` when the computation is undefined (zero denominator) or
/// produces a non-finite value; the caller keeps the existing average.
pub fn recompute_avg_price(
    current_qty: f64,
    current_avg: f64,
    adjustment: &PriceAdjustment,
) -> Option<f64> {
    let q1 = current_qty;
    let p1 = current_avg;
    let q2 = adjustment.quantity.abs();
    let p2 = adjustment.unit_price;

    let (numerator, denominator) = match adjustment.update {
        PriceUpdate::Accumulate => (q1 * p1 + q2 * p2, q1 + q2),
        PriceUpdate::Decumulate => (q1 * p1 - q2 * p2, q1 - q2),
    };

    if denominator == 0.0 {
        warn!(
            product = %adjustment.product_slug,
            "average price recompute skipped: zero denominator"
        );
        return None;
    }
    let result = numerator / denominator;
    if !result.is_finite() {
        warn!(
            product = %adjustment.product_slug,
            "average price recompute skipped: non-finite result"
        );
        return None;
    }
    Some(result)
}

// =============================================================================
// Unit Tests
// =============================================================================
