//! # Totals Math
//!
//! Pure monetary arithmetic for transaction headers and line items.
//!
//! ## Derivation Order
//! ```text
//! line_total    = quantity × unit_price − line_discount + line_tax
//! subtotal      = Σ line_total
//! base          = subtotal + additional_charges
//! discount_amt  = flat value, or percent of base
//! tax_amt       = flat value, or percent of (base − discount_amt)
//! grand_total   = base + tax_amt − discount_amt          (rounded to 2dp)
//! ```
//!
//! The discount percent resolves against charges-inclusive subtotal; the tax
//! percent resolves against the discounted base. Flat values pass through
//! untouched.

use crate::taxonomy::TransactionType;
use crate::types::{AmountMode, Transaction, TransactionDetail};

// =============================================================================
// Rounding
// =============================================================================

/// Rounds to 2 decimal places, half away from zero.
///
/// Applied once at the end of each derivation, never between steps.
#[inline]
pub fn round_to_2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// =============================================================================
// Line and Header Totals
// =============================================================================

/// Total for one line item: `quantity × unit_price − discount + tax`.
///
/// Line discount and tax are always flat amounts.
#[inline]
pub fn line_total(detail: &TransactionDetail) -> f64 {
    detail.quantity * detail.unit_price - detail.discount + detail.tax
}

/// Sum of all line totals, rounded.
pub fn subtotal(details: &[TransactionDetail]) -> f64 {
    round_to_2(details.iter().map(line_total).sum())
}

/// Resolves a flat-or-percent value against its base.
#[inline]
fn resolve(value: f64, mode: AmountMode, base: f64) -> f64 {
    match mode {
        AmountMode::Flat => value,
        AmountMode::Percent => base * value / 100.0,
    }
}

/// The discount amount actually subtracted from the grand total.
pub fn discount_amount(tx: &Transaction) -> f64 {
    let base = subtotal(&tx.details) + tx.additional_charges;
    round_to_2(resolve(tx.discount, tx.discount_mode, base))
}

/// The tax amount actually added to the grand total.
///
/// Percent tax applies after the discount has been taken off.
pub fn tax_amount(tx: &Transaction) -> f64 {
    let base = subtotal(&tx.details) + tx.additional_charges;
    let taxable = base - discount_amount(tx);
    round_to_2(resolve(tx.tax, tx.tax_mode, taxable))
}

/// The header grand total.
///
/// `subtotal + additional_charges + tax − discount`, rounded to 2 decimals.
/// Cash-only kinds (payments, expenses) have no lines; their grand total is
/// just charges/tax/discount over a zero subtotal, and callers typically set
/// `total_paid` directly instead.
pub fn grand_total(tx: &Transaction) -> f64 {
    let base = subtotal(&tx.details) + tx.additional_charges;
    round_to_2(base + tax_amount(tx) - discount_amount(tx))
}

// =============================================================================
// Profit
// =============================================================================

/// Per-line profit stored on the detail at commit time.
///
/// `(unit_price − avg_purchase_price) × quantity` for a Sale, negated for a
/// Customer Return (the earlier profit is given back), zero for every other
/// kind.
pub fn line_profit(
    transaction_type: TransactionType,
    detail: &TransactionDetail,
    avg_purchase_price: f64,
) -> f64 {
    let margin = (detail.unit_price - avg_purchase_price) * detail.quantity;
    match transaction_type {
        TransactionType::Sale => round_to_2(margin),
        TransactionType::CustomerReturn => round_to_2(-margin),
        _ => 0.0,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
