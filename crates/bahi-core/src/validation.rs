//! # Transaction Validation
//!
//! Structural checks that run before any effect is computed.
//!
//! Validation only rejects transactions that are incomplete for their kind
//! (missing party, missing warehouse, negative amounts). Business-rule
//! rejection (insufficient stock) happens later, against live stock levels.

use crate::error::{CoreResult, ValidationError};
use crate::taxonomy::TransactionType;
use crate::types::Transaction;

/// Validates a transaction against the requirements of its kind.
///
/// Runs the same way for fresh commits and for the replacement header of an
/// update. Children of composite transactions pass through here
/// individually as well.
pub fn ensure_valid(tx: &Transaction) -> CoreResult<()> {
    let profile = tx.transaction_type.profile();

    if tx.business_slug.is_empty() {
        return Err(ValidationError::Required {
            field: "business_slug",
        }
        .into());
    }

    // Children of a composite transaction (manufacture, journal voucher)
    // are internal legs; they carry no counterparty of their own.
    let is_composite_child = tx.parent_slug.is_some();

    if profile.requires_party && !is_composite_child && slug_missing(&tx.party_slug) {
        return Err(ValidationError::RequiredForType {
            field: "party",
            type_name: tx.transaction_type.display_name(),
        }
        .into());
    }

    for (value, field) in [
        (tx.total_paid, "total_paid"),
        (tx.discount, "discount"),
        (tx.tax, "tax"),
        (tx.additional_charges, "additional_charges"),
        (tx.grand_total, "grand_total"),
    ] {
        if value < 0.0 {
            return Err(ValidationError::Negative { field }.into());
        }
    }

    // A paid amount must name the method it moves through.
    if profile.cash_sign != 0.0 && tx.total_paid > 0.0 && slug_missing(&tx.to_payment_method_slug)
    {
        return Err(ValidationError::RequiredForType {
            field: "payment method",
            type_name: tx.transaction_type.display_name(),
        }
        .into());
    }

    if tx.transaction_type == TransactionType::PaymentTransfer
        && slug_missing(&tx.from_payment_method_slug)
    {
        return Err(ValidationError::RequiredForType {
            field: "source payment method",
            type_name: tx.transaction_type.display_name(),
        }
        .into());
    }

    if profile.affects_stock && !tx.details.is_empty() && slug_missing(&tx.warehouse_slug) {
        return Err(ValidationError::RequiredForType {
            field: "warehouse",
            type_name: tx.transaction_type.display_name(),
        }
        .into());
    }

    if tx.transaction_type == TransactionType::StockTransfer
        && slug_missing(&tx.to_warehouse_slug)
    {
        return Err(ValidationError::RequiredForType {
            field: "destination warehouse",
            type_name: tx.transaction_type.display_name(),
        }
        .into());
    }

    for detail in &tx.details {
        if detail.quantity <= 0.0 {
            return Err(ValidationError::NonPositiveQuantity {
                product_slug: detail.product_slug.clone(),
            }
            .into());
        }
        if detail.unit_price < 0.0 {
            return Err(ValidationError::Negative { field: "unit_price" }.into());
        }
    }

    Ok(())
}

fn slug_missing(slug: &Option<String>) -> bool {
    slug.as_deref().map_or(true, str::is_empty)
}

// =============================================================================
// Unit Tests
// =============================================================================
