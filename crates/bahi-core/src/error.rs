//! # Error Types
//!
//! Domain-specific error types for bahi-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                          Error Types                                │
//! │                                                                     │
//! │  bahi-core errors (this file)                                       │
//! │  ├── CoreError        - Business rule violations                    │
//! │  └── ValidationError  - Missing/invalid fields, caught early        │
//! │                                                                     │
//! │  bahi-db errors (separate crate)                                    │
//! │  └── DbError          - Storage failures (hard aborts)              │
//! │                                                                     │
//! │  bahi-sync errors (separate crate)                                  │
//! │  └── SyncError        - Transport / reconciliation failures         │
//! │                                                                     │
//! │  Flow: ValidationError → CoreError → caller renders typed result    │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (slug, quantities, etc.)
//! 3. Errors are enum variants, never String
//! 4. Expected business failures (insufficient stock) are values a caller
//!    can match on without a generic "unknown error" fallback

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These represent business rule violations. They abort the whole commit
/// before any state is written and are rendered directly to the user.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A transaction type code that is not in the taxonomy.
    ///
    /// ## When This Occurs
    /// - A remote row carries a code from a newer app version
    /// - A caller passes a hand-built transaction with a bad code
    ///
    /// Unknown codes are an error, never a silent no-op.
    #[error("Unknown transaction type code: {0}")]
    UnknownTransactionType(i64),

    /// Insufficient stock to commit the transaction.
    ///
    /// ## When This Occurs
    /// A stock-decreasing line would drive the persisted quantity for
    /// (product, warehouse) below zero. The whole commit is aborted and
    /// no balance changes are applied.
    #[error(
        "Insufficient stock for {product_slug}: available {available}, required {required} (short {shortfall})"
    )]
    InsufficientStock {
        product_slug: String,
        available: f64,
        required: f64,
        shortfall: f64,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur when a transaction is structurally incomplete. They are
/// surfaced before any effect calculation runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: &'static str },

    /// A required reference is missing for this transaction type.
    #[error("{field} is required for {type_name} transactions")]
    RequiredForType {
        field: &'static str,
        type_name: &'static str,
    },

    /// A numeric field must not be negative.
    #[error("{field} must not be negative")]
    Negative { field: &'static str },

    /// A line item quantity must be positive.
    #[error("line item quantity must be positive (product {product_slug})")]
    NonPositiveQuantity { product_slug: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_stock_message() {
        let err = CoreError::InsufficientStock {
            product_slug: "FLOUR-1KG".to_string(),
            available: 10.0,
            required: 11.0,
            shortfall: 1.0,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for FLOUR-1KG: available 10, required 11 (short 1)"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let err = ValidationError::Required { field: "party" };
        let core: CoreError = err.into();
        assert!(matches!(core, CoreError::Validation(_)));
    }

    #[test]
    fn test_unknown_type_message() {
        let err = CoreError::UnknownTransactionType(99);
        assert_eq!(err.to_string(), "Unknown transaction type code: 99");
    }
}
