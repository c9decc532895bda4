//! # Error Types
//!
//! Domain-specific error types for gpos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  gpos-core errors (this file)                                          │
//! │  ├── CoreError        - Pricing / discount rule violations             │
//! │  └── ValidationError  - Input and payload validation failures          │
//! │                                                                         │
//! │  gpos-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  gpos-sync errors (separate crate)                                     │
//! │  └── SyncError        - ERP transport, config, orchestration           │
//! │                                                                         │
//! │  Flow: CoreError / ValidationError → SyncError → Notice (operator)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. The `Display` text of a validation error IS the operator-facing message
//! 3. Errors are enum variants, never String

use thiserror::Error;

use crate::money::Money;
use crate::types::RowId;

// =============================================================================
// Core Error
// =============================================================================

/// Pricing and discount rule violations.
///
/// Every variant halts the triggering edit without touching row state.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No price list is selected on the promotion.
    ///
    /// ## User Workflow
    /// ```text
    /// Pick item "COKE-330"
    ///      │
    ///      ▼
    /// promotion.price_list == None
    ///      │
    ///      ▼
    /// MissingPriceList ──► "Missing Price List" notice, no catalog call
    /// ```
    #[error("Please set a Price List before selecting an item.")]
    MissingPriceList,

    /// Discount requested while the row has no usable sale price.
    #[error("Cannot apply discount when Sale Price is 0.")]
    ZeroSalePrice,

    /// Discount would push the price below zero.
    #[error("Discount exceeds the Sale Price of {sale_price} (result would be {result}).")]
    DiscountExceedsPrice { sale_price: Money, result: Money },

    /// Row id is not part of the promotion's item table.
    #[error("Row {0} not found in item table")]
    RowNotFound(RowId),
}

impl CoreError {
    /// Title used when this error is shown to the operator.
    pub fn title(&self) -> &'static str {
        match self {
            CoreError::MissingPriceList => "Missing Price List",
            CoreError::ZeroSalePrice | CoreError::DiscountExceedsPrice { .. } => "Invalid Discount",
            CoreError::RowNotFound(_) => "Item Table",
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// Raised before any remote call is made.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The offline record carries no payload.
    #[error("JSON Dump is empty!")]
    EmptyJsonDump,

    /// The payload is not a JSON object.
    #[error("Invalid JSON format in JSON Dump.")]
    InvalidJson { reason: String },

    /// The offline record has no idempotency key.
    #[error("Offline Invoice Number missing.")]
    MissingInvoiceNumber,

    /// The payload names a different offline invoice than its record.
    #[error("Offline Invoice Number mismatch: record has '{record}', JSON Dump has '{payload}'.")]
    InvoiceNumberMismatch { record: String, payload: String },

    /// Invalid format (e.g. a non-decimal amount).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },
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
    fn test_operator_messages() {
        assert_eq!(
            CoreError::MissingPriceList.to_string(),
            "Please set a Price List before selecting an item."
        );
        assert_eq!(
            CoreError::ZeroSalePrice.to_string(),
            "Cannot apply discount when Sale Price is 0."
        );
        assert_eq!(ValidationError::EmptyJsonDump.to_string(), "JSON Dump is empty!");
        assert_eq!(
            ValidationError::InvalidJson {
                reason: "EOF".into()
            }
            .to_string(),
            "Invalid JSON format in JSON Dump."
        );
        assert_eq!(
            ValidationError::MissingInvoiceNumber.to_string(),
            "Offline Invoice Number missing."
        );
    }

    #[test]
    fn test_titles() {
        assert_eq!(CoreError::MissingPriceList.title(), "Missing Price List");
        assert_eq!(CoreError::ZeroSalePrice.title(), "Invalid Discount");
    }
}
