//! # gpos-core: Pure Business Logic for gpos
//!
//! Promotion pricing rules and offline-invoice preconditions as pure
//! functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           gpos Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Promotion form / Offline Invoice view              │   │
//! │  │     item_code ─► uom ─► discount_*        "Submit to Sales Inv" │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        gpos-sync: RowReactor, PriceResolver, InvoiceSubmitter   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ gpos-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │ promotion │  │ validation│  │   │
//! │  │   │  Row, Rec │  │   Money   │  │ Promotion │  │  payload  │  │   │
//! │  │   │  Notice   │  │ Percentage│  │ discount  │  │  checks   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │       gpos-db: catalog cache, offline invoices, ledger          │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (LineItemRow, OfflineInvoiceRecord, Notice, ...)
//! - [`money`] - Money type with integer arithmetic
//! - [`discount`] - Discount Calculator
//! - [`promotion`] - Promotion aggregate with revision-guarded row transitions
//! - [`validation`] - Submission preconditions
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use gpos_core::promotion::{PricingOutcome, Promotion};
//! use gpos_core::{DiscountType, Money, Percentage};
//!
//! let mut promo = Promotion::new(Some("Standard Selling".into()));
//! let row = promo.add_row();
//!
//! let lookup = promo.set_item_code(row, Some("COKE-330".into())).unwrap().unwrap();
//! // ... run the catalog lookup, then bring the result back:
//! let outcome = promo.apply_pricing(row, lookup.revision, Some(Money::from_major(100))).unwrap();
//! assert!(matches!(outcome, PricingOutcome::Applied { .. }));
//!
//! promo.set_discount_type(row, DiscountType::Percentage).unwrap();
//! let req = promo.set_discount_percentage(row, Percentage::from_whole(10)).unwrap();
//! let price = gpos_core::discount::compute(&req.input).unwrap();
//! assert_eq!(price, Money::from_major(90));
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod discount;
pub mod error;
pub mod money;
pub mod promotion;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use discount::DiscountInput;
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use promotion::{DiscountRequest, PricingOutcome, PricingRequest, Promotion};
pub use types::*;
pub use validation::ValidatedSubmission;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Doctype of the records this crate reconciles into.
pub const SALES_INVOICE_DOCTYPE: &str = "Sales Invoice";

/// Doctype of locally captured offline invoices.
pub const OFFLINE_INVOICE_DOCTYPE: &str = "Invoice Unsynced";

/// Field on the Sales Invoice that carries the offline idempotency key.
pub const OFFLINE_NUMBER_FIELD: &str = "custom_offline_invoice_number";
