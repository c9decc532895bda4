//! # Collaborator Services
//!
//! The seams between the pricing/reconciliation flows and the outside world.
//!
//! ## Implementations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Trait                  HTTP (frappe.rs)      Local (local.rs)          │
//! │  ─────────────────────  ───────────────────   ───────────────────────   │
//! │  CatalogService         FrappeClient          LocalCatalog (SQLite)     │
//! │  DiscountService        FrappeClient          LocalDiscount (pure)      │
//! │  SalesInvoiceService    FrappeClient          LocalLedger (SQLite)      │
//! │  OfflineInvoiceStore    -                     LocalOfflineStore         │
//! │  SubmissionLocks        -                     LocalLocks                │
//! │  Notifier               -                     TracingNotifier           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every async method is an await point for the caller. None of them retry.

use async_trait::async_trait;
use std::time::Duration;
use tracing::{error, info, warn};

use gpos_core::{
    DiscountInput, Indicator, Money, Notice, OfflineInvoiceRecord, PendingCursor,
    SalesInvoicePayload,
};

use crate::error::SyncResult;

// =============================================================================
// Catalog
// =============================================================================

/// Item units, prices and valuation.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Units of measure configured on the item, stock unit first.
    async fn item_uoms(&self, item_code: &str) -> SyncResult<Vec<String>>;

    /// Price of the item on a price list. `None` is a miss, not an error.
    async fn item_price(
        &self,
        item_code: &str,
        price_list: &str,
        uom: Option<&str>,
    ) -> SyncResult<Option<Money>>;

    /// Valuation (cost) rate of the item. `None` is a miss, not an error.
    async fn valuation_rate(&self, item_code: &str, uom: Option<&str>) -> SyncResult<Option<Money>>;
}

// =============================================================================
// Discount
// =============================================================================

#[async_trait]
pub trait DiscountService: Send + Sync {
    /// Price after applying the input's discount rule.
    async fn price_after_discount(&self, input: &DiscountInput) -> SyncResult<Money>;
}

// =============================================================================
// Sales Invoices (system of record)
// =============================================================================

/// Result of asking the system of record to create an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome {
    Created(String),
    /// The offline number was already taken; the existing invoice's name.
    Duplicate(String),
}

impl CreateOutcome {
    pub fn name(&self) -> &str {
        match self {
            CreateOutcome::Created(name) | CreateOutcome::Duplicate(name) => name,
        }
    }
}

#[async_trait]
pub trait SalesInvoiceService: Send + Sync {
    /// Name of the Sales Invoice carrying this offline number, if any.
    async fn find_by_offline_number(&self, offline_number: &str) -> SyncResult<Option<String>>;

    /// Creates the invoice.
    ///
    /// Implementations must make this a conditional insert keyed by the
    /// offline number, answering `Duplicate` instead of creating a second
    /// invoice.
    async fn create_invoice(
        &self,
        offline_number: &str,
        payload: &SalesInvoicePayload,
    ) -> SyncResult<CreateOutcome>;
}

// =============================================================================
// Offline Invoice Store
// =============================================================================

#[async_trait]
pub trait OfflineInvoiceStore: Send + Sync {
    async fn get(&self, name: &str) -> SyncResult<Option<OfflineInvoiceRecord>>;

    /// Sets `custom_manually_submitted` and `clearing_status` together.
    async fn mark_submitted(&self, name: &str) -> SyncResult<()>;

    async fn insert(&self, record: &OfflineInvoiceRecord) -> SyncResult<()>;

    /// Uncleared records after `after`, oldest capture first.
    async fn pending(
        &self,
        after: Option<&PendingCursor>,
        limit: u32,
    ) -> SyncResult<Vec<OfflineInvoiceRecord>>;

    /// Keeps the last ERP answer on the record. Flags are untouched.
    async fn record_api_response(&self, name: &str, response: &str) -> SyncResult<()>;
}

// =============================================================================
// Submission Locks
// =============================================================================

/// Per-offline-number mutual exclusion between submitters.
#[async_trait]
pub trait SubmissionLocks: Send + Sync {
    /// Returns `false` when another holder has a live lock.
    async fn try_lock(&self, offline_number: &str, holder: &str, ttl: Duration) -> SyncResult<bool>;

    async fn unlock(&self, offline_number: &str, holder: &str) -> SyncResult<()>;
}

// =============================================================================
// Notifier
// =============================================================================

/// Shows notices to the operator.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Writes notices to the log. Used by the headless binaries.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        let title = notice.title.as_deref().unwrap_or("");
        match notice.indicator {
            Indicator::Red => error!(title, message = %notice.message, "Notice"),
            Indicator::Orange => warn!(title, message = %notice.message, "Notice"),
            Indicator::Blue | Indicator::Green => info!(title, message = %notice.message, "Notice"),
        }
    }
}
