//! # gpos-sync: Pricing Orchestration & Invoice Reconciliation for gpos
//!
//! Async layer between the promotion form, the offline invoice view and the
//! ERP that holds catalog prices and Sales Invoices.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         gpos Sync Layer                                 │
//! │                                                                         │
//! │  Promotion form edits                Offline invoice view / reconcile   │
//! │         │                                        │                      │
//! │         ▼                                        ▼                      │
//! │  ┌────────────────┐                   ┌────────────────────────────┐    │
//! │  │   RowReactor   │                   │     InvoiceSubmitter       │    │
//! │  │                │                   │                            │    │
//! │  │ item → uom →   │                   │ local checks → lock →      │    │
//! │  │ discount chain │                   │ dedup → create → mark      │    │
//! │  └───────┬────────┘                   └─────────────┬──────────────┘    │
//! │          │                                          │                   │
//! │  ┌───────▼────────┐  ┌────────────────┐  ┌──────────▼─────────────┐     │
//! │  │ PriceResolver  │  │ DiscountService│  │ SalesInvoiceService    │     │
//! │  │ price ∥ cost   │  │                │  │ OfflineInvoiceStore    │     │
//! │  └───────┬────────┘  └───────┬────────┘  └──────────┬─────────────┘     │
//! │          │                   │                      │                   │
//! │          ▼                   ▼                      ▼                   │
//! │  ┌─────────────────────────────────┐  ┌─────────────────────────────┐   │
//! │  │ FrappeClient (ERP over HTTP)    │  │ Local services (gpos-db)    │   │
//! │  └─────────────────────────────────┘  └─────────────────────────────┘   │
//! │                                                                         │
//! │  NOTICES (to the operator via Notifier):                                │
//! │  • red    - halts and failures                                          │
//! │  • orange - local check failures                                        │
//! │  • blue   - already reconciled, in progress                             │
//! │  • green  - submitted                                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! ### Pricing
//! - [`reactor`] - `RowReactor`, reacts to row edits on a promotion
//! - [`pricing`] - `PriceResolver`, concurrent price and cost lookups
//!
//! ### Reconciliation
//! - [`capture`] - Records sales the till could not post
//! - [`submitter`] - `InvoiceSubmitter`, exactly-once submission
//!
//! ### Plumbing
//! - [`services`] - Collaborator traits and notifiers
//! - [`frappe`] - ERP client over the Frappe REST surface
//! - [`local`] - Collaborators backed by the local SQLite database
//! - [`config`] - Device, server and submission settings
//! - [`error`] - Sync error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use gpos_db::{Database, DbConfig};
//! use gpos_sync::{InvoiceSubmitter, SyncConfig, TracingNotifier};
//!
//! let config = SyncConfig::load_or_default(None);
//! let db = Database::new(DbConfig::new(config.database_path())).await?;
//!
//! let submitter = InvoiceSubmitter::new(
//!     Arc::new(db.offline_invoices()),
//!     Arc::new(db.sales_invoices()),
//!     Arc::new(db.locks()),
//!     Arc::new(TracingNotifier),
//!     config.device_id(),
//! );
//! let submission = submitter.submit_by_name("IU-0001").await?;
//! println!("{:?}", submission.outcome);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

// Pricing
pub mod pricing;
pub mod reactor;

// Reconciliation
pub mod capture;
pub mod submitter;

// Plumbing
pub mod config;
pub mod error;
pub mod frappe;
pub mod local;
pub mod services;

#[cfg(test)]
mod test_support;

// =============================================================================
// Re-exports
// =============================================================================

pub use capture::{CaptureRequest, OfflineInvoiceCapture};
pub use config::SyncConfig;
pub use error::{RemoteFailure, SyncError, SyncResult};
pub use frappe::FrappeClient;
pub use local::LocalDiscount;
pub use pricing::{PriceResolver, Resolution};
pub use reactor::RowReactor;
pub use services::{
    CatalogService, CreateOutcome, DiscountService, Notifier, OfflineInvoiceStore,
    SalesInvoiceService, SubmissionLocks, TracingNotifier,
};
pub use submitter::{InvoiceSubmitter, ReconcileSummary, SubmitOutcome, Submission};
