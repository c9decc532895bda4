//! # Repository Module
//!
//! Database repository implementations for gpos.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  gpos-sync service                                                     │
//! │       │                                                                 │
//! │       │  db.offline_invoices().mark_submitted("IU-0001")               │
//! │       ▼                                                                 │
//! │  OfflineInvoiceRepository                                              │
//! │  ├── insert / get / pending                                            │
//! │  └── mark_submitted                                                    │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`CatalogRepository`](catalog::CatalogRepository) - Units, prices, valuation rates
//! - [`OfflineInvoiceRepository`](offline_invoice::OfflineInvoiceRepository) - Invoice Unsynced records
//! - [`SalesInvoiceRepository`](sales_invoice::SalesInvoiceRepository) - Idempotent invoice ledger
//! - [`SubmissionLockRepository`](lock::SubmissionLockRepository) - Per-number submit locks

pub mod catalog;
pub mod lock;
pub mod offline_invoice;
pub mod sales_invoice;
