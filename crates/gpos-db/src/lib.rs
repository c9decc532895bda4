//! # gpos-db: Database Layer for gpos
//!
//! Local SQLite storage for the promotion pricing and offline invoice
//! reconciliation flows, through sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          gpos Data Flow                                 │
//! │                                                                         │
//! │  RowReactor / InvoiceSubmitter (gpos-sync)                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     gpos-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌─────────────────┐    ┌──────────────┐ │   │
//! │  │   │   Database    │    │  Repositories   │    │  Migrations  │ │   │
//! │  │   │   (pool.rs)   │    │ catalog         │    │  (embedded)  │ │   │
//! │  │   │               │◄───│ offline_invoice │    │ 001_initial  │ │   │
//! │  │   │  SqlitePool   │    │ sales_invoice   │    │              │ │   │
//! │  │   │               │    │ lock            │    │              │ │   │
//! │  │   └───────────────┘    └─────────────────┘    └──────────────┘ │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database (gpos.db, WAL)                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use gpos_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("gpos.db")).await?;
//! let pending = db.offline_invoices().pending(None, 50).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use migrations::SchemaStatus;
pub use pool::{Database, DbConfig};

pub use repository::catalog::CatalogRepository;
pub use repository::lock::SubmissionLockRepository;
pub use repository::offline_invoice::OfflineInvoiceRepository;
pub use repository::sales_invoice::{LedgerEntry, LedgerInsert, SalesInvoiceRepository};
