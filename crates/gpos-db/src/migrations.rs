//! # Schema Migrations
//!
//! The gpos schema ships inside the binary; `Database::new` brings any
//! database file up to date before a repository touches it.
//!
//! ```text
//! migrations/sqlite/NNN_*.sql ──(compile time)──► MIGRATOR
//!                                                    │
//!   Database::new ──► run_migrations ────────────────┘
//!                          │
//!                          ▼
//!                     schema_status ──► every table in GPOS_TABLES present?
//! ```
//!
//! New migrations go in `migrations/sqlite/` with the next sequence number.
//! Applied files are never edited.

use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::error::DbResult;

static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations/sqlite");

/// Tables the repositories read and write.
pub const GPOS_TABLES: [&str; 6] = [
    "item_uoms",
    "item_prices",
    "item_valuations",
    "invoice_unsynced",
    "sales_invoices",
    "submission_locks",
];

/// Where a database file stands against the embedded schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaStatus {
    /// Migrations compiled into this build.
    pub embedded: usize,
    /// Migrations recorded as applied in the file.
    pub applied: usize,
    /// Entries of [`GPOS_TABLES`] the file does not have.
    pub missing_tables: Vec<&'static str>,
}

impl SchemaStatus {
    pub fn is_current(&self) -> bool {
        self.applied >= self.embedded && self.missing_tables.is_empty()
    }
}

/// Applies every embedded migration the database has not seen yet.
pub async fn run_migrations(pool: &SqlitePool) -> DbResult<()> {
    MIGRATOR.run(pool).await?;

    let status = schema_status(pool).await?;
    if status.is_current() {
        info!(applied = status.applied, "Schema up to date");
    } else {
        warn!(missing = ?status.missing_tables, "Schema incomplete after migrations");
    }
    Ok(())
}

/// Inspects the file without changing it.
pub async fn schema_status(pool: &SqlitePool) -> DbResult<SchemaStatus> {
    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table'")
            .fetch_all(pool)
            .await?;

    let applied = if tables.iter().any(|t| t == "_sqlx_migrations") {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(pool)
                .await?;
        count as usize
    } else {
        0
    };

    let missing_tables = GPOS_TABLES
        .iter()
        .copied()
        .filter(|wanted| !tables.iter().any(|t| t == wanted))
        .collect();

    Ok(SchemaStatus {
        embedded: MIGRATOR.migrations.len(),
        applied,
        missing_tables,
    })
}
