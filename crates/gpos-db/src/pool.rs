//! # Database Handle
//!
//! Opens the till's SQLite file and hands out repositories over one pool.
//!
//! ```text
//! DbConfig::new(path)
//!     │  busy_timeout: how long a write waits for another till's write
//!     ▼
//! Database::new ──► SqlitePool (WAL) ──► migrations::run_migrations
//!     │
//!     ├── catalog()           item units, prices, valuation
//!     ├── offline_invoices()  Invoice Unsynced records
//!     ├── sales_invoices()    local ledger keyed by offline number
//!     └── locks()             submission locks
//! ```
//!
//! WAL lets the promotion form read prices while a reconciliation run
//! writes. Lock takeovers and ledger inserts are single statements, so a
//! writer that hits `SQLITE_BUSY` waits up to `busy_timeout` and retries
//! inside SQLite.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::error::{DbError, DbResult};
use crate::migrations::{self, SchemaStatus};
use crate::repository::catalog::CatalogRepository;
use crate::repository::lock::SubmissionLockRepository;
use crate::repository::offline_invoice::OfflineInvoiceRepository;
use crate::repository::sales_invoice::SalesInvoiceRepository;

const IN_MEMORY: &str = ":memory:";

/// Where the database lives and how the pool behaves.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_path: PathBuf,

    /// Default: 4. In-memory databases always use 1.
    pub max_connections: u32,

    /// Default: 5 seconds.
    pub busy_timeout: Duration,

    /// Default: true.
    pub run_migrations: bool,
}

impl DbConfig {
    /// The file is created if it doesn't exist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        DbConfig {
            database_path: path.into(),
            max_connections: 4,
            busy_timeout: Duration::from_secs(5),
            run_migrations: true,
        }
    }

    /// A private database per handle, for tests.
    pub fn in_memory() -> Self {
        DbConfig::new(IN_MEMORY)
    }

    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn run_migrations(mut self, run: bool) -> Self {
        self.run_migrations = run;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY
    }
}

/// Repository factory over a shared pool. Clones share the pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(path = %config.database_path.display(), "Opening database");

        // Every connection to ":memory:" is its own database.
        let (options, max_connections) = if config.is_in_memory() {
            (SqliteConnectOptions::new().in_memory(true), 1)
        } else {
            let options = SqliteConnectOptions::new()
                .filename(&config.database_path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal);
            (options, config.max_connections.max(1))
        };

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections);
        if config.is_in_memory() {
            // The single connection is the database; never recycle it.
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options.busy_timeout(config.busy_timeout).foreign_keys(true))
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        let db = Database { pool };
        if config.run_migrations {
            migrations::run_migrations(&db.pool).await?;
        }
        Ok(db)
    }

    /// Embedded versus applied migrations, and any missing gpos table.
    pub async fn schema_status(&self) -> DbResult<SchemaStatus> {
        migrations::schema_status(&self.pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn catalog(&self) -> CatalogRepository {
        CatalogRepository::new(self.pool.clone())
    }

    pub fn offline_invoices(&self) -> OfflineInvoiceRepository {
        OfflineInvoiceRepository::new(self.pool.clone())
    }

    pub fn sales_invoices(&self) -> SalesInvoiceRepository {
        SalesInvoiceRepository::new(self.pool.clone())
    }

    pub fn locks(&self) -> SubmissionLockRepository {
        SubmissionLockRepository::new(self.pool.clone())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrations::GPOS_TABLES;

    #[tokio::test]
    async fn test_fresh_database_has_full_schema() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let status = db.schema_status().await.unwrap();

        assert!(status.is_current());
        assert_eq!(status.applied, status.embedded);
        assert!(status.missing_tables.is_empty());
    }

    #[tokio::test]
    async fn test_unmigrated_database_reports_missing_tables() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();
        let status = db.schema_status().await.unwrap();

        assert!(!status.is_current());
        assert_eq!(status.applied, 0);
        assert_eq!(status.missing_tables, GPOS_TABLES.to_vec());

        migrations::run_migrations(db.pool()).await.unwrap();
        assert!(db.schema_status().await.unwrap().is_current());
    }

    #[tokio::test]
    async fn test_migrations_rerun_cleanly() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        migrations::run_migrations(db.pool()).await.unwrap();
        assert!(db.schema_status().await.unwrap().is_current());
    }

    #[test]
    fn test_in_memory_detection() {
        assert!(DbConfig::in_memory().is_in_memory());
        assert!(!DbConfig::new("/tmp/gpos.db").is_in_memory());

        let config = DbConfig::new("/tmp/gpos.db")
            .max_connections(8)
            .busy_timeout(Duration::from_millis(250));
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.busy_timeout, Duration::from_millis(250));
    }
}
