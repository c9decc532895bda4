//! # Offline Invoice Repository
//!
//! Stores "Invoice Unsynced" records: sales captured at the till while the
//! ERP was unreachable.
//!
//! ## Record Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  insert()            clearing_status = 0, manually_submitted = 0        │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  pending(after, n)   oldest first, clearing_status = 0 only             │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  mark_submitted()    ONE statement sets both flags to 1                 │
//! │                      (no statement here ever sets them back to 0)       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use gpos_core::{OfflineInvoiceRecord, PendingCursor, OFFLINE_INVOICE_DOCTYPE};

/// Column list shared by every SELECT.
const COLUMNS: &str = r#"
    name, date_time, invoice_number, custom_json_dump,
    custom_manually_submitted, clearing_status, custom_type,
    custom_api_response, created_at, updated_at
"#;

/// Row shape of `invoice_unsynced`.
#[derive(Debug, FromRow)]
struct OfflineInvoiceRow {
    name: String,
    date_time: DateTime<Utc>,
    invoice_number: Option<String>,
    custom_json_dump: Option<String>,
    custom_manually_submitted: bool,
    clearing_status: bool,
    custom_type: String,
    custom_api_response: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OfflineInvoiceRow> for OfflineInvoiceRecord {
    fn from(row: OfflineInvoiceRow) -> Self {
        OfflineInvoiceRecord {
            name: row.name,
            date_time: row.date_time,
            invoice_number: row.invoice_number,
            json_dump: row.custom_json_dump,
            manually_submitted: row.custom_manually_submitted,
            clearing_status: row.clearing_status,
            kind: row.custom_type,
            api_response: row.custom_api_response,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Repository for offline invoice records.
#[derive(Debug, Clone)]
pub struct OfflineInvoiceRepository {
    pool: SqlitePool,
}

impl OfflineInvoiceRepository {
    /// Creates a new OfflineInvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OfflineInvoiceRepository { pool }
    }

    /// Inserts a record.
    ///
    /// ## Errors
    /// `DbError::UniqueViolation` if a record with the same name exists.
    pub async fn insert(&self, record: &OfflineInvoiceRecord) -> DbResult<()> {
        debug!(
            name = %record.name,
            invoice_number = ?record.invoice_number,
            "Inserting offline invoice"
        );

        sqlx::query(
            r#"
            INSERT INTO invoice_unsynced (
                name, date_time, invoice_number, custom_json_dump,
                custom_manually_submitted, clearing_status, custom_type,
                custom_api_response, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&record.name)
        .bind(record.date_time)
        .bind(&record.invoice_number)
        .bind(&record.json_dump)
        .bind(record.manually_submitted)
        .bind(record.clearing_status)
        .bind(&record.kind)
        .bind(&record.api_response)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { .. } => DbError::duplicate("name", &record.name),
            other => other,
        })?;

        Ok(())
    }

    /// Gets a record by name.
    pub async fn get(&self, name: &str) -> DbResult<Option<OfflineInvoiceRecord>> {
        let sql = format!("SELECT {COLUMNS} FROM invoice_unsynced WHERE name = ?1");
        let row: Option<OfflineInvoiceRow> = sqlx::query_as(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Gets a record by name, failing with `NotFound` when absent.
    pub async fn get_required(&self, name: &str) -> DbResult<OfflineInvoiceRecord> {
        self.get(name)
            .await?
            .ok_or_else(|| DbError::not_found(OFFLINE_INVOICE_DOCTYPE, name))
    }

    /// Most recent record carrying an offline invoice number.
    pub async fn find_by_invoice_number(&self, number: &str) -> DbResult<Option<OfflineInvoiceRecord>> {
        let sql = format!(
            "SELECT {COLUMNS} FROM invoice_unsynced WHERE invoice_number = ?1 \
             ORDER BY created_at DESC LIMIT 1"
        );
        let row: Option<OfflineInvoiceRow> = sqlx::query_as(&sql)
            .bind(number)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Into::into))
    }

    /// Records not yet cleared, oldest capture first.
    ///
    /// With a cursor, only records strictly after it in
    /// `(date_time, name)` order are returned.
    pub async fn pending(
        &self,
        after: Option<&PendingCursor>,
        limit: u32,
    ) -> DbResult<Vec<OfflineInvoiceRecord>> {
        let rows: Vec<OfflineInvoiceRow> = match after {
            Some(cursor) => {
                let sql = format!(
                    "SELECT {COLUMNS} FROM invoice_unsynced WHERE clearing_status = 0 \
                     AND (date_time > ?1 OR (date_time = ?1 AND name > ?2)) \
                     ORDER BY date_time ASC, name ASC LIMIT ?3"
                );
                sqlx::query_as(&sql)
                    .bind(cursor.date_time)
                    .bind(&cursor.name)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {COLUMNS} FROM invoice_unsynced WHERE clearing_status = 0 \
                     ORDER BY date_time ASC, name ASC LIMIT ?1"
                );
                sqlx::query_as(&sql)
                    .bind(limit)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Number of records not yet cleared.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM invoice_unsynced WHERE clearing_status = 0")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Sets `custom_manually_submitted` and `clearing_status` in one statement.
    ///
    /// ## Errors
    /// `DbError::NotFound` if no record has this name.
    pub async fn mark_submitted(&self, name: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invoice_unsynced SET
                custom_manually_submitted = 1,
                clearing_status = 1,
                updated_at = ?2
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(OFFLINE_INVOICE_DOCTYPE, name));
        }

        info!(name = %name, "Offline invoice marked as submitted");
        Ok(())
    }

    /// Stores the last ERP response for diagnosis. Flags are untouched.
    pub async fn record_api_response(&self, name: &str, response: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE invoice_unsynced SET
                custom_api_response = ?2,
                updated_at = ?3
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .bind(response)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found(OFFLINE_INVOICE_DOCTYPE, name));
        }
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
