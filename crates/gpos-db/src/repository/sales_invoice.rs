//! # Sales Invoice Ledger
//!
//! Local system of record for reconciled invoices, keyed by offline invoice
//! number.
//!
//! ## Conditional Insert
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  INSERT INTO sales_invoices (...) VALUES (...)                          │
//! │  ON CONFLICT (custom_offline_invoice_number) DO NOTHING                 │
//! │       │                                                                 │
//! │       ├── 1 row affected ──► Created(new name)                          │
//! │       │                                                                 │
//! │       └── 0 rows affected ─► SELECT name ... ──► Existing(name)         │
//! │                                                                         │
//! │  Two submitters racing on one number: SQLite serializes the writes,    │
//! │  exactly one sees Created.                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use gpos_core::SalesInvoicePayload;

/// Result of [`SalesInvoiceRepository::insert_if_absent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerInsert {
    /// A new invoice was written under this name.
    Created(String),
    /// An invoice with the same offline number already existed.
    Existing(String),
}

/// A reconciled invoice.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub name: String,
    pub offline_invoice_number: String,
    pub customer_name: Option<String>,
    pub payload: SalesInvoicePayload,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct LedgerRow {
    name: String,
    custom_offline_invoice_number: String,
    customer_name: Option<String>,
    payload: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = DbError;

    fn try_from(row: LedgerRow) -> DbResult<Self> {
        let payload = match serde_json::from_str::<Value>(&row.payload) {
            Ok(Value::Object(map)) => SalesInvoicePayload::from_map(map),
            Ok(_) => return Err(DbError::corrupt("payload", "not a JSON object")),
            Err(e) => return Err(DbError::corrupt("payload", e)),
        };

        Ok(LedgerEntry {
            name: row.name,
            offline_invoice_number: row.custom_offline_invoice_number,
            customer_name: row.customer_name,
            payload,
            created_at: row.created_at,
        })
    }
}

/// Repository for the sales invoice ledger.
#[derive(Debug, Clone)]
pub struct SalesInvoiceRepository {
    pool: SqlitePool,
}

impl SalesInvoiceRepository {
    /// Creates a new SalesInvoiceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SalesInvoiceRepository { pool }
    }

    /// Name of the invoice carrying this offline number, if any.
    pub async fn find_by_offline_number(&self, number: &str) -> DbResult<Option<String>> {
        let name: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sales_invoices WHERE custom_offline_invoice_number = ?1",
        )
        .bind(number)
        .fetch_optional(&self.pool)
        .await?;

        Ok(name)
    }

    /// Writes the invoice unless one with the same offline number exists.
    pub async fn insert_if_absent(
        &self,
        offline_number: &str,
        payload: &SalesInvoicePayload,
    ) -> DbResult<LedgerInsert> {
        let name = format!("SINV-{}", Uuid::new_v4().simple());
        let body = serde_json::to_string(payload).map_err(|e| DbError::Internal(e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO sales_invoices (
                name, custom_offline_invoice_number, customer_name, payload, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (custom_offline_invoice_number) DO NOTHING
            "#,
        )
        .bind(&name)
        .bind(offline_number)
        .bind(payload.customer_name())
        .bind(&body)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            info!(name = %name, offline_number = %offline_number, "Sales invoice created");
            return Ok(LedgerInsert::Created(name));
        }

        let existing = self
            .find_by_offline_number(offline_number)
            .await?
            .ok_or_else(|| DbError::not_found("Sales Invoice", offline_number))?;

        debug!(
            name = %existing,
            offline_number = %offline_number,
            "Sales invoice already present"
        );
        Ok(LedgerInsert::Existing(existing))
    }

    /// Gets an invoice by name.
    pub async fn get(&self, name: &str) -> DbResult<Option<LedgerEntry>> {
        let row: Option<LedgerRow> = sqlx::query_as(
            r#"
            SELECT name, custom_offline_invoice_number, customer_name, payload, created_at
            FROM sales_invoices
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(LedgerEntry::try_from).transpose()
    }

    /// Number of invoices in the ledger.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sales_invoices")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use serde_json::json;

    fn payload(number: &str) -> SalesInvoicePayload {
        match json!({
            "customer_name": "Walk-in",
            "offline_invoice_number": number,
            "items": [{"item_code": "COKE", "quantity": 1, "rate": 3.5, "uom": "Nos"}]
        }) {
            Value::Object(map) => SalesInvoicePayload::from_map(map),
            _ => unreachable!(),
        }
    }

    async fn repo() -> SalesInvoiceRepository {
        Database::new(DbConfig::in_memory())
            .await
            .unwrap()
            .sales_invoices()
    }

    #[tokio::test]
    async fn test_insert_then_find() {
        let repo = repo().await;
        let LedgerInsert::Created(name) = repo.insert_if_absent("OFF-1", &payload("OFF-1")).await.unwrap()
        else {
            panic!("expected a new invoice");
        };

        assert_eq!(repo.find_by_offline_number("OFF-1").await.unwrap(), Some(name.clone()));
        let entry = repo.get(&name).await.unwrap().unwrap();
        assert_eq!(entry.customer_name.as_deref(), Some("Walk-in"));
        assert_eq!(entry.payload.item_count(), 1);
    }

    #[tokio::test]
    async fn test_second_insert_returns_existing() {
        let repo = repo().await;
        let first = repo.insert_if_absent("OFF-1", &payload("OFF-1")).await.unwrap();
        let second = repo.insert_if_absent("OFF-1", &payload("OFF-1")).await.unwrap();

        let (LedgerInsert::Created(a), LedgerInsert::Existing(b)) = (first, second) else {
            panic!("expected Created then Existing");
        };
        assert_eq!(a, b);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_inserts_create_one_invoice() {
        let repo = repo().await;
        let (pa, pb) = (payload("OFF-7"), payload("OFF-7"));
        let (a, b) = tokio::join!(
            repo.insert_if_absent("OFF-7", &pa),
            repo.insert_if_absent("OFF-7", &pb),
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        let created = outcomes
            .iter()
            .filter(|o| matches!(o, LedgerInsert::Created(_)))
            .count();
        assert_eq!(created, 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_number() {
        let repo = repo().await;
        assert_eq!(repo.find_by_offline_number("OFF-404").await.unwrap(), None);
        assert!(repo.get("SINV-404").await.unwrap().is_none());
    }
}
