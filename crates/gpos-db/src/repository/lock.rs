//! # Submission Lock Repository
//!
//! Short-lived locks keyed by offline invoice number. A till holds the lock
//! for the duration of one submit attempt so two operators pressing "Submit"
//! on the same record do not both reach the ERP.
//!
//! A lock that outlives its TTL (crashed process) can be taken over.

use chrono::Utc;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};

/// Repository for submission locks.
#[derive(Debug, Clone)]
pub struct SubmissionLockRepository {
    pool: SqlitePool,
}

impl SubmissionLockRepository {
    /// Creates a new SubmissionLockRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SubmissionLockRepository { pool }
    }

    /// Takes the lock for `invoice_number` if it is free or expired.
    ///
    /// Returns `false` when another holder has a live lock.
    pub async fn try_acquire(&self, invoice_number: &str, holder: &str, ttl: Duration) -> DbResult<bool> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| DbError::Internal(e.to_string()))?;
        let now = Utc::now();
        let expires_at = now + ttl;

        let result = sqlx::query(
            r#"
            INSERT INTO submission_locks (invoice_number, holder, acquired_at, expires_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (invoice_number) DO UPDATE SET
                holder = excluded.holder,
                acquired_at = excluded.acquired_at,
                expires_at = excluded.expires_at
            WHERE submission_locks.expires_at <= excluded.acquired_at
            "#,
        )
        .bind(invoice_number)
        .bind(holder)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        let acquired = result.rows_affected() == 1;
        debug!(
            invoice_number = %invoice_number,
            holder = %holder,
            acquired,
            "Submission lock attempt"
        );
        Ok(acquired)
    }

    /// Releases the lock if `holder` still owns it.
    pub async fn release(&self, invoice_number: &str, holder: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM submission_locks WHERE invoice_number = ?1 AND holder = ?2")
            .bind(invoice_number)
            .bind(holder)
            .execute(&self.pool)
            .await?;

        let released = result.rows_affected() == 1;
        if !released {
            warn!(
                invoice_number = %invoice_number,
                holder = %holder,
                "Submission lock was no longer held"
            );
        }
        Ok(released)
    }

    /// Current live holder of the lock, if any.
    pub async fn holder(&self, invoice_number: &str) -> DbResult<Option<String>> {
        let holder: Option<String> = sqlx::query_scalar(
            "SELECT holder FROM submission_locks WHERE invoice_number = ?1 AND expires_at > ?2",
        )
        .bind(invoice_number)
        .bind(Utc::now())
        .fetch_optional(&self.pool)
        .await?;

        Ok(holder)
    }

    /// Deletes expired locks. Returns how many were removed.
    pub async fn purge_expired(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM submission_locks WHERE expires_at <= ?1")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
