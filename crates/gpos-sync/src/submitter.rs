//! # Invoice Submitter
//!
//! Posts an offline invoice record into the system of record exactly once,
//! keyed by its offline invoice number.
//!
//! ## Submission Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  1. Local checks (no remote call on failure)                            │
//! │     empty dump ─► "JSON Dump is empty!"                                 │
//! │     bad JSON   ─► "Invalid JSON format in JSON Dump."                   │
//! │     no number  ─► "Offline Invoice Number missing."                     │
//! │                                                                         │
//! │  2. Submission lock on the number (held by another till ─► InProgress)  │
//! │                                                                         │
//! │  3. find_by_offline_number ── found ──► AlreadyExists(name)             │
//! │        │ none                                                           │
//! │        ▼                                                                │
//! │  4. create_invoice ── Duplicate ──► AlreadyExists(name)                 │
//! │        │       └───── error ─────► Failed(detail), flags untouched      │
//! │        ▼ Created                                                        │
//! │  5. "Invoice submitted successfully"                                    │
//! │     mark_submitted (both flags, one statement)                          │
//! │     reload record ─► Submitted(name)                                    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Step 3 is only a fast path. Two tills racing past it are still safe
//! because `create_invoice` is a conditional insert on the offline number.
//! Nothing retries automatically; a failed record stays pending for the
//! operator or the next reconciliation run.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

use gpos_core::validation::validate_offline_record;
use gpos_core::{Indicator, Notice, OfflineInvoiceRecord, PendingCursor, OFFLINE_INVOICE_DOCTYPE};

use crate::error::{SyncError, SyncResult};
use crate::services::{
    CreateOutcome, Notifier, OfflineInvoiceStore, SalesInvoiceService, SubmissionLocks,
};

/// Headline of every failed submission notice.
pub const SUBMIT_FAILED: &str = "Failed to submit invoice.";

// =============================================================================
// Outcomes
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The system of record already holds this offline number.
    AlreadyExists(String),
    /// Created under this name; the local record is now synced.
    Submitted(String),
    /// Another submitter holds the lock for this number.
    InProgress,
    /// The remote side failed; the detail shown to the operator.
    Failed(String),
}

/// Outcome plus the local record as it stands afterwards.
#[derive(Debug, Clone)]
pub struct Submission {
    pub outcome: SubmitOutcome,
    pub record: OfflineInvoiceRecord,
}

/// Counts from a bulk reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub submitted: usize,
    pub already_existing: usize,
    pub in_progress: usize,
    pub failed: usize,
    pub invalid: usize,
}

impl ReconcileSummary {
    pub fn total(&self) -> usize {
        self.submitted + self.already_existing + self.in_progress + self.failed + self.invalid
    }
}

impl std::fmt::Display for ReconcileSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} submitted, {} already existing, {} in progress, {} failed, {} invalid",
            self.submitted, self.already_existing, self.in_progress, self.failed, self.invalid
        )
    }
}

fn notice(indicator: Indicator, message: impl Into<String>) -> Notice {
    Notice {
        title: None,
        message: message.into(),
        indicator,
    }
}

// =============================================================================
// Invoice Submitter
// =============================================================================

pub struct InvoiceSubmitter {
    store: Arc<dyn OfflineInvoiceStore>,
    invoices: Arc<dyn SalesInvoiceService>,
    locks: Arc<dyn SubmissionLocks>,
    notifier: Arc<dyn Notifier>,
    holder: String,
    lock_ttl: Duration,
}

impl InvoiceSubmitter {
    /// `holder` identifies this till in submission locks.
    pub fn new(
        store: Arc<dyn OfflineInvoiceStore>,
        invoices: Arc<dyn SalesInvoiceService>,
        locks: Arc<dyn SubmissionLocks>,
        notifier: Arc<dyn Notifier>,
        holder: impl Into<String>,
    ) -> Self {
        InvoiceSubmitter {
            store,
            invoices,
            locks,
            notifier,
            holder: holder.into(),
            lock_ttl: Duration::from_secs(600),
        }
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    /// The "Submit to Sales Invoice" action on a stored record.
    pub async fn submit_by_name(&self, name: &str) -> SyncResult<Submission> {
        let record = match self.store.get(name).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return Err(self.halted(SyncError::NotFound {
                    doctype: OFFLINE_INVOICE_DOCTYPE.to_string(),
                    name: name.to_string(),
                }))
            }
            Err(e) => return Err(self.halted(e)),
        };
        self.submit(record).await
    }

    /// Submits one record.
    ///
    /// ## Errors
    /// - `SyncError::Validation` when a local check fails (already notified)
    /// - `SyncError::Database` when the local store fails (also notified)
    ///
    /// Remote failures are not errors: they come back as
    /// [`SubmitOutcome::Failed`].
    #[instrument(skip(self, record), fields(name = %record.name))]
    pub async fn submit(&self, record: OfflineInvoiceRecord) -> SyncResult<Submission> {
        let submission = match validate_offline_record(&record) {
            Ok(submission) => submission,
            Err(e) => {
                warn!(error = %e, "Offline invoice failed local checks");
                self.notifier.notify(notice(Indicator::Orange, e.to_string()));
                return Err(e.into());
            }
        };
        let number = submission.invoice_number.as_str();

        let acquired = match self.locks.try_lock(number, &self.holder, self.lock_ttl).await {
            Ok(acquired) => acquired,
            Err(e) => return Err(self.halted(e)),
        };

        if !acquired {
            info!(invoice_number = %number, "Another submission holds the lock");
            self.notifier.notify(notice(
                Indicator::Blue,
                format!("Duplicate offline invoice number: {}", number),
            ));
            return Ok(Submission {
                outcome: SubmitOutcome::InProgress,
                record,
            });
        }

        let result = self.submit_locked(record, &submission.payload, number).await;

        if let Err(e) = self.locks.unlock(number, &self.holder).await {
            warn!(invoice_number = %number, error = %e, "Failed to release submission lock");
        }
        result
    }

    async fn submit_locked(
        &self,
        record: OfflineInvoiceRecord,
        payload: &gpos_core::SalesInvoicePayload,
        number: &str,
    ) -> SyncResult<Submission> {
        let existing = match self.invoices.find_by_offline_number(number).await {
            Ok(existing) => existing,
            Err(e) => return Ok(self.failed(record, e).await),
        };

        if let Some(name) = existing {
            return Ok(self.already_exists(record, name));
        }

        let name = match self.invoices.create_invoice(number, payload).await {
            Ok(CreateOutcome::Created(name)) => name,
            Ok(CreateOutcome::Duplicate(name)) => return Ok(self.already_exists(record, name)),
            Err(e) => return Ok(self.failed(record, e).await),
        };

        info!(invoice_number = %number, sales_invoice = %name, "Invoice submitted");
        self.notifier
            .notify(notice(Indicator::Green, "Invoice submitted successfully"));

        if let Err(e) = self.store.mark_submitted(&record.name).await {
            error!(name = %record.name, error = %e, "Invoice created but record not marked");
            self.notifier.notify(notice(
                Indicator::Red,
                format!(
                    "Invoice {} was created but this record could not be updated.\n{}",
                    name,
                    e.detail()
                ),
            ));
            return Err(e);
        }

        let refreshed = match self.store.get(&record.name).await {
            Ok(Some(refreshed)) => refreshed,
            Ok(None) => record,
            Err(e) => {
                warn!(name = %record.name, error = %e, "Could not reload the marked record");
                self.notifier.notify(notice(
                    Indicator::Orange,
                    format!(
                        "Invoice {} was submitted but this record could not be reloaded.\n{}",
                        name,
                        e.detail()
                    ),
                ));
                OfflineInvoiceRecord {
                    manually_submitted: true,
                    clearing_status: true,
                    ..record
                }
            }
        };
        Ok(Submission {
            outcome: SubmitOutcome::Submitted(name),
            record: refreshed,
        })
    }

    fn already_exists(&self, record: OfflineInvoiceRecord, name: String) -> Submission {
        info!(sales_invoice = %name, "Offline number already reconciled");
        self.notifier.notify(notice(
            Indicator::Blue,
            format!("Invoice already exists with this Offline Invoice Number: {}", name),
        ));
        Submission {
            outcome: SubmitOutcome::AlreadyExists(name),
            record,
        }
    }

    /// Local failure before any remote call: shown in red, then returned.
    fn halted(&self, err: SyncError) -> SyncError {
        error!(error = %err, "Submission halted");
        self.notifier.notify(notice(
            Indicator::Red,
            format!("{}\n{}", SUBMIT_FAILED, err.detail()),
        ));
        err
    }

    async fn failed(&self, record: OfflineInvoiceRecord, err: SyncError) -> Submission {
        let detail = err.detail();
        warn!(error = %err, retryable = err.is_retryable(), "Submission failed");
        self.notifier.notify(notice(
            Indicator::Red,
            format!("{}\n{}", SUBMIT_FAILED, detail),
        ));

        if let Err(e) = self.store.record_api_response(&record.name, &err.to_string()).await {
            debug!(error = %e, "Could not store the API response");
        }

        Submission {
            outcome: SubmitOutcome::Failed(detail),
            record,
        }
    }

    // =========================================================================
    // Bulk Reconciliation
    // =========================================================================

    /// Submits every uncleared record, oldest first, `batch_size` at a time.
    ///
    /// Pages are read after the last record of the previous page, so records
    /// that stay uncleared (already existing, invalid, failed) never hide
    /// newer ones. One record's failure never stops the run. Only a failure
    /// to read the pending list is returned as an error.
    #[instrument(skip(self))]
    pub async fn submit_pending(&self, batch_size: u32) -> SyncResult<ReconcileSummary> {
        let batch_size = batch_size.max(1);
        let mut summary = ReconcileSummary::default();
        let mut cursor: Option<PendingCursor> = None;

        loop {
            let page = self.store.pending(cursor.as_ref(), batch_size).await?;
            let Some(last) = page.last() else {
                break;
            };
            cursor = Some(last.cursor());
            let full = page.len() as u32 == batch_size;
            debug!(count = page.len(), "Reconciling pending page");

            for record in page {
                let name = record.name.clone();
                match self.submit(record).await {
                    Ok(Submission { outcome, .. }) => match outcome {
                        SubmitOutcome::Submitted(_) => summary.submitted += 1,
                        SubmitOutcome::AlreadyExists(_) => summary.already_existing += 1,
                        SubmitOutcome::InProgress => summary.in_progress += 1,
                        SubmitOutcome::Failed(_) => summary.failed += 1,
                    },
                    Err(SyncError::Validation(_)) => summary.invalid += 1,
                    Err(e) => {
                        warn!(name = %name, error = %e, "Record not reconciled");
                        summary.failed += 1;
                    }
                }
            }

            if !full {
                break;
            }
        }

        info!(%summary, "Reconciliation run complete");
        if summary.total() > 0 {
            self.notifier
                .notify(notice(Indicator::Blue, format!("Reconciliation: {}", summary)));
        }
        Ok(summary)
    }
}
