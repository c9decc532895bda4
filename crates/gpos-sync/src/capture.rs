//! # Offline Capture
//!
//! Records a sale the till could not post, as an "Invoice Unsynced" record
//! waiting for the submitter.
//!
//! If the system of record already holds a Sales Invoice with the same
//! offline number, the record is created cleared so nobody submits it again.
//! Capture must work while the ERP is down, so a failed lookup is logged and
//! the record is stored as given.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use gpos_core::validation::validate_invoice_number;
use gpos_core::{OfflineInvoiceRecord, DEFAULT_INVOICE_KIND};

use crate::error::SyncResult;
use crate::services::{OfflineInvoiceStore, SalesInvoiceService};

/// Fields of a captured sale.
#[derive(Debug, Clone)]
pub struct CaptureRequest {
    pub date_time: DateTime<Utc>,
    pub invoice_number: String,
    pub clearing_status: bool,
    /// Defaults to "Sales Invoice".
    pub kind: Option<String>,
    pub manually_submitted: bool,
    pub json_dump: Option<String>,
    pub api_response: Option<String>,
}

impl CaptureRequest {
    /// An uncleared capture of `json_dump` taken now.
    pub fn new(invoice_number: impl Into<String>, json_dump: impl Into<String>) -> Self {
        CaptureRequest {
            date_time: Utc::now(),
            invoice_number: invoice_number.into(),
            clearing_status: false,
            kind: None,
            manually_submitted: false,
            json_dump: Some(json_dump.into()),
            api_response: None,
        }
    }
}

pub struct OfflineInvoiceCapture {
    store: Arc<dyn OfflineInvoiceStore>,
    invoices: Arc<dyn SalesInvoiceService>,
}

impl OfflineInvoiceCapture {
    pub fn new(store: Arc<dyn OfflineInvoiceStore>, invoices: Arc<dyn SalesInvoiceService>) -> Self {
        OfflineInvoiceCapture { store, invoices }
    }

    /// Stores the capture and returns the created record.
    #[instrument(skip(self, request), fields(invoice_number = %request.invoice_number))]
    pub async fn capture(&self, request: CaptureRequest) -> SyncResult<OfflineInvoiceRecord> {
        let invoice_number = validate_invoice_number(Some(&request.invoice_number))?;

        let mut clearing_status = request.clearing_status;
        match self.invoices.find_by_offline_number(&invoice_number).await {
            Ok(Some(existing)) => {
                info!(existing = %existing, "Already in the system of record, capturing as cleared");
                clearing_status = true;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Could not check the system of record"),
        }

        let now = Utc::now();
        let record = OfflineInvoiceRecord {
            name: format!("IU-{}", Uuid::new_v4().simple()),
            date_time: request.date_time,
            invoice_number: Some(invoice_number),
            json_dump: request.json_dump.filter(|d| !d.is_empty()),
            manually_submitted: request.manually_submitted,
            clearing_status,
            kind: request
                .kind
                .filter(|k| !k.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_INVOICE_KIND.to_string()),
            api_response: request.api_response.filter(|r| !r.is_empty()),
            created_at: now,
            updated_at: now,
        };

        self.store.insert(&record).await?;
        info!(name = %record.name, cleared = record.clearing_status, "Offline invoice captured");
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::test_support::{CreateBehavior, MockInvoices};
    use gpos_core::ValidationError;
    use gpos_db::{Database, DbConfig};

    async fn capture_with(invoices: MockInvoices) -> (OfflineInvoiceCapture, Database) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let capture = OfflineInvoiceCapture::new(
            Arc::new(db.offline_invoices()),
            Arc::new(invoices),
        );
        (capture, db)
    }

    #[tokio::test]
    async fn test_capture_creates_unsynced_record() {
        let (capture, db) = capture_with(MockInvoices::new(CreateBehavior::Create)).await;

        let record = capture
            .capture(CaptureRequest::new(" OFF-1 ", r#"{"customer_name": "Walk-in"}"#))
            .await
            .unwrap();

        assert_eq!(record.invoice_number.as_deref(), Some("OFF-1"));
        assert_eq!(record.kind, "Sales Invoice");
        assert!(!record.clearing_status);

        let stored = db.offline_invoices().get_required(&record.name).await.unwrap();
        assert_eq!(stored.invoice_number, record.invoice_number);
        assert_eq!(stored.json_dump.as_deref(), Some(r#"{"customer_name": "Walk-in"}"#));
        assert!(!stored.is_synced());
    }

    #[tokio::test]
    async fn test_capture_of_known_invoice_is_cleared() {
        let invoices =
            MockInvoices::new(CreateBehavior::Create).with_existing("OFF-1", "ACC-SINV-0001");
        let (capture, _db) = capture_with(invoices).await;

        let record = capture
            .capture(CaptureRequest::new("OFF-1", "{}"))
            .await
            .unwrap();
        assert!(record.clearing_status);
        assert!(!record.manually_submitted);
    }

    #[tokio::test]
    async fn test_capture_requires_number() {
        let (capture, _db) = capture_with(MockInvoices::new(CreateBehavior::Create)).await;
        let err = capture
            .capture(CaptureRequest::new("  ", "{}"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Validation(ValidationError::MissingInvoiceNumber)
        ));
    }
}
