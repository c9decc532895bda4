//! Recording mocks of the collaborator traits for unit tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

use gpos_core::discount;
use gpos_core::{DiscountInput, Money, Notice, SalesInvoicePayload};

use crate::error::{RemoteFailure, SyncError, SyncResult};
use crate::services::{
    CatalogService, CreateOutcome, DiscountService, Notifier, SalesInvoiceService,
};

// =============================================================================
// Catalog
// =============================================================================

#[derive(Default)]
pub struct MockCatalog {
    prices: HashMap<String, Money>,
    valuations: HashMap<String, Money>,
    uoms: HashMap<String, Vec<String>>,
    gates: HashMap<String, Arc<Notify>>,
    fail_prices: bool,
    calls: Mutex<Vec<String>>,
}

impl MockCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_price(mut self, item_code: &str, price: Money) -> Self {
        self.prices.insert(item_code.to_string(), price);
        self
    }

    pub fn with_valuation(mut self, item_code: &str, rate: Money) -> Self {
        self.valuations.insert(item_code.to_string(), rate);
        self
    }

    pub fn with_uoms(mut self, item_code: &str, uoms: &[&str]) -> Self {
        self.uoms
            .insert(item_code.to_string(), uoms.iter().map(|u| u.to_string()).collect());
        self
    }

    /// Price lookups for `item_code` block until the returned handle is
    /// notified.
    pub fn gated(mut self, item_code: &str) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gates.insert(item_code.to_string(), gate.clone());
        (self, gate)
    }

    pub fn failing_prices(mut self) -> Self {
        self.fail_prices = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CatalogService for MockCatalog {
    async fn item_uoms(&self, item_code: &str) -> SyncResult<Vec<String>> {
        self.record(format!("item_uoms {item_code}"));
        Ok(self.uoms.get(item_code).cloned().unwrap_or_default())
    }

    async fn item_price(
        &self,
        item_code: &str,
        price_list: &str,
        uom: Option<&str>,
    ) -> SyncResult<Option<Money>> {
        self.record(format!(
            "item_price {item_code} {price_list} {}",
            uom.unwrap_or("-")
        ));
        if let Some(gate) = self.gates.get(item_code) {
            gate.notified().await;
        }
        if self.fail_prices {
            return Err(SyncError::ConnectionFailed("catalog offline".into()));
        }
        Ok(self.prices.get(item_code).copied())
    }

    async fn valuation_rate(&self, item_code: &str, uom: Option<&str>) -> SyncResult<Option<Money>> {
        self.record(format!("valuation_rate {item_code} {}", uom.unwrap_or("-")));
        Ok(self.valuations.get(item_code).copied())
    }
}

// =============================================================================
// Discount
// =============================================================================

#[derive(Default)]
pub struct MockDiscount {
    fail: bool,
    calls: AtomicUsize,
}

impl MockDiscount {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        MockDiscount {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DiscountService for MockDiscount {
    async fn price_after_discount(&self, input: &DiscountInput) -> SyncResult<Money> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SyncError::Remote(RemoteFailure::from_response(
                500,
                r#"{"message": "Discount Calculation Error"}"#,
            )));
        }
        Ok(discount::compute(input)?)
    }
}

// =============================================================================
// Sales Invoices
// =============================================================================

/// How [`MockInvoices::create_invoice`] answers.
#[derive(Debug, Clone)]
pub enum CreateBehavior {
    Create,
    Duplicate(String),
    Fail(RemoteFailure),
}

pub struct MockInvoices {
    existing: Mutex<HashMap<String, String>>,
    behavior: CreateBehavior,
    finds: AtomicUsize,
    creates: AtomicUsize,
}

impl MockInvoices {
    pub fn new(behavior: CreateBehavior) -> Self {
        MockInvoices {
            existing: Mutex::new(HashMap::new()),
            behavior,
            finds: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }

    pub fn with_existing(self, offline_number: &str, name: &str) -> Self {
        self.existing
            .lock()
            .unwrap()
            .insert(offline_number.to_string(), name.to_string());
        self
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    pub fn remote_calls(&self) -> usize {
        self.finds() + self.creates()
    }
}

#[async_trait]
impl SalesInvoiceService for MockInvoices {
    async fn find_by_offline_number(&self, offline_number: &str) -> SyncResult<Option<String>> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        Ok(self.existing.lock().unwrap().get(offline_number).cloned())
    }

    async fn create_invoice(
        &self,
        offline_number: &str,
        _payload: &SalesInvoicePayload,
    ) -> SyncResult<CreateOutcome> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        match &self.behavior {
            CreateBehavior::Create => {
                let name = format!("ACC-SINV-{n:05}");
                self.existing
                    .lock()
                    .unwrap()
                    .insert(offline_number.to_string(), name.clone());
                Ok(CreateOutcome::Created(name))
            }
            CreateBehavior::Duplicate(name) => Ok(CreateOutcome::Duplicate(name.clone())),
            CreateBehavior::Fail(failure) => Err(SyncError::Remote(failure.clone())),
        }
    }
}

// =============================================================================
// Notifier
// =============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.message).collect()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().unwrap().last().cloned()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}
