//! # Row Reactor
//!
//! Reacts to edits on a promotion's item table: runs the price and valuation
//! lookups, chains the discount step, and writes results back into the row.
//!
//! ## Edit Handling
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  on_item_code ─► clear uom ─► [price list?] ──no──► "Missing Price      │
//! │                                    │ yes             List" (red)        │
//! │                                    ▼                                    │
//! │  on_uom ───────► [item + list?] ─► PriceResolver (price ∥ valuation)    │
//! │                  no: skipped          │                                 │
//! │                                       ├── cost  ─► cost_price (miss=0)  │
//! │                                       └── price ─► sale_price           │
//! │                                                       │                 │
//! │  on_discount_* ─► [sale price ≠ 0?] ──no──► "Invalid Discount" (red)    │
//! │                          │ yes                        │                 │
//! │                          ▼                            ▼                 │
//! │                   DiscountService ─────────► price_after_discount       │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Locking
//! The promotion lives behind a `tokio::sync::Mutex`. Every handler takes
//! the lock to mutate the row and obtain a request ticket, releases it, runs
//! the remote call, then takes it again to bring the result back. The lock is
//! never held across a remote call, so edits stay responsive while lookups
//! are in flight. Results of superseded lookups are dropped by the row's
//! revision counters.

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use gpos_core::{
    CoreError, DiscountRequest, DiscountType, LineItemRow, Money, Notice, Percentage,
    PricingOutcome, PricingRequest, Promotion, RowId,
};

use crate::error::{SyncError, SyncResult};
use crate::pricing::PriceResolver;
use crate::services::{CatalogService, DiscountService, Notifier};

/// Per-row controller for a promotion document.
#[derive(Clone)]
pub struct RowReactor {
    promotion: Arc<Mutex<Promotion>>,
    resolver: PriceResolver,
    discounts: Arc<dyn DiscountService>,
    notifier: Arc<dyn Notifier>,
}

impl RowReactor {
    pub fn new(
        promotion: Promotion,
        catalog: Arc<dyn CatalogService>,
        discounts: Arc<dyn DiscountService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        RowReactor {
            promotion: Arc::new(Mutex::new(promotion)),
            resolver: PriceResolver::new(catalog),
            discounts,
            notifier,
        }
    }

    // =========================================================================
    // Document Access
    // =========================================================================

    pub async fn row(&self, id: RowId) -> Option<LineItemRow> {
        self.promotion.lock().await.row(id).cloned()
    }

    pub async fn add_row(&self) -> RowId {
        self.promotion.lock().await.add_row()
    }

    pub async fn remove_row(&self, id: RowId) -> SyncResult<LineItemRow> {
        Ok(self.promotion.lock().await.remove_row(id)?)
    }

    /// Changes the promotion's price list. Rows are not re-priced.
    pub async fn set_price_list(&self, price_list: Option<String>) {
        self.promotion.lock().await.set_price_list(price_list);
    }

    /// Units the uom picker offers for a row: the item's units, or nothing
    /// when the row has no item yet.
    pub async fn uom_options(&self, id: RowId) -> SyncResult<Vec<String>> {
        let item_code = {
            let promo = self.promotion.lock().await;
            let row = promo.row(id).ok_or(CoreError::RowNotFound(id))?;
            row.item_code.clone()
        };

        match item_code {
            Some(item_code) => self.resolver.uom_options(&item_code).await,
            None => Ok(Vec::new()),
        }
    }

    // =========================================================================
    // Edit Handlers
    // =========================================================================

    /// Item edit: clears the uom, then runs the full pricing chain.
    #[instrument(skip(self), fields(row = %id))]
    pub async fn on_item_code(&self, id: RowId, item_code: Option<String>) -> SyncResult<()> {
        let request = self.promotion.lock().await.set_item_code(id, item_code);

        match request {
            Ok(Some(request)) => self.run_pricing(request).await,
            Ok(None) => {
                debug!("Item cleared");
                Ok(())
            }
            Err(e) => Err(self.halt(e)),
        }
    }

    /// Uom edit: re-runs the pricing chain when the row has an item. Without
    /// an item nothing is priced; without a price list the edit halts.
    #[instrument(skip(self), fields(row = %id))]
    pub async fn on_uom(&self, id: RowId, uom: Option<String>) -> SyncResult<()> {
        let request = self.promotion.lock().await.set_uom(id, uom);

        match request {
            Ok(Some(request)) => self.run_pricing(request).await,
            Ok(None) => {
                debug!("No item on row, uom change not priced");
                Ok(())
            }
            Err(e) => Err(self.halt(e)),
        }
    }

    #[instrument(skip(self), fields(row = %id))]
    pub async fn on_discount_type(&self, id: RowId, discount_type: DiscountType) -> SyncResult<()> {
        let request = self.promotion.lock().await.set_discount_type(id, discount_type);
        self.discount_edit(request).await
    }

    #[instrument(skip(self), fields(row = %id))]
    pub async fn on_discount_percentage(&self, id: RowId, pct: Percentage) -> SyncResult<()> {
        let request = self.promotion.lock().await.set_discount_percentage(id, pct);
        self.discount_edit(request).await
    }

    #[instrument(skip(self), fields(row = %id))]
    pub async fn on_discount_amount(&self, id: RowId, amount: Money) -> SyncResult<()> {
        let request = self.promotion.lock().await.set_discount_amount(id, amount);
        self.discount_edit(request).await
    }

    async fn discount_edit(&self, request: Result<DiscountRequest, CoreError>) -> SyncResult<()> {
        match request {
            Ok(request) => self.run_discount(request).await,
            Err(e) => Err(self.halt(e)),
        }
    }

    // =========================================================================
    // Chains
    // =========================================================================

    async fn run_pricing(&self, request: PricingRequest) -> SyncResult<()> {
        let resolution = self.resolver.resolve(&request).await;
        let (id, revision) = (request.row, request.revision);
        let mut first_error: Option<SyncError> = None;

        let discount = {
            let mut promo = self.promotion.lock().await;

            match resolution.cost_price {
                Ok(cost) => match promo.apply_cost(id, revision, cost) {
                    Ok(true) => debug!(cost = ?cost, "Cost price written"),
                    Ok(false) => debug!(revision, "Stale valuation dropped"),
                    Err(e) => debug!(error = %e, "Row gone before valuation arrived"),
                },
                Err(e) => {
                    self.report("Valuation Rate Fetch Error", &e);
                    first_error.get_or_insert(e);
                }
            }

            match resolution.sale_price {
                Ok(price) => match promo.apply_pricing(id, revision, price) {
                    Ok(PricingOutcome::Stale) => {
                        debug!(revision, "Stale price dropped");
                        None
                    }
                    Ok(PricingOutcome::NoPrice) => {
                        info!(
                            item_code = %request.item_code,
                            price_list = %request.price_list,
                            "No price on price list"
                        );
                        None
                    }
                    Ok(PricingOutcome::Applied { discount }) => match discount {
                        Ok(next) => Some(next),
                        Err(e) => {
                            let err = self.halt(e);
                            first_error.get_or_insert(err);
                            None
                        }
                    },
                    Err(e) => {
                        debug!(error = %e, "Row gone before price arrived");
                        None
                    }
                },
                Err(e) => {
                    self.report("Item Price Fetch Error", &e);
                    first_error.get_or_insert(e);
                    None
                }
            }
        };

        if let Some(next) = discount {
            if let Err(e) = self.run_discount(next).await {
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn run_discount(&self, request: DiscountRequest) -> SyncResult<()> {
        let price = match self.discounts.price_after_discount(&request.input).await {
            Ok(price) => price,
            Err(SyncError::Core(e)) => return Err(self.halt(e)),
            Err(e) => {
                self.report("Discount Calculation Error", &e);
                return Err(e);
            }
        };

        match self
            .promotion
            .lock()
            .await
            .apply_discount(request.row, request.revision, price)
        {
            Ok(true) => debug!(row = %request.row, price = %price, "Price after discount written"),
            Ok(false) => debug!(row = %request.row, "Stale discount dropped"),
            Err(e) => debug!(error = %e, "Row gone before discount arrived"),
        }
        Ok(())
    }

    // =========================================================================
    // Notices
    // =========================================================================

    /// A rule stopped the edit: show it and hand the error back.
    fn halt(&self, err: CoreError) -> SyncError {
        warn!(title = err.title(), error = %err, "Edit halted");
        self.notifier.notify(Notice::error(err.title(), err.to_string()));
        SyncError::Core(err)
    }

    fn report(&self, title: &str, err: &SyncError) {
        warn!(title, error = %err, retryable = err.is_retryable(), "Lookup failed");
        self.notifier.notify(Notice::error(title, err.detail()));
    }
}
