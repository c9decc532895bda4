//! # Price Resolver
//!
//! Runs the sale-price and valuation lookups for one row, concurrently.
//!
//! ```text
//!                      ┌── item_price(item, list, uom) ──► sale_price
//!  PricingRequest ─────┤                                        (join)
//!                      └── valuation_rate(item, uom) ────► cost_price
//! ```
//!
//! The two lookups are independent: a failure of one never discards the
//! other's result.

use std::sync::Arc;
use tracing::{debug, instrument};

use gpos_core::{Money, PricingRequest};

use crate::error::SyncResult;
use crate::services::CatalogService;

/// Results of one resolution. Each side carries its own error.
#[derive(Debug)]
pub struct Resolution {
    pub sale_price: SyncResult<Option<Money>>,
    pub cost_price: SyncResult<Option<Money>>,
}

#[derive(Clone)]
pub struct PriceResolver {
    catalog: Arc<dyn CatalogService>,
}

impl PriceResolver {
    pub fn new(catalog: Arc<dyn CatalogService>) -> Self {
        PriceResolver { catalog }
    }

    /// Looks up price and valuation for the request.
    #[instrument(skip(self, request), fields(row = %request.row, item_code = %request.item_code))]
    pub async fn resolve(&self, request: &PricingRequest) -> Resolution {
        let uom = request.uom.as_deref();

        let (sale_price, cost_price) = tokio::join!(
            self.catalog
                .item_price(&request.item_code, &request.price_list, uom),
            self.catalog.valuation_rate(&request.item_code, uom),
        );

        debug!(
            price_list = %request.price_list,
            uom = ?uom,
            sale_price = ?sale_price.as_ref().ok(),
            cost_price = ?cost_price.as_ref().ok(),
            "Lookups complete"
        );

        Resolution {
            sale_price,
            cost_price,
        }
    }

    pub async fn uom_options(&self, item_code: &str) -> SyncResult<Vec<String>> {
        self.catalog.item_uoms(item_code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockCatalog;
    use gpos_core::RowId;

    fn request(uom: Option<&str>) -> PricingRequest {
        PricingRequest {
            row: RowId::new(1),
            revision: 1,
            item_code: "COKE".into(),
            price_list: "Retail".into(),
            uom: uom.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_both_lookups_run() {
        let catalog = Arc::new(
            MockCatalog::new()
                .with_price("COKE", Money::from_cents(350))
                .with_valuation("COKE", Money::from_cents(210)),
        );
        let resolver = PriceResolver::new(catalog.clone());

        let res = resolver.resolve(&request(Some("Nos"))).await;
        assert_eq!(res.sale_price.unwrap(), Some(Money::from_cents(350)));
        assert_eq!(res.cost_price.unwrap(), Some(Money::from_cents(210)));

        let calls = catalog.calls();
        assert!(calls.contains(&"item_price COKE Retail Nos".to_string()));
        assert!(calls.contains(&"valuation_rate COKE Nos".to_string()));
    }

    #[tokio::test]
    async fn test_failure_is_per_lookup() {
        let catalog = Arc::new(
            MockCatalog::new()
                .with_valuation("COKE", Money::from_cents(210))
                .failing_prices(),
        );
        let resolver = PriceResolver::new(catalog);

        let res = resolver.resolve(&request(None)).await;
        assert!(res.sale_price.is_err());
        assert_eq!(res.cost_price.unwrap(), Some(Money::from_cents(210)));
    }
}
