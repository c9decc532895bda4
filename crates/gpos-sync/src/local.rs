//! # Local Services
//!
//! The collaborator traits backed by the store hub's SQLite database, for
//! tills that price and reconcile without the ERP.
//!
//! The repositories implement the traits directly; [`LocalDiscount`] runs the
//! discount rule in-process.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use gpos_core::discount;
use gpos_core::{DiscountInput, Money, OfflineInvoiceRecord, PendingCursor, SalesInvoicePayload};
use gpos_db::{
    CatalogRepository, LedgerInsert, OfflineInvoiceRepository, SalesInvoiceRepository,
    SubmissionLockRepository,
};

use crate::error::SyncResult;
use crate::services::{
    CatalogService, CreateOutcome, DiscountService, OfflineInvoiceStore, SalesInvoiceService,
    SubmissionLocks,
};

#[async_trait]
impl CatalogService for CatalogRepository {
    async fn item_uoms(&self, item_code: &str) -> SyncResult<Vec<String>> {
        Ok(CatalogRepository::item_uoms(self, item_code).await?)
    }

    async fn item_price(
        &self,
        item_code: &str,
        price_list: &str,
        uom: Option<&str>,
    ) -> SyncResult<Option<Money>> {
        Ok(CatalogRepository::item_price(self, item_code, price_list, uom).await?)
    }

    async fn valuation_rate(&self, item_code: &str, uom: Option<&str>) -> SyncResult<Option<Money>> {
        Ok(CatalogRepository::valuation_rate(self, item_code, uom).await?)
    }
}

/// Computes discounts in-process.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalDiscount;

#[async_trait]
impl DiscountService for LocalDiscount {
    async fn price_after_discount(&self, input: &DiscountInput) -> SyncResult<Money> {
        Ok(discount::compute(input)?)
    }
}

#[async_trait]
impl SalesInvoiceService for SalesInvoiceRepository {
    async fn find_by_offline_number(&self, offline_number: &str) -> SyncResult<Option<String>> {
        Ok(SalesInvoiceRepository::find_by_offline_number(self, offline_number).await?)
    }

    async fn create_invoice(
        &self,
        offline_number: &str,
        payload: &SalesInvoicePayload,
    ) -> SyncResult<CreateOutcome> {
        let outcome = match self.insert_if_absent(offline_number, payload).await? {
            LedgerInsert::Created(name) => CreateOutcome::Created(name),
            LedgerInsert::Existing(name) => CreateOutcome::Duplicate(name),
        };
        debug!(offline_number = %offline_number, ?outcome, "Ledger create");
        Ok(outcome)
    }
}

#[async_trait]
impl OfflineInvoiceStore for OfflineInvoiceRepository {
    async fn get(&self, name: &str) -> SyncResult<Option<OfflineInvoiceRecord>> {
        Ok(OfflineInvoiceRepository::get(self, name).await?)
    }

    async fn mark_submitted(&self, name: &str) -> SyncResult<()> {
        Ok(OfflineInvoiceRepository::mark_submitted(self, name).await?)
    }

    async fn insert(&self, record: &OfflineInvoiceRecord) -> SyncResult<()> {
        Ok(OfflineInvoiceRepository::insert(self, record).await?)
    }

    async fn pending(
        &self,
        after: Option<&PendingCursor>,
        limit: u32,
    ) -> SyncResult<Vec<OfflineInvoiceRecord>> {
        Ok(OfflineInvoiceRepository::pending(self, after, limit).await?)
    }

    async fn record_api_response(&self, name: &str, response: &str) -> SyncResult<()> {
        Ok(OfflineInvoiceRepository::record_api_response(self, name, response).await?)
    }
}

#[async_trait]
impl SubmissionLocks for SubmissionLockRepository {
    async fn try_lock(&self, offline_number: &str, holder: &str, ttl: Duration) -> SyncResult<bool> {
        Ok(self.try_acquire(offline_number, holder, ttl).await?)
    }

    async fn unlock(&self, offline_number: &str, holder: &str) -> SyncResult<()> {
        self.release(offline_number, holder).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpos_core::{DiscountType, Percentage};
    use gpos_db::{Database, DbConfig};
    use serde_json::{json, Value};

    fn payload(number: &str) -> SalesInvoicePayload {
        match json!({"customer_name": "Walk-in", "offline_invoice_number": number}) {
            Value::Object(map) => SalesInvoicePayload::from_map(map),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_ledger_maps_existing_to_duplicate() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let ledger: &dyn SalesInvoiceService = &db.sales_invoices();

        let first = ledger.create_invoice("OFF-1", &payload("OFF-1")).await.unwrap();
        let second = ledger.create_invoice("OFF-1", &payload("OFF-1")).await.unwrap();

        assert!(matches!(first, CreateOutcome::Created(_)));
        assert_eq!(second, CreateOutcome::Duplicate(first.name().to_string()));
        assert_eq!(
            ledger.find_by_offline_number("OFF-1").await.unwrap().as_deref(),
            Some(first.name())
        );
    }

    #[tokio::test]
    async fn test_local_catalog_through_trait() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.catalog();
        repo.upsert_uom("COKE", "Nos", 1.0, true).await.unwrap();
        repo.upsert_price("COKE", "Retail", None, Money::from_cents(350))
            .await
            .unwrap();

        let catalog: &dyn CatalogService = &repo;
        assert_eq!(catalog.item_uoms("COKE").await.unwrap(), vec!["Nos"]);
        assert_eq!(
            catalog.item_price("COKE", "Retail", None).await.unwrap(),
            Some(Money::from_cents(350))
        );
        assert_eq!(catalog.valuation_rate("COKE", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_local_discount() {
        let input = DiscountInput {
            sale_price: Money::from_major(100),
            discount_type: DiscountType::Percentage,
            discount_percentage: Percentage::from_whole(10),
            discount_amount: Money::zero(),
        };
        assert_eq!(
            LocalDiscount.price_after_discount(&input).await.unwrap(),
            Money::from_major(90)
        );
    }
}
