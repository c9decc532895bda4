//! # Promotion Aggregate
//!
//! The promotion document and its item table, with every row transition the
//! pricing flow can make.
//!
//! ## Edit → Request → Result
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  set_item_code ──┐                           ┌── apply_pricing ──┐      │
//! │  set_uom ────────┼─► PricingRequest ──(I/O)──┤                   │      │
//! │                  │   (pricing_revision)      └── apply_cost      │      │
//! │                  │                                               ▼      │
//! │  set_discount_* ─┴─────────────────────► DiscountRequest ──(I/O)──┐     │
//! │                                          (discount_revision)      │     │
//! │                                                                   ▼     │
//! │                                                        apply_discount   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing here performs I/O. An edit mutates the row and hands back a
//! request ticket; whoever runs the lookup brings the result back together
//! with the ticket's revision. A result whose revision no longer matches the
//! row is dropped, so a slow lookup for an old item can never overwrite the
//! price of the item the operator picked afterwards.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::discount::DiscountInput;
use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{DiscountType, LineItemRow, Percentage, RowId, RowPhase};

// =============================================================================
// Request Tickets
// =============================================================================

/// A price + valuation lookup to run for one row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricingRequest {
    pub row: RowId,
    pub revision: u64,
    pub item_code: String,
    pub price_list: String,
    pub uom: Option<String>,
}

/// A discount computation to run for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscountRequest {
    pub row: RowId,
    pub revision: u64,
    pub input: DiscountInput,
}

/// What happened to a sale-price result.
#[derive(Debug)]
pub enum PricingOutcome {
    /// The row moved on since the lookup was issued; nothing written.
    Stale,
    /// The price list has no price for the item; nothing written.
    NoPrice,
    /// Sale price written. The chained discount step, or the reason it
    /// cannot run.
    Applied { discount: CoreResult<DiscountRequest> },
}

// =============================================================================
// Promotion
// =============================================================================

/// A promotion document: a price list and an ordered item table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Promotion {
    #[serde(rename = "custom_price_list")]
    price_list: Option<String>,
    #[serde(rename = "item_table")]
    rows: BTreeMap<RowId, LineItemRow>,
    next_row: u32,
}

impl Promotion {
    /// Creates an empty promotion.
    pub fn new(price_list: Option<String>) -> Self {
        Promotion {
            price_list: price_list.filter(|p| !p.trim().is_empty()),
            rows: BTreeMap::new(),
            next_row: 1,
        }
    }

    pub fn price_list(&self) -> Option<&str> {
        self.price_list.as_deref()
    }

    /// Changes the price list. Existing rows keep their prices until edited.
    pub fn set_price_list(&mut self, price_list: Option<String>) {
        self.price_list = price_list.filter(|p| !p.trim().is_empty());
    }

    /// Appends an empty row and returns its id.
    pub fn add_row(&mut self) -> RowId {
        let id = RowId::new(self.next_row.max(1));
        self.next_row = id.idx() + 1;
        self.rows.insert(id, LineItemRow::new(id));
        id
    }

    pub fn remove_row(&mut self, id: RowId) -> CoreResult<LineItemRow> {
        self.rows.remove(&id).ok_or(CoreError::RowNotFound(id))
    }

    pub fn row(&self, id: RowId) -> Option<&LineItemRow> {
        self.rows.get(&id)
    }

    /// Rows in table order.
    pub fn rows(&self) -> impl Iterator<Item = &LineItemRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn row_mut(&mut self, id: RowId) -> CoreResult<&mut LineItemRow> {
        self.rows.get_mut(&id).ok_or(CoreError::RowNotFound(id))
    }

    // =========================================================================
    // Edits
    // =========================================================================

    /// Sets the row's item.
    ///
    /// The unit of measure is cleared unconditionally, even when the same
    /// item is picked again. The edit is applied before the price list is
    /// checked, so `Err(MissingPriceList)` leaves the row in `ItemSelected`
    /// with no lookup to run.
    ///
    /// Returns `Ok(None)` when the item was cleared.
    pub fn set_item_code(
        &mut self,
        id: RowId,
        item_code: Option<String>,
    ) -> CoreResult<Option<PricingRequest>> {
        let price_list = self.price_list.clone();
        let row = self.row_mut(id)?;

        row.item_code = item_code.filter(|c| !c.trim().is_empty());
        row.uom = None;
        row.pricing_revision += 1;
        row.discount_revision += 1;

        let Some(item_code) = row.item_code.clone() else {
            row.phase = RowPhase::Empty;
            return Ok(None);
        };
        row.phase = RowPhase::ItemSelected;

        let price_list = price_list.ok_or(CoreError::MissingPriceList)?;
        Ok(Some(PricingRequest {
            row: id,
            revision: row.pricing_revision,
            item_code,
            price_list,
            uom: None,
        }))
    }

    /// Sets the row's unit of measure.
    ///
    /// Resolution restarts only when the row has an item; with an item but no
    /// price list the edit is kept and `Err(MissingPriceList)` is returned.
    pub fn set_uom(&mut self, id: RowId, uom: Option<String>) -> CoreResult<Option<PricingRequest>> {
        let price_list = self.price_list.clone();
        let row = self.row_mut(id)?;

        row.uom = uom.filter(|u| !u.trim().is_empty());
        row.pricing_revision += 1;

        let Some(item_code) = row.item_code.clone() else {
            return Ok(None);
        };

        let price_list = price_list.ok_or(CoreError::MissingPriceList)?;
        row.discount_revision += 1;
        row.phase = RowPhase::ItemSelected;

        Ok(Some(PricingRequest {
            row: id,
            revision: row.pricing_revision,
            item_code,
            price_list,
            uom: row.uom.clone(),
        }))
    }

    pub fn set_discount_type(
        &mut self,
        id: RowId,
        discount_type: DiscountType,
    ) -> CoreResult<DiscountRequest> {
        self.edit_discount(id, |row| row.discount_type = discount_type)
    }

    pub fn set_discount_percentage(
        &mut self,
        id: RowId,
        pct: Percentage,
    ) -> CoreResult<DiscountRequest> {
        self.edit_discount(id, |row| row.discount_percentage = pct)
    }

    pub fn set_discount_amount(&mut self, id: RowId, amount: Money) -> CoreResult<DiscountRequest> {
        self.edit_discount(id, |row| row.discount_amount = amount)
    }

    /// Applies a discount field edit and prepares the discount step from the
    /// row's current sale price. The field is written even when the price
    /// check fails.
    fn edit_discount(
        &mut self,
        id: RowId,
        edit: impl FnOnce(&mut LineItemRow),
    ) -> CoreResult<DiscountRequest> {
        let row = self.row_mut(id)?;
        edit(row);
        row.discount_revision += 1;

        let input = DiscountInput::for_row(row)?;
        Ok(DiscountRequest {
            row: id,
            revision: row.discount_revision,
            input,
        })
    }

    // =========================================================================
    // Results
    // =========================================================================

    /// Brings back a sale-price lookup.
    ///
    /// On a hit the price is written and the discount step is prepared from
    /// *this* price, with a fresh discount revision so any discount already
    /// in flight for the row is superseded.
    pub fn apply_pricing(
        &mut self,
        id: RowId,
        revision: u64,
        sale_price: Option<Money>,
    ) -> CoreResult<PricingOutcome> {
        let row = self.row_mut(id)?;
        if row.pricing_revision != revision {
            return Ok(PricingOutcome::Stale);
        }
        let Some(price) = sale_price else {
            return Ok(PricingOutcome::NoPrice);
        };

        row.sale_price = Some(price);
        row.phase = RowPhase::Priced;
        row.discount_revision += 1;

        let discount = DiscountInput::with_price(row, price).map(|input| DiscountRequest {
            row: id,
            revision: row.discount_revision,
            input,
        });
        Ok(PricingOutcome::Applied { discount })
    }

    /// Brings back a valuation lookup. A miss writes 0.
    ///
    /// Returns `false` if the result was stale and dropped.
    pub fn apply_cost(&mut self, id: RowId, revision: u64, cost: Option<Money>) -> CoreResult<bool> {
        let row = self.row_mut(id)?;
        if row.pricing_revision != revision {
            return Ok(false);
        }
        row.cost_price = cost.unwrap_or_default();
        Ok(true)
    }

    /// Brings back a discount computation.
    ///
    /// Returns `false` if the result was stale and dropped.
    pub fn apply_discount(&mut self, id: RowId, revision: u64, price: Money) -> CoreResult<bool> {
        let row = self.row_mut(id)?;
        if row.discount_revision != revision {
            return Ok(false);
        }
        row.price_after_discount = Some(price);
        row.phase = RowPhase::Discounted;
        Ok(true)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn promo() -> (Promotion, RowId) {
        let mut p = Promotion::new(Some("Standard Selling".into()));
        let id = p.add_row();
        (p, id)
    }

    #[test]
    fn test_rows_keep_table_order() {
        let mut p = Promotion::new(None);
        let a = p.add_row();
        let b = p.add_row();
        let c = p.add_row();
        p.remove_row(b).unwrap();
        let ids: Vec<_> = p.rows().map(|r| r.id).collect();
        assert_eq!(ids, vec![a, c]);
        assert!(matches!(p.remove_row(b), Err(CoreError::RowNotFound(_))));
    }

    #[test]
    fn test_item_edit_clears_uom_even_for_same_item() {
        let (mut p, id) = promo();
        p.set_item_code(id, Some("COKE".into())).unwrap();
        p.set_uom(id, Some("Box".into())).unwrap();
        assert_eq!(p.row(id).unwrap().uom.as_deref(), Some("Box"));

        let req = p.set_item_code(id, Some("COKE".into())).unwrap().unwrap();
        assert_eq!(p.row(id).unwrap().uom, None);
        assert_eq!(req.uom, None);
        assert_eq!(p.row(id).unwrap().phase, RowPhase::ItemSelected);
    }

    #[test]
    fn test_item_edit_without_price_list() {
        let mut p = Promotion::new(None);
        let id = p.add_row();

        let err = p.set_item_code(id, Some("COKE".into())).unwrap_err();
        assert!(matches!(err, CoreError::MissingPriceList));

        let row = p.row(id).unwrap();
        assert_eq!(row.item_code.as_deref(), Some("COKE"));
        assert_eq!(row.phase, RowPhase::ItemSelected);
        assert_eq!(row.sale_price, None);
    }

    #[test]
    fn test_uom_edit_rules() {
        let mut p = Promotion::new(None);
        let id = p.add_row();

        // No item: nothing to resolve, no warning.
        assert!(p.set_uom(id, Some("Nos".into())).unwrap().is_none());

        // Item but no price list: warning.
        let _ = p.set_item_code(id, Some("COKE".into()));
        assert!(matches!(
            p.set_uom(id, Some("Nos".into())),
            Err(CoreError::MissingPriceList)
        ));

        p.set_price_list(Some("Retail".into()));
        let req = p.set_uom(id, Some("Box".into())).unwrap().unwrap();
        assert_eq!(req.price_list, "Retail");
        assert_eq!(req.uom.as_deref(), Some("Box"));
    }

    #[test]
    fn test_pricing_chains_discount_from_resolved_price() {
        let (mut p, id) = promo();
        p.set_discount_type(id, DiscountType::Percentage).unwrap_err();
        let _ = p.set_discount_percentage(id, Percentage::from_whole(10));

        let req = p.set_item_code(id, Some("COKE".into())).unwrap().unwrap();
        let outcome = p
            .apply_pricing(id, req.revision, Some(Money::from_major(100)))
            .unwrap();

        let PricingOutcome::Applied { discount } = outcome else {
            panic!("expected price to apply");
        };
        let discount = discount.unwrap();
        assert_eq!(discount.input.sale_price, Money::from_major(100));
        assert_eq!(discount.input.discount_type, DiscountType::Percentage);
        assert_eq!(p.row(id).unwrap().phase, RowPhase::Priced);

        assert!(p
            .apply_discount(id, discount.revision, Money::from_major(90))
            .unwrap());
        let row = p.row(id).unwrap();
        assert_eq!(row.price_after_discount, Some(Money::from_major(90)));
        assert_eq!(row.phase, RowPhase::Discounted);
    }

    #[test]
    fn test_zero_price_blocks_chained_discount() {
        let (mut p, id) = promo();
        let req = p.set_item_code(id, Some("FREEBIE".into())).unwrap().unwrap();
        let outcome = p.apply_pricing(id, req.revision, Some(Money::zero())).unwrap();
        assert!(matches!(
            outcome,
            PricingOutcome::Applied {
                discount: Err(CoreError::ZeroSalePrice)
            }
        ));
        assert_eq!(p.row(id).unwrap().sale_price, Some(Money::zero()));
        assert_eq!(p.row(id).unwrap().price_after_discount, None);
    }

    #[test]
    fn test_price_miss_writes_nothing() {
        let (mut p, id) = promo();
        let req = p.set_item_code(id, Some("COKE".into())).unwrap().unwrap();
        p.apply_pricing(id, req.revision, Some(Money::from_major(5)))
            .unwrap();

        let req = p.set_uom(id, Some("Box".into())).unwrap().unwrap();
        let outcome = p.apply_pricing(id, req.revision, None).unwrap();
        assert!(matches!(outcome, PricingOutcome::NoPrice));
        assert_eq!(p.row(id).unwrap().sale_price, Some(Money::from_major(5)));
    }

    #[test]
    fn test_cost_miss_sets_zero() {
        let (mut p, id) = promo();
        let req = p.set_item_code(id, Some("COKE".into())).unwrap().unwrap();
        assert!(p.apply_cost(id, req.revision, Some(Money::from_cents(250))).unwrap());
        assert_eq!(p.row(id).unwrap().cost_price, Money::from_cents(250));

        let req = p.set_uom(id, Some("Box".into())).unwrap().unwrap();
        assert!(p.apply_cost(id, req.revision, None).unwrap());
        assert_eq!(p.row(id).unwrap().cost_price, Money::zero());
    }

    #[test]
    fn test_stale_results_are_dropped() {
        let (mut p, id) = promo();
        let first = p.set_item_code(id, Some("COKE".into())).unwrap().unwrap();
        let second = p.set_item_code(id, Some("PEPSI".into())).unwrap().unwrap();

        // The newer lookup lands first, the older one afterwards.
        p.apply_pricing(id, second.revision, Some(Money::from_major(7)))
            .unwrap();
        let outcome = p
            .apply_pricing(id, first.revision, Some(Money::from_major(9)))
            .unwrap();
        assert!(matches!(outcome, PricingOutcome::Stale));
        assert!(!p.apply_cost(id, first.revision, Some(Money::from_major(1))).unwrap());
        assert_eq!(p.row(id).unwrap().sale_price, Some(Money::from_major(7)));
    }

    #[test]
    fn test_discount_edit_supersedes_inflight_discount() {
        let (mut p, id) = promo();
        let req = p.set_item_code(id, Some("COKE".into())).unwrap().unwrap();
        let PricingOutcome::Applied { discount } = p
            .apply_pricing(id, req.revision, Some(Money::from_major(100)))
            .unwrap()
        else {
            panic!("expected price to apply");
        };
        let old = discount.unwrap();

        let new = p
            .set_discount_amount(id, Money::from_major(15))
            .unwrap();
        assert!(new.revision > old.revision);

        assert!(p.apply_discount(id, new.revision, Money::from_major(85)).unwrap());
        assert!(!p.apply_discount(id, old.revision, Money::from_major(100)).unwrap());
        assert_eq!(
            p.row(id).unwrap().price_after_discount,
            Some(Money::from_major(85))
        );
    }

    #[test]
    fn test_discount_edit_keeps_inflight_price() {
        let (mut p, id) = promo();
        let req = p.set_item_code(id, Some("COKE".into())).unwrap().unwrap();

        // Operator touches the discount before the price arrives.
        assert!(p.set_discount_type(id, DiscountType::Amount).is_err());

        let outcome = p
            .apply_pricing(id, req.revision, Some(Money::from_major(100)))
            .unwrap();
        assert!(matches!(outcome, PricingOutcome::Applied { discount: Ok(_) }));
    }

    #[test]
    fn test_clearing_item_empties_row() {
        let (mut p, id) = promo();
        p.set_item_code(id, Some("COKE".into())).unwrap();
        assert!(p.set_item_code(id, None).unwrap().is_none());
        assert_eq!(p.row(id).unwrap().phase, RowPhase::Empty);
    }
}
