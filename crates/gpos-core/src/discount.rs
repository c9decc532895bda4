//! # Discount Calculator
//!
//! Maps a sale price and a row's discount fields to the price after discount.
//!
//! ```text
//! ┌────────────────┐     ┌──────────────────────────┐     ┌──────────────────┐
//! │ DiscountInput  │ ──► │ compute()                │ ──► │ price_after_     │
//! │ sale_price     │     │  Percentage: p*(1-x/100) │     │ discount         │
//! │ discount_type  │     │  Amount:     p - amt     │     └──────────────────┘
//! │ pct / amount   │     │  None:       p           │
//! └────────────────┘     └──────────────────────────┘
//! ```
//!
//! Callers check the sale price first (see [`DiscountInput::for_row`]).
//! `compute` refuses a zero price as well.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{DiscountType, LineItemRow, Percentage};

/// Everything the discount step needs, detached from the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscountInput {
    pub sale_price: Money,
    pub discount_type: DiscountType,
    pub discount_percentage: Percentage,
    pub discount_amount: Money,
}

impl DiscountInput {
    /// Builds the input from a row, using `sale_price` in place of the row's
    /// own price (the price a resolution just produced).
    pub fn with_price(row: &LineItemRow, sale_price: Money) -> CoreResult<Self> {
        if sale_price.is_zero() {
            return Err(CoreError::ZeroSalePrice);
        }
        Ok(DiscountInput {
            sale_price,
            discount_type: row.discount_type,
            discount_percentage: row.discount_percentage,
            discount_amount: row.discount_amount,
        })
    }

    /// Builds the input from the row's current sale price.
    ///
    /// Fails with [`CoreError::ZeroSalePrice`] when the row has no price or a
    /// price of zero.
    pub fn for_row(row: &LineItemRow) -> CoreResult<Self> {
        let price = row.discountable_price().ok_or(CoreError::ZeroSalePrice)?;
        Self::with_price(row, price)
    }
}

/// Computes the price after discount.
///
/// ## Example
/// ```rust
/// use gpos_core::discount::{compute, DiscountInput};
/// use gpos_core::{DiscountType, Money, Percentage};
///
/// let input = DiscountInput {
///     sale_price: Money::from_major(100),
///     discount_type: DiscountType::Amount,
///     discount_percentage: Percentage::zero(),
///     discount_amount: Money::from_major(15),
/// };
/// assert_eq!(compute(&input).unwrap(), Money::from_major(85));
/// ```
///
/// ## Errors
/// - [`CoreError::ZeroSalePrice`] if the sale price is zero
/// - [`CoreError::DiscountExceedsPrice`] if the result would be negative
pub fn compute(input: &DiscountInput) -> CoreResult<Money> {
    if input.sale_price.is_zero() {
        return Err(CoreError::ZeroSalePrice);
    }

    let result = match input.discount_type {
        DiscountType::Percentage => input
            .sale_price
            .apply_percentage_discount(input.discount_percentage),
        DiscountType::Amount => input.sale_price - input.discount_amount,
        DiscountType::None => input.sale_price,
    };

    if result.is_negative() {
        return Err(CoreError::DiscountExceedsPrice {
            sale_price: input.sale_price,
            result,
        });
    }

    Ok(result)
}
