//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  The ERP hands prices over as JSON numbers:                             │
//! │    {"price": 19.99}  →  19.989999999999998 as f64  ❌                   │
//! │                                                                         │
//! │  A promotion row chains three derived values:                           │
//! │    sale_price ──► discount ──► price_after_discount                     │
//! │  Float drift would leak into every one of them.                         │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents, parsed from the decimal TEXT              │
//! │    "19.99" → 1999 cents, exactly                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use gpos_core::money::Money;
//!
//! let price = Money::from_cents(10000);             // 100.00
//! let discounted = price - Money::from_cents(1500); // 85.00
//! assert_eq!(discounted.cents(), 8500);
//!
//! let wire = Money::parse_decimal("19.99").unwrap();
//! assert_eq!(wire.cents(), 1999);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::Percentage;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents).
///
/// ## Design Decisions
/// - **i64 (signed)**: a discount can drive a price below zero, and the
///   calculator has to see that to reject it
/// - **Single field tuple struct**: Zero-cost abstraction over i64
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Item Price (ERP) ──► LineItemRow.sale_price ──┬──► price_after_discount│
/// │                                                │                        │
/// │  LineItemRow.discount_amount ──────────────────┘                        │
/// │                                                                         │
/// │  Bin valuation (ERP) ──► LineItemRow.cost_price                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use gpos_core::money::Money;
    ///
    /// let price = Money::from_cents(1099);
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from whole currency units.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major * 100)
    }

    /// Parses a decimal string as sent by the ERP (`"12.5"`, `"-3"`, `"0.125"`).
    ///
    /// Digits beyond the second decimal place are rounded half away from
    /// zero, the same way the ERP rounds currency fields. Exponent notation
    /// is rejected.
    ///
    /// ## Example
    /// ```rust
    /// use gpos_core::money::Money;
    ///
    /// assert_eq!(Money::parse_decimal("12.5").unwrap().cents(), 1250);
    /// assert_eq!(Money::parse_decimal("0.125").unwrap().cents(), 13);
    /// assert_eq!(Money::parse_decimal("-3").unwrap().cents(), -300);
    /// assert!(Money::parse_decimal("1e3").is_err());
    /// ```
    pub fn parse_decimal(input: &str) -> Result<Self, ValidationError> {
        parse_scaled(input, 2)
            .map(Money)
            .ok_or_else(|| ValidationError::InvalidFormat {
                field: "amount".to_string(),
                reason: format!("'{}' is not a decimal number", input.trim()),
            })
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Returns the absolute value.
    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Renders the value as a plain decimal string for the ERP wire format.
    ///
    /// ## Example
    /// ```rust
    /// use gpos_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(8500).to_decimal_string(), "85.00");
    /// assert_eq!(Money::from_cents(-5).to_decimal_string(), "-0.05");
    /// ```
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.major().abs(), self.cents_part())
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ## Arguments
    /// * `discount` - Discount as a [`Percentage`] (basis points internally)
    ///
    /// ## Example
    /// ```rust
    /// use gpos_core::money::Money;
    /// use gpos_core::types::Percentage;
    ///
    /// let price = Money::from_cents(10000); // 100.00
    /// let discounted = price.apply_percentage_discount(Percentage::from_whole(10));
    /// assert_eq!(discounted.cents(), 9000); // 90.00
    /// ```
    pub fn apply_percentage_discount(&self, discount: Percentage) -> Money {
        // Rounding: (amount * bps + 5000) / 10000
        let discount_amount = (self.0 as i128 * discount.bps() as i128 + 5000) / 10000;
        Money::from_cents(self.0 - discount_amount as i64)
    }
}

/// Parses `input` as a decimal with `scale` fractional digits kept.
///
/// Shared by [`Money`] (scale 2) and [`Percentage`] (scale 2 as well, since
/// basis points are hundredths of a percent).
pub(crate) fn parse_scaled(input: &str, scale: u32) -> Option<i64> {
    let s = input.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    let (int_part, frac_part) = match digits.split_once('.') {
        Some((i, f)) => (i, f),
        None => (digits, ""),
    };

    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    if !int_part.chars().all(|c| c.is_ascii_digit())
        || !frac_part.chars().all(|c| c.is_ascii_digit())
    {
        return None;
    }

    let factor = 10i64.checked_pow(scale)?;
    let whole: i64 = if int_part.is_empty() {
        0
    } else {
        int_part.parse().ok()?
    };

    let mut fraction: i64 = 0;
    let mut kept = 0;
    let mut round_up = false;
    for (i, c) in frac_part.chars().enumerate() {
        let digit = c.to_digit(10)? as i64;
        if (i as u32) < scale {
            fraction = fraction * 10 + digit;
            kept += 1;
        } else {
            round_up = i as u32 == scale && digit >= 5;
            break;
        }
    }
    while kept < scale {
        fraction *= 10;
        kept += 1;
    }

    let mut value = whole.checked_mul(factor)?.checked_add(fraction)?;
    if round_up {
        value = value.checked_add(1)?;
    }

    Some(if negative { -value } else { value })
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display is for logs and notices; the frontend does localised formatting.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_decimal_string())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

/// Multiplication by i64 (quantity).
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
