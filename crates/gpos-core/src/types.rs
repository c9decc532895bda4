//! # Domain Types
//!
//! Core domain types shared by the pricing engine and the reconciliation flow.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌─────────────────┐  │
//! │  │  LineItemRow    │   │ OfflineInvoiceRecord │   │     Notice      │  │
//! │  │  ─────────────  │   │  ──────────────────  │   │  ─────────────  │  │
//! │  │  item_code      │   │  name                │   │  title          │  │
//! │  │  uom            │   │  invoice_number      │   │  message        │  │
//! │  │  sale_price     │   │  json_dump           │   │  indicator      │  │
//! │  │  cost_price     │   │  manually_submitted  │   └─────────────────┘  │
//! │  │  discount_*     │   │  clearing_status     │                         │
//! │  │  price_after_…  │   └──────────────────────┘                         │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌──────────────────────┐  │
//! │  │  Percentage     │   │  DiscountType   │   │ SalesInvoicePayload  │  │
//! │  │  bps (u32)      │   │  Percentage     │   │  JSON object, kept   │  │
//! │  │  1250 = 12.5%   │   │  Amount / None  │   │  verbatim            │  │
//! │  └─────────────────┘   └─────────────────┘   └──────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Serde names follow the ERP doctype field names so rows and records can be
//! exchanged with the form frontend and the ERP without a mapping layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{parse_scaled, Money};

// =============================================================================
// Percentage
// =============================================================================

/// A percentage in basis points (1 bp = 0.01%).
///
/// ## Why Basis Points?
/// 1250 bps = 12.5%; integer math keeps the discount exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percentage(u32);

impl Percentage {
    /// Creates a percentage from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percentage(bps)
    }

    /// Creates a percentage from a whole number (`10` = 10%).
    #[inline]
    pub const fn from_whole(pct: u32) -> Self {
        Percentage(pct * 100)
    }

    /// Parses a decimal percentage as sent by the ERP (`"12.5"` = 12.5%).
    pub fn parse_decimal(input: &str) -> Result<Self, ValidationError> {
        let bps = parse_scaled(input, 2).ok_or_else(|| ValidationError::InvalidFormat {
            field: "discount_percentage".to_string(),
            reason: format!("'{}' is not a decimal number", input.trim()),
        })?;

        u32::try_from(bps)
            .map(Percentage)
            .map_err(|_| ValidationError::OutOfRange {
                field: "discount_percentage".to_string(),
                min: 0,
                max: u32::MAX as i64 / 100,
            })
    }

    /// Returns the percentage in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percentage(0)
    }

    /// Checks if the percentage is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Renders the percentage as a decimal string (`"12.50"`).
    pub fn to_decimal_string(&self) -> String {
        format!("{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.to_decimal_string())
    }
}

// =============================================================================
// Discount Type
// =============================================================================

/// How a promotion row discounts its sale price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum DiscountType {
    /// `sale_price * (1 - pct/100)`
    #[serde(rename = "Discount Percentage")]
    Percentage,
    /// `sale_price - amount`
    #[serde(rename = "Discount Amount")]
    Amount,
    /// Sale price passes through unchanged.
    #[default]
    #[serde(rename = "")]
    #[serde(alias = "None")]
    #[ts(rename = "")]
    None,
}

impl DiscountType {
    /// Value of the select field on the ERP side.
    pub fn as_erp_str(&self) -> &'static str {
        match self {
            DiscountType::Percentage => "Discount Percentage",
            DiscountType::Amount => "Discount Amount",
            DiscountType::None => "",
        }
    }
}

impl std::str::FromStr for DiscountType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Discount Percentage" | "percentage" => Ok(DiscountType::Percentage),
            "Discount Amount" | "amount" | "fixed" => Ok(DiscountType::Amount),
            "" | "None" | "none" => Ok(DiscountType::None),
            other => Err(ValidationError::InvalidFormat {
                field: "discount_type".to_string(),
                reason: format!("unknown discount type '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Line Item Row
// =============================================================================

/// Identifier of a row inside a promotion's item table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RowId(u32);

impl RowId {
    /// Creates a row id from its table index.
    #[inline]
    pub const fn new(idx: u32) -> Self {
        RowId(idx)
    }

    /// Returns the table index.
    #[inline]
    pub const fn idx(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a row is in its pricing lifecycle.
///
/// ```text
///   Empty ──item──► ItemSelected ──price──► Priced ──discount──► Discounted
///                        ▲                                          │
///                        └──────────────── item edit ───────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum RowPhase {
    /// No item chosen.
    #[default]
    Empty,
    /// Item chosen, unit of measure cleared, price pending.
    ItemSelected,
    /// Sale and cost price written.
    Priced,
    /// `price_after_discount` written.
    Discounted,
}

/// One line of a promotion's item table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItemRow {
    pub id: RowId,
    pub item_code: Option<String>,
    pub uom: Option<String>,
    /// Overwritten by the price lookup only.
    pub sale_price: Option<Money>,
    /// Overwritten by the valuation lookup; 0 when the lookup finds nothing.
    pub cost_price: Money,
    pub discount_type: DiscountType,
    pub discount_percentage: Percentage,
    /// Field name carries the ERP's double underscore.
    #[serde(rename = "discount__amount")]
    pub discount_amount: Money,
    /// Written only by the discount result path.
    pub price_after_discount: Option<Money>,
    pub phase: RowPhase,
    /// Bumped by item / uom edits. Price and valuation results carry the
    /// value they were issued under and are dropped on mismatch.
    pub pricing_revision: u64,
    /// Bumped by any edit that (re)starts a discount computation.
    pub discount_revision: u64,
}

impl LineItemRow {
    /// Creates an empty row.
    pub fn new(id: RowId) -> Self {
        LineItemRow {
            id,
            item_code: None,
            uom: None,
            sale_price: None,
            cost_price: Money::zero(),
            discount_type: DiscountType::None,
            discount_percentage: Percentage::zero(),
            discount_amount: Money::zero(),
            price_after_discount: None,
            phase: RowPhase::Empty,
            pricing_revision: 0,
            discount_revision: 0,
        }
    }

    /// Sale price if it can be discounted (present and nonzero).
    pub fn discountable_price(&self) -> Option<Money> {
        self.sale_price.filter(|p| !p.is_zero())
    }
}

// =============================================================================
// Offline Invoice Record
// =============================================================================

/// Default `custom_type` of a captured record.
pub const DEFAULT_INVOICE_KIND: &str = "Sales Invoice";

/// A sale captured without connectivity, waiting to be reconciled
/// (doctype "Invoice Unsynced").
///
/// ## Lifecycle
/// ```text
/// capture ──► unsynced ──submit ok──► manually_submitted = clearing_status = true
///                 │                          (terminal, never reverts)
///                 └── duplicate / failure ──► unchanged
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OfflineInvoiceRecord {
    /// Record identifier.
    pub name: String,

    /// When the sale was captured at the till.
    #[ts(as = "String")]
    pub date_time: DateTime<Utc>,

    /// Client-generated idempotency key.
    pub invoice_number: Option<String>,

    /// Serialized transaction payload.
    #[serde(rename = "custom_json_dump")]
    pub json_dump: Option<String>,

    #[serde(rename = "custom_manually_submitted")]
    pub manually_submitted: bool,

    pub clearing_status: bool,

    #[serde(rename = "custom_type")]
    pub kind: String,

    /// Last response the till got from the ERP, kept for diagnosis.
    #[serde(rename = "custom_api_response")]
    pub api_response: Option<String>,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl OfflineInvoiceRecord {
    /// True once the record reached the system of record.
    pub fn is_synced(&self) -> bool {
        self.clearing_status
    }

    /// Position of this record in the pending queue.
    pub fn cursor(&self) -> PendingCursor {
        PendingCursor {
            date_time: self.date_time,
            name: self.name.clone(),
        }
    }
}

/// Keyset position in the pending queue, ordered by `(date_time, name)`.
///
/// Paging with the last record seen skips records that stay uncleared
/// after an attempt (already reconciled, invalid, failed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCursor {
    pub date_time: DateTime<Utc>,
    pub name: String,
}

// =============================================================================
// Sales Invoice Payload
// =============================================================================

/// The captured transaction, as a JSON object.
///
/// Known keys (`customer_name`, `items`, `payments`, `discount_amount`,
/// `unique_id`, `offline_invoice_number`, `pos_profile`, `pos_shift`,
/// `cashier`, ...) are readable through accessors; every key, known or not,
/// is forwarded to the ERP untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SalesInvoicePayload(Map<String, Value>);

impl SalesInvoicePayload {
    /// Wraps an already parsed JSON object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        SalesInvoicePayload(map)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.str_field("customer_name")
    }

    pub fn offline_invoice_number(&self) -> Option<&str> {
        self.str_field("offline_invoice_number")
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.str_field("unique_id")
    }

    /// Number of line items in the payload.
    pub fn item_count(&self) -> usize {
        self.0
            .get("items")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Flattens the payload into form fields the way the ERP's RPC layer
    /// expects: strings verbatim, everything else JSON-encoded, nulls dropped.
    pub fn to_form_fields(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }
}

// =============================================================================
// Notices
// =============================================================================

/// Colour of an operator notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum Indicator {
    Blue,
    Green,
    Orange,
    Red,
}

/// A modal message shown to the operator.
///
/// `message` may contain line breaks (`\n`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Notice {
    pub title: Option<String>,
    pub message: String,
    pub indicator: Indicator,
}

impl Notice {
    /// Informational notice without a title.
    pub fn info(message: impl Into<String>) -> Self {
        Notice {
            title: None,
            message: message.into(),
            indicator: Indicator::Blue,
        }
    }

    pub fn success(message: impl Into<String>) -> Self {
        Notice {
            title: None,
            message: message.into(),
            indicator: Indicator::Green,
        }
    }

    pub fn warning(title: impl Into<String>, message: impl Into<String>) -> Self {
        Notice {
            title: Some(title.into()),
            message: message.into(),
            indicator: Indicator::Orange,
        }
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Notice {
            title: Some(title.into()),
            message: message.into(),
            indicator: Indicator::Red,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_percentage_parsing() {
        assert_eq!(Percentage::parse_decimal("12.5").unwrap().bps(), 1250);
        assert_eq!(Percentage::parse_decimal("10").unwrap(), Percentage::from_whole(10));
        assert!(Percentage::parse_decimal("-5").is_err());
        assert!(Percentage::parse_decimal("ten").is_err());
        assert_eq!(Percentage::from_bps(1250).to_string(), "12.50%");
    }

    #[test]
    fn test_discount_type_erp_names() {
        let json = serde_json::to_string(&DiscountType::Percentage).unwrap();
        assert_eq!(json, "\"Discount Percentage\"");

        let parsed: DiscountType = serde_json::from_str("\"Discount Amount\"").unwrap();
        assert_eq!(parsed, DiscountType::Amount);

        let parsed: DiscountType = serde_json::from_str("\"\"").unwrap();
        assert_eq!(parsed, DiscountType::None);
        let parsed: DiscountType = serde_json::from_str("\"None\"").unwrap();
        assert_eq!(parsed, DiscountType::None);

        assert_eq!("fixed".parse::<DiscountType>().unwrap(), DiscountType::Amount);
        assert!("half off".parse::<DiscountType>().is_err());
    }

    #[test]
    fn test_discount_type_ts_matches_wire() {
        let decl = <DiscountType as TS>::decl();
        assert!(decl.contains("\"Discount Percentage\""));
        assert!(decl.contains("\"\""));
        assert!(!decl.contains("\"None\""));
    }

    #[test]
    fn test_row_uses_erp_field_names() {
        let row = LineItemRow::new(RowId::new(1));
        let value = serde_json::to_value(&row).unwrap();
        assert!(value.get("discount__amount").is_some());
        assert!(value.get("price_after_discount").is_some());
        assert_eq!(value["phase"], "empty");
    }

    #[test]
    fn test_discountable_price() {
        let mut row = LineItemRow::new(RowId::new(1));
        assert_eq!(row.discountable_price(), None);

        row.sale_price = Some(Money::zero());
        assert_eq!(row.discountable_price(), None);

        row.sale_price = Some(Money::from_major(100));
        assert_eq!(row.discountable_price(), Some(Money::from_major(100)));
    }

    #[test]
    fn test_payload_accessors_and_form_fields() {
        let value = json!({
            "customer_name": "Walk-in",
            "items": [{"item_code": "COKE", "quantity": 2, "rate": 3.5}],
            "offline_invoice_number": " OFF-001 ",
            "PIH": null,
            "phase": 1
        });
        let payload = match value {
            Value::Object(map) => SalesInvoicePayload::from_map(map),
            _ => unreachable!(),
        };

        assert_eq!(payload.customer_name(), Some("Walk-in"));
        assert_eq!(payload.offline_invoice_number(), Some("OFF-001"));
        assert_eq!(payload.unique_id(), None);
        assert_eq!(payload.item_count(), 1);

        let fields = payload.to_form_fields();
        assert!(fields.contains(&("customer_name".to_string(), "Walk-in".to_string())));
        assert!(fields.contains(&("phase".to_string(), "1".to_string())));
        assert!(fields.iter().all(|(k, _)| k != "PIH"));
        let items = fields.iter().find(|(k, _)| k == "items").unwrap();
        assert!(items.1.starts_with('['));
    }

    #[test]
    fn test_notice_constructors() {
        assert_eq!(Notice::info("x").indicator, Indicator::Blue);
        assert_eq!(Notice::success("x").indicator, Indicator::Green);
        let warn = Notice::warning("Missing Price List", "set one");
        assert_eq!(warn.title.as_deref(), Some("Missing Price List"));
        assert_eq!(warn.indicator, Indicator::Orange);
        assert_eq!(Notice::error("t", "m").indicator, Indicator::Red);
    }
}
