//! # Validation Module
//!
//! Local checks that run before any remote call is made.
//!
//! ## Submission Preconditions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  OfflineInvoiceRecord                                                   │
//! │       │                                                                 │
//! │       ├── json_dump empty?           → "JSON Dump is empty!"            │
//! │       ├── json_dump not an object?   → "Invalid JSON format in ..."     │
//! │       ├── invoice_number missing?    → "Offline Invoice Number missing."│
//! │       ├── payload names other number? → mismatch                        │
//! │       │                                                                 │
//! │       └── OK → ValidatedSubmission { invoice_number, payload }          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The order of the checks is fixed: an operator who fixes one problem sees
//! the next one, never two at once.

use serde_json::Value;

use crate::error::ValidationError;
use crate::types::{OfflineInvoiceRecord, SalesInvoicePayload};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest value the ERP accepts in a Data field.
pub const MAX_DATA_FIELD_LEN: usize = 140;

/// A record that passed every local precondition.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedSubmission {
    pub invoice_number: String,
    pub payload: SalesInvoicePayload,
}

// =============================================================================
// Payload
// =============================================================================

/// Parses a JSON dump into a payload.
///
/// ## Example
/// ```rust
/// use gpos_core::validation::parse_payload;
///
/// assert!(parse_payload(r#"{"customer_name": "Walk-in"}"#).is_ok());
/// assert!(parse_payload("").is_err());
/// assert!(parse_payload("{not json").is_err());
/// assert!(parse_payload("[1, 2]").is_err());
/// ```
pub fn parse_payload(json_dump: &str) -> ValidationResult<SalesInvoicePayload> {
    if json_dump.trim().is_empty() {
        return Err(ValidationError::EmptyJsonDump);
    }

    match serde_json::from_str::<Value>(json_dump) {
        Ok(Value::Object(map)) => Ok(SalesInvoicePayload::from_map(map)),
        Ok(other) => Err(ValidationError::InvalidJson {
            reason: format!("expected a JSON object, found {}", json_kind(&other)),
        }),
        Err(e) => Err(ValidationError::InvalidJson {
            reason: e.to_string(),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// =============================================================================
// Identifiers
// =============================================================================

/// Validates an offline invoice number and returns it trimmed.
pub fn validate_invoice_number(number: Option<&str>) -> ValidationResult<String> {
    let number = number.map(str::trim).unwrap_or_default();

    if number.is_empty() {
        return Err(ValidationError::MissingInvoiceNumber);
    }

    if number.len() > MAX_DATA_FIELD_LEN {
        return Err(ValidationError::InvalidFormat {
            field: "invoice_number".to_string(),
            reason: format!("must be at most {} characters", MAX_DATA_FIELD_LEN),
        });
    }

    Ok(number.to_string())
}

// =============================================================================
// Offline Record
// =============================================================================

/// Runs every submission precondition on an offline record.
///
/// ## Errors
/// The first failing check, in this order: [`ValidationError::EmptyJsonDump`],
/// [`ValidationError::InvalidJson`], [`ValidationError::MissingInvoiceNumber`],
/// [`ValidationError::InvoiceNumberMismatch`].
pub fn validate_offline_record(record: &OfflineInvoiceRecord) -> ValidationResult<ValidatedSubmission> {
    let payload = parse_payload(record.json_dump.as_deref().unwrap_or_default())?;
    let invoice_number = validate_invoice_number(record.invoice_number.as_deref())?;

    if let Some(in_payload) = payload.offline_invoice_number() {
        if in_payload != invoice_number {
            return Err(ValidationError::InvoiceNumberMismatch {
                record: invoice_number,
                payload: in_payload.to_string(),
            });
        }
    }

    Ok(ValidatedSubmission {
        invoice_number,
        payload,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
