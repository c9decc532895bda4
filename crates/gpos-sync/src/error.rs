//! # Sync Error Types
//!
//! Error types for the pricing orchestration and reconciliation services.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Transport     │  │     Protocol            │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Connection     │  │  Deserialization        │ │
//! │  │  MissingDeviceId│  │  Timeout        │  │  UnexpectedResponse     │ │
//! │  │  InvalidUrl     │  │  Remote (HTTP)  │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │    Domain       │  │    Database     │                              │
//! │  │                 │  │                 │                              │
//! │  │  Core           │  │  Database       │                              │
//! │  │  Validation     │  │  NotFound       │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing in this crate retries on its own. [`SyncError::is_retryable`] only
//! tells the operator whether pressing the button again may help.

use serde_json::Value;
use thiserror::Error;

use gpos_core::{CoreError, ValidationError};
use gpos_db::DbError;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

// =============================================================================
// Remote Failure
// =============================================================================

/// A non-success answer from the ERP, with whatever diagnostics it carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteFailure {
    /// HTTP status, when the failure came over HTTP.
    pub status: Option<u16>,
    /// Structured server message list (`_server_messages`).
    pub server_messages: Vec<String>,
    /// Single message field.
    pub message: Option<String>,
    /// Raw response text.
    pub body: Option<String>,
}

/// Keys the ERP uses for a single error message, most specific first.
const MESSAGE_KEYS: &[&str] = &[
    "message",
    "message 400",
    "message 500",
    "message Fallback 500",
    "data",
    "exception",
];

impl RemoteFailure {
    /// Builds a failure from an HTTP status and response text.
    ///
    /// A JSON body is mined for `_server_messages` and a message field;
    /// the text is always kept as the last resort.
    pub fn from_response(status: u16, body: &str) -> Self {
        let mut failure = RemoteFailure {
            status: Some(status),
            body: Some(body.trim().to_string()).filter(|b| !b.is_empty()),
            ..Default::default()
        };

        if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
            if let Some(raw) = map.get("_server_messages") {
                failure.server_messages = parse_server_messages(raw);
            }
            failure.message = MESSAGE_KEYS
                .iter()
                .filter_map(|key| map.get(*key))
                .find_map(|v| match v {
                    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                    _ => None,
                });
        }

        failure
    }

    /// Most specific detail available: server messages, then the message
    /// field, then the raw text.
    pub fn detail(&self) -> Option<String> {
        if !self.server_messages.is_empty() {
            return Some(self.server_messages.join("\n"));
        }
        self.message.clone().or_else(|| self.body.clone())
    }
}

impl std::fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.status, self.detail()) {
            (Some(status), Some(detail)) => write!(f, "HTTP {}: {}", status, detail),
            (Some(status), None) => write!(f, "HTTP {}", status),
            (None, Some(detail)) => f.write_str(&detail),
            (None, None) => f.write_str("no details"),
        }
    }
}

/// `_server_messages` is a JSON-encoded list whose entries are themselves
/// JSON-encoded `{"message": ...}` objects, or plain strings.
fn parse_server_messages(raw: &Value) -> Vec<String> {
    let list = match raw {
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Array(items)) => items,
            _ => return vec![s.clone()],
        },
        Value::Array(items) => items.clone(),
        _ => return Vec::new(),
    };

    list.into_iter()
        .filter_map(|item| {
            let text = match item {
                Value::String(s) => match serde_json::from_str::<Value>(&s) {
                    Ok(Value::Object(obj)) => obj
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or(s),
                    _ => s,
                },
                Value::Object(obj) => obj.get("message").and_then(Value::as_str)?.to_string(),
                other => other.to_string(),
            };
            let text = text.trim().to_string();
            (!text.is_empty()).then_some(text)
        })
        .collect()
}

// =============================================================================
// Sync Error
// =============================================================================

/// Sync error type covering every failure of the async services.
#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Missing device ID.
    #[error("Device ID not configured. Run initial setup first.")]
    MissingDeviceId,

    /// Invalid ERP URL.
    #[error("Invalid server URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    /// Server URL set without an API key/secret pair.
    #[error("API key and secret are required to reach {0}")]
    MissingCredentials(String),

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// The ERP could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The request did not complete in time.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The ERP answered with an error.
    #[error("Server error: {0}")]
    Remote(RemoteFailure),

    // =========================================================================
    // Protocol Errors
    // =========================================================================
    /// Failed to deserialize a response.
    #[error("Deserialization failed: {0}")]
    DeserializationFailed(String),

    /// Response parsed but did not carry what was asked for.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    // =========================================================================
    // Domain Errors
    // =========================================================================
    /// Pricing rule violation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Local precondition failed.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // =========================================================================
    // Database Errors
    // =========================================================================
    /// Local store failure.
    #[error("Database error: {0}")]
    Database(#[from] DbError),

    /// Record not found.
    #[error("{doctype} {name} not found")]
    NotFound { doctype: String, name: String },
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::DeserializationFailed(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SyncError::Timeout(err.to_string())
        } else if err.is_decode() {
            SyncError::DeserializationFailed(err.to_string())
        } else if let Some(status) = err.status() {
            SyncError::Remote(RemoteFailure {
                status: Some(status.as_u16()),
                message: Some(err.to_string()),
                ..Default::default()
            })
        } else {
            SyncError::ConnectionFailed(err.to_string())
        }
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if trying the same operation again may succeed.
    ///
    /// ## Retryable Errors
    /// - Connection failures and timeouts
    /// - 5xx answers, 429
    /// - Busy local database
    ///
    /// ## Non-Retryable Errors
    /// - Configuration errors
    /// - Validation and pricing rule errors
    /// - 4xx answers
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::ConnectionFailed(_) | SyncError::Timeout(_) => true,
            SyncError::Remote(failure) => match failure.status {
                Some(status) => status >= 500 || status == 429,
                None => true,
            },
            SyncError::Database(db) => db.is_transient(),
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::MissingDeviceId
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
                | SyncError::MissingCredentials(_)
        )
    }

    /// Text shown after "Failed to submit invoice." and similar headlines.
    pub fn detail(&self) -> String {
        match self {
            SyncError::Remote(failure) => failure
                .detail()
                .unwrap_or_else(|| "The server returned an error without details.".to_string()),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::ConnectionFailed("network error".into()).is_retryable());
        assert!(SyncError::Timeout("30s".into()).is_retryable());
        assert!(SyncError::Remote(RemoteFailure::from_response(502, "")).is_retryable());

        assert!(!SyncError::Remote(RemoteFailure::from_response(417, "")).is_retryable());
        assert!(!SyncError::InvalidConfig("bad config".into()).is_retryable());
        assert!(!SyncError::Validation(ValidationError::EmptyJsonDump).is_retryable());
    }

    #[test]
    fn test_server_messages_win() {
        let body = r#"{
            "message": "generic",
            "_server_messages": "[\"{\\\"message\\\": \\\"Customer not found\\\"}\", \"{\\\"message\\\": \\\"Stock is negative\\\"}\"]"
        }"#;
        let failure = RemoteFailure::from_response(417, body);
        assert_eq!(
            failure.detail().as_deref(),
            Some("Customer not found\nStock is negative")
        );
    }

    #[test]
    fn test_message_field_then_raw_text() {
        let failure = RemoteFailure::from_response(500, r#"{"message 500": "Tax template missing"}"#);
        assert_eq!(failure.detail().as_deref(), Some("Tax template missing"));

        let failure = RemoteFailure::from_response(502, "<html>Bad Gateway</html>");
        assert_eq!(failure.detail().as_deref(), Some("<html>Bad Gateway</html>"));

        let failure = RemoteFailure::from_response(500, "   ");
        assert_eq!(failure.detail(), None);
        assert_eq!(
            SyncError::Remote(failure).detail(),
            "The server returned an error without details."
        );
    }

    #[test]
    fn test_duplicate_body_message() {
        let failure = RemoteFailure::from_response(
            409,
            r#"{"data": "A duplicate entry was detected, offline invoice number already exists."}"#,
        );
        assert_eq!(
            failure.to_string(),
            "HTTP 409: A duplicate entry was detected, offline invoice number already exists."
        );
    }

    #[test]
    fn test_domain_errors_keep_operator_text() {
        let err = SyncError::from(CoreError::MissingPriceList);
        assert_eq!(err.to_string(), "Please set a Price List before selecting an item.");
        let err = SyncError::from(ValidationError::MissingInvoiceNumber);
        assert_eq!(err.detail(), "Offline Invoice Number missing.");
    }
}
