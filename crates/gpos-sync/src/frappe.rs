//! # ERP HTTP Client
//!
//! [`FrappeClient`] speaks to the ERP's whitelisted RPC methods and
//! implements the catalog, discount and sales invoice services.
//!
//! ## Wire Conventions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  GET  /api/method/<dotted.path>?arg=value                               │
//! │  POST /api/method/<dotted.path>      (form-encoded args)                │
//! │  Authorization: token <api_key>:<api_secret>                            │
//! │                                                                         │
//! │  RPC return values arrive wrapped:   {"message": <value>}               │
//! │  create_invoice answers directly:    {"data": {"id": "ACC-SINV-..."}}   │
//! │  Errors:                             4xx/5xx + _server_messages,        │
//! │                                      message*, data, or plain text      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A price of 0 from `get_item_price` is how the ERP says "no price", so it
//! maps to `None`.

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

use gpos_core::{
    CoreError, DiscountInput, DiscountType, Money, SalesInvoicePayload, OFFLINE_NUMBER_FIELD,
    SALES_INVOICE_DOCTYPE,
};

use crate::config::SyncConfig;
use crate::error::{RemoteFailure, SyncError, SyncResult};
use crate::services::{CatalogService, CreateOutcome, DiscountService, SalesInvoiceService};

const GET_VALUE: &str = "frappe.client.get_value";
const GET_LIST: &str = "frappe.client.get_list";
const CREATE_INVOICE: &str = "gpos.gpos.pos.create_invoice";
const GET_ITEM_PRICE: &str = "gpos.gpos.doctype.promotion.promotion.get_item_price";
const GET_VALUATION_RATE: &str = "gpos.gpos.doctype.promotion.promotion.get_valuation_rate";
const CALCULATE_DISCOUNT: &str =
    "gpos.gpos.doctype.promotion.promotion.calculate_price_after_discount";

/// Body marker of the 409 the ERP sends for a reused offline number.
const DUPLICATE_OFFLINE_NUMBER: &str = "offline invoice number already exists";

/// HTTP client for the ERP.
#[derive(Debug, Clone)]
pub struct FrappeClient {
    base: Url,
    auth: String,
    client: Client,
}

impl FrappeClient {
    pub fn new(base_url: &str, api_key: &str, api_secret: &str, timeout: Duration) -> SyncResult<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        Ok(FrappeClient {
            base,
            auth: format!("token {}:{}", api_key, api_secret),
            client,
        })
    }

    /// Client for the configured server, `None` when no server is set.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Option<Self>> {
        let Some(url) = config.server_url()? else {
            return Ok(None);
        };
        let key = config.server.api_key.as_deref().unwrap_or_default();
        let secret = config.server.api_secret.as_deref().unwrap_or_default();
        Self::new(url.as_str(), key, secret, config.request_timeout()).map(Some)
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn method_url(&self, method: &str) -> SyncResult<Url> {
        Ok(self.base.join(&format!("api/method/{}", method))?)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header(reqwest::header::AUTHORIZATION, &self.auth)
            .header(reqwest::header::ACCEPT, "application/json")
    }

    /// Calls a whitelisted method with GET and unwraps `message`.
    async fn call(&self, method: &str, query: &[(&str, String)]) -> SyncResult<Value> {
        let url = self.method_url(method)?;
        let response = self
            .authorized(self.client.get(url))
            .query(query)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(method, status = status.as_u16(), "RPC call failed");
            return Err(SyncError::Remote(RemoteFailure::from_response(
                status.as_u16(),
                &body,
            )));
        }

        let value: Value = serde_json::from_str(&body)?;
        Ok(value.get("message").cloned().unwrap_or(Value::Null))
    }
}

// =============================================================================
// Value Decoding
// =============================================================================

/// Reads an ERP currency value. `null` is a miss.
fn money_from_value(field: &str, value: &Value) -> SyncResult<Option<Money>> {
    let text = match value {
        Value::Null => return Ok(None),
        Value::Number(n) => n.to_string(),
        Value::String(s) if s.trim().is_empty() => return Ok(None),
        Value::String(s) => s.clone(),
        other => {
            return Err(SyncError::UnexpectedResponse(format!(
                "{} is not a number: {}",
                field, other
            )))
        }
    };
    Money::parse_decimal(&text)
        .map(Some)
        .map_err(|e| SyncError::UnexpectedResponse(format!("{}: {}", field, e)))
}

/// The promotion methods catch their own exceptions and report them in an
/// `error` key next to a zero result.
fn reported_error(message: &Value) -> Option<SyncError> {
    let error = message.get("error")?.as_str()?;
    Some(SyncError::Remote(RemoteFailure {
        status: Some(200),
        message: Some(error.to_string()),
        ..Default::default()
    }))
}

// =============================================================================
// Catalog
// =============================================================================

#[async_trait]
impl CatalogService for FrappeClient {
    #[instrument(skip(self))]
    async fn item_uoms(&self, item_code: &str) -> SyncResult<Vec<String>> {
        let message = self
            .call(
                GET_LIST,
                &[
                    ("doctype", "UOM Conversion Detail".to_string()),
                    ("parent", "Item".to_string()),
                    ("fields", json!(["uom"]).to_string()),
                    ("filters", json!({ "parent": item_code }).to_string()),
                    ("order_by", "idx asc".to_string()),
                    ("limit_page_length", "0".to_string()),
                ],
            )
            .await?;

        let rows = message.as_array().cloned().unwrap_or_default();
        Ok(rows
            .iter()
            .filter_map(|row| row.get("uom").and_then(Value::as_str))
            .map(str::to_string)
            .collect())
    }

    #[instrument(skip(self))]
    async fn item_price(
        &self,
        item_code: &str,
        price_list: &str,
        uom: Option<&str>,
    ) -> SyncResult<Option<Money>> {
        let mut query = vec![
            ("item_code", item_code.to_string()),
            ("price_list", price_list.to_string()),
        ];
        if let Some(uom) = uom {
            query.push(("uom", uom.to_string()));
        }

        let message = self.call(GET_ITEM_PRICE, &query).await?;
        if let Some(err) = reported_error(&message) {
            return Err(err);
        }

        let price = money_from_value("price", message.get("price").unwrap_or(&Value::Null))?;
        Ok(price.filter(|p| !p.is_zero()))
    }

    #[instrument(skip(self))]
    async fn valuation_rate(&self, item_code: &str, uom: Option<&str>) -> SyncResult<Option<Money>> {
        let mut query = vec![("itemcode", item_code.to_string())];
        if let Some(uom) = uom {
            query.push(("uom", uom.to_string()));
        }

        let message = self.call(GET_VALUATION_RATE, &query).await?;
        money_from_value("valuation_rate", &message)
    }
}

// =============================================================================
// Discount
// =============================================================================

#[async_trait]
impl DiscountService for FrappeClient {
    async fn price_after_discount(&self, input: &DiscountInput) -> SyncResult<Money> {
        // The server subtracts the amount for any non-percentage type.
        let amount = match input.discount_type {
            DiscountType::Amount => input.discount_amount,
            DiscountType::Percentage | DiscountType::None => Money::zero(),
        };

        let message = self
            .call(
                CALCULATE_DISCOUNT,
                &[
                    ("sale_price", input.sale_price.to_decimal_string()),
                    ("discount_type", input.discount_type.as_erp_str().to_string()),
                    (
                        "discount_percentage",
                        input.discount_percentage.to_decimal_string(),
                    ),
                    ("discount__amount", amount.to_decimal_string()),
                ],
            )
            .await?;

        if let Some(err) = reported_error(&message) {
            return Err(err);
        }

        let price = money_from_value(
            "price_after_discount",
            message.get("price_after_discount").unwrap_or(&Value::Null),
        )?
        .ok_or_else(|| SyncError::UnexpectedResponse("price_after_discount missing".into()))?;

        if price.is_negative() {
            return Err(CoreError::DiscountExceedsPrice {
                sale_price: input.sale_price,
                result: price,
            }
            .into());
        }
        Ok(price)
    }
}

// =============================================================================
// Sales Invoices
// =============================================================================

#[async_trait]
impl SalesInvoiceService for FrappeClient {
    #[instrument(skip(self))]
    async fn find_by_offline_number(&self, offline_number: &str) -> SyncResult<Option<String>> {
        let message = self
            .call(
                GET_VALUE,
                &[
                    ("doctype", SALES_INVOICE_DOCTYPE.to_string()),
                    (
                        "filters",
                        json!({ OFFLINE_NUMBER_FIELD: offline_number }).to_string(),
                    ),
                    ("fieldname", "name".to_string()),
                ],
            )
            .await?;

        Ok(message
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.is_empty())
            .map(str::to_string))
    }

    #[instrument(skip(self, payload), fields(items = payload.item_count()))]
    async fn create_invoice(
        &self,
        offline_number: &str,
        payload: &SalesInvoicePayload,
    ) -> SyncResult<CreateOutcome> {
        let mut form = payload.to_form_fields();
        if payload.offline_invoice_number().is_none() {
            form.retain(|(k, _)| k != "offline_invoice_number");
            form.push(("offline_invoice_number".to_string(), offline_number.to_string()));
        }

        let url = self.method_url(CREATE_INVOICE)?;
        let response = self
            .authorized(self.client.post(url))
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), "create_invoice answered");

        if status == StatusCode::CONFLICT && body.contains(DUPLICATE_OFFLINE_NUMBER) {
            let existing = self
                .find_by_offline_number(offline_number)
                .await
                .unwrap_or_else(|e| {
                    warn!(error = %e, "Could not look up the existing invoice");
                    None
                })
                .unwrap_or_else(|| offline_number.to_string());
            info!(offline_number = %offline_number, existing = %existing, "Server reported duplicate");
            return Ok(CreateOutcome::Duplicate(existing));
        }

        if !status.is_success() {
            return Err(SyncError::Remote(RemoteFailure::from_response(
                status.as_u16(),
                &body,
            )));
        }

        let value: Value = serde_json::from_str(&body)?;
        let name = value
            .pointer("/data/id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                SyncError::UnexpectedResponse(format!("create_invoice returned no invoice id: {}", body))
            })?;

        info!(offline_number = %offline_number, name = %name, "Sales invoice created");
        Ok(CreateOutcome::Created(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpos_core::Percentage;
    use wiremock::matchers::{body_string_contains, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> FrappeClient {
        FrappeClient::new(&server.uri(), "key", "secret", Duration::from_secs(5)).unwrap()
    }

    fn api(method: &str) -> String {
        format!("/api/method/{}", method)
    }

    fn payload(number: &str) -> SalesInvoicePayload {
        match json!({
            "customer_name": "Walk-in",
            "offline_invoice_number": number,
            "items": [{"item_code": "COKE", "quantity": 1, "rate": 3.5, "uom": "Nos"}],
        }) {
            Value::Object(map) => SalesInvoicePayload::from_map(map),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_item_price_hit_and_zero_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api(GET_ITEM_PRICE)))
            .and(query_param("item_code", "COKE"))
            .and(query_param("uom", "Nos"))
            .and(header("authorization", "token key:secret"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": {"price": 12.5}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(api(GET_ITEM_PRICE)))
            .and(query_param("item_code", "GHOST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": {"price": 0.0}})),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(
            client.item_price("COKE", "Retail", Some("Nos")).await.unwrap(),
            Some(Money::from_cents(1250))
        );
        assert_eq!(client.item_price("GHOST", "Retail", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_item_price_reported_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api(GET_ITEM_PRICE)))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"message": {"error": "Price List Retail not found", "price": 0}}),
            ))
            .mount(&server)
            .await;

        let err = client(&server).item_price("COKE", "Retail", None).await.unwrap_err();
        assert_eq!(err.detail(), "Price List Retail not found");
    }

    #[tokio::test]
    async fn test_valuation_rate_null_is_miss() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api(GET_VALUATION_RATE)))
            .and(query_param("itemcode", "COKE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": 2.1})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(api(GET_VALUATION_RATE)))
            .and(query_param("itemcode", "NEW"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": null})))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(
            client.valuation_rate("COKE", None).await.unwrap(),
            Some(Money::from_cents(210))
        );
        assert_eq!(client.valuation_rate("NEW", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_item_uoms_from_conversion_table() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api(GET_LIST)))
            .and(query_param("doctype", "UOM Conversion Detail"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"message": [{"uom": "Nos"}, {"uom": "Carton"}]}),
            ))
            .mount(&server)
            .await;

        assert_eq!(
            client(&server).item_uoms("COKE").await.unwrap(),
            vec!["Nos", "Carton"]
        );
    }

    #[tokio::test]
    async fn test_discount_percentage_sends_zero_amount() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api(CALCULATE_DISCOUNT)))
            .and(query_param("sale_price", "100.00"))
            .and(query_param("discount_type", "Discount Percentage"))
            .and(query_param("discount_percentage", "10.00"))
            .and(query_param("discount__amount", "0.00"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"message": {"price_after_discount": 90.0}}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let input = DiscountInput {
            sale_price: Money::from_major(100),
            discount_type: DiscountType::Percentage,
            discount_percentage: Percentage::from_whole(10),
            discount_amount: Money::from_major(5),
        };
        assert_eq!(
            client(&server).price_after_discount(&input).await.unwrap(),
            Money::from_major(90)
        );
    }

    #[tokio::test]
    async fn test_negative_discount_result_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api(CALCULATE_DISCOUNT)))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"message": {"price_after_discount": -5.0}}),
            ))
            .mount(&server)
            .await;

        let input = DiscountInput {
            sale_price: Money::from_major(10),
            discount_type: DiscountType::Amount,
            discount_percentage: Percentage::zero(),
            discount_amount: Money::from_major(15),
        };
        let err = client(&server).price_after_discount(&input).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Core(CoreError::DiscountExceedsPrice { .. })
        ));
    }

    #[tokio::test]
    async fn test_find_by_offline_number() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api(GET_VALUE)))
            .and(query_param("doctype", "Sales Invoice"))
            .and(query_param("fieldname", "name"))
            .and(query_param(
                "filters",
                r#"{"custom_offline_invoice_number":"OFF-1"}"#,
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": {"name": "ACC-SINV-0001"}})),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(api(GET_VALUE)))
            .and(query_param(
                "filters",
                r#"{"custom_offline_invoice_number":"OFF-2"}"#,
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = client(&server);
        assert_eq!(
            client.find_by_offline_number("OFF-1").await.unwrap().as_deref(),
            Some("ACC-SINV-0001")
        );
        assert_eq!(client.find_by_offline_number("OFF-2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_create_invoice_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(api(CREATE_INVOICE)))
            .and(body_string_contains("offline_invoice_number=OFF-1"))
            .and(body_string_contains("customer_name=Walk-in"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                json!({"data": {"id": "ACC-SINV-0042", "customer_name": "Walk-in"}}),
            ))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = client(&server)
            .create_invoice("OFF-1", &payload("OFF-1"))
            .await
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Created("ACC-SINV-0042".into()));
    }

    #[tokio::test]
    async fn test_create_invoice_conflict_maps_to_duplicate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(api(CREATE_INVOICE)))
            .respond_with(ResponseTemplate::new(409).set_body_json(json!({
                "data": "A duplicate entry was detected, offline invoice number already exists."
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(api(GET_VALUE)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"message": {"name": "ACC-SINV-0007"}})),
            )
            .mount(&server)
            .await;

        let outcome = client(&server)
            .create_invoice("OFF-1", &payload("OFF-1"))
            .await
            .unwrap();
        assert_eq!(outcome, CreateOutcome::Duplicate("ACC-SINV-0007".into()));
    }

    #[tokio::test]
    async fn test_create_invoice_failure_keeps_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(api(CREATE_INVOICE)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "data": "Customer name not found"
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .create_invoice("OFF-1", &payload("OFF-1"))
            .await
            .unwrap_err();
        assert!(!err.is_retryable());
        assert_eq!(err.detail(), "Customer name not found");
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(api(GET_ITEM_PRICE)))
            .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
            .mount(&server)
            .await;

        let err = client(&server).item_price("COKE", "Retail", None).await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(err.detail(), "Bad Gateway");
    }

    #[test]
    fn test_base_url_keeps_subpath() {
        let c = FrappeClient::new("https://erp.example.com/erp", "k", "s", Duration::from_secs(1)).unwrap();
        assert_eq!(
            c.method_url(GET_VALUE).unwrap().as_str(),
            "https://erp.example.com/erp/api/method/frappe.client.get_value"
        );
    }
}
