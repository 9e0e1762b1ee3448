//! Processor REST Client
//!
//! Server-side client holding the secret key. Implements the storefront's
//! gateway traits so the server can hand it to its handlers unchanged.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use storefront_core::gateway::{
    CardDetails, CardMetadataService, CardProbeResult, PaymentDetails, PaymentGateway, PaymentLink,
    PaymentSession, ProbeKind, TokenizedCard, Tokenizer,
};
use storefront_core::handoff::PaymentPayload;

use crate::config::{ProcessorConfig, join_segment};
use crate::error::{PaymentError, Result};

/// Processor API client
pub struct ProcessorClient {
    http: reqwest::Client,
    config: ProcessorConfig,
}

impl ProcessorClient {
    pub fn new(config: ProcessorConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, config })
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ProcessorConfig::from_env()?)
    }

    pub const fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Hosted payment page for the payload
    pub async fn request_payment_link(&self, payload: &PaymentPayload) -> Result<PaymentLink> {
        let body = PaymentRequest::from_payload(payload, &self.config);
        let response: LinkResponse = self
            .send(self.http.post(self.config.url("payment-links")).bearer_auth(&self.config.secret_key).json(&body))
            .await?;

        let link = response
            .links
            .redirect
            .map(|r| r.href)
            .filter(|href| !href.is_empty())
            .ok_or_else(|| PaymentError::MalformedResponse("payment link response has no redirect link".into()))?;

        tracing::info!(reference = %payload.reference, link_id = ?response.id, "Payment link created");
        Ok(PaymentLink { id: response.id, link })
    }

    /// Session for mounting the embedded widget
    pub async fn request_payment_session(&self, payload: &PaymentPayload) -> Result<PaymentSession> {
        let body = PaymentRequest::from_payload(payload, &self.config);
        let session: PaymentSession = self
            .send(
                self.http
                    .post(self.config.url("payment-sessions"))
                    .bearer_auth(&self.config.secret_key)
                    .json(&body),
            )
            .await?;

        tracing::info!(reference = %payload.reference, session_id = %session.id, "Payment session created");
        Ok(session)
    }

    /// BIN / card metadata lookup
    pub async fn lookup_card(&self, pan_or_bin: &str, kind: ProbeKind) -> Result<CardProbeResult> {
        let source = match kind {
            ProbeKind::FullPan => MetadataSource::Card { number: pan_or_bin },
            ProbeKind::BinOnly => MetadataSource::Bin { bin: pan_or_bin },
        };
        let body = MetadataRequest { source, format: "basic" };

        let result: CardProbeResult = self
            .send(
                self.http
                    .post(self.config.url("metadata/card"))
                    .bearer_auth(&self.config.secret_key)
                    .json(&body),
            )
            .await?;

        tracing::debug!(bin = %result.bin, scheme = %result.scheme, "Card metadata fetched");
        Ok(result)
    }

    /// Exchange card details for a reusable token
    pub async fn request_token(&self, card: &CardDetails) -> Result<TokenizedCard> {
        let body = TokenRequest {
            kind: "card",
            number: &card.number,
            expiry_month: card.expiry_month,
            expiry_year: card.expiry_year,
            cvv: &card.cvv,
            name: &card.name,
        };

        let response: TokenResponse = self
            .send(self.http.post(self.config.url("tokens")).bearer_auth(&self.config.public_key).json(&body))
            .await?;

        if response.token.is_empty() {
            return Err(PaymentError::MalformedResponse("token response has no token".into()));
        }

        tracing::info!(scheme = %response.scheme, last4 = %response.last4, "Card tokenized");
        Ok(TokenizedCard {
            token: response.token,
            scheme: response.scheme,
            last4: if response.last4.is_empty() { card.last4().to_string() } else { response.last4 },
            expiry_month: response.expiry_month.unwrap_or(card.expiry_month),
            expiry_year: response.expiry_year.unwrap_or(card.expiry_year),
        })
    }

    /// Status and stored identifiers of a payment
    pub async fn get_payment(&self, payment_id: &str) -> Result<PaymentDetails> {
        let url = join_segment(&self.config.url("payments"), payment_id)?;
        let response: PaymentResponse = self
            .send(self.http.get(url).bearer_auth(&self.config.secret_key))
            .await?;
        Ok(response.into())
    }

    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<T> {
        let request_id = uuid::Uuid::new_v4();
        let response = request.header("X-Request-Id", request_id.to_string()).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::warn!(%request_id, status = status.as_u16(), "Processor rejected request");
            return Err(PaymentError::Processor {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|e| PaymentError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl PaymentGateway for ProcessorClient {
    async fn create_payment_link(&self, payload: &PaymentPayload) -> storefront_core::Result<PaymentLink> {
        self.request_payment_link(payload).await.map_err(PaymentError::into_handoff)
    }

    async fn create_payment_session(&self, payload: &PaymentPayload) -> storefront_core::Result<PaymentSession> {
        self.request_payment_session(payload).await.map_err(PaymentError::into_handoff)
    }

    async fn fetch_payment_details(&self, payment_id: &str) -> storefront_core::Result<PaymentDetails> {
        self.get_payment(payment_id).await.map_err(PaymentError::into_handoff)
    }
}

#[async_trait]
impl CardMetadataService for ProcessorClient {
    async fn probe_card_metadata(&self, pan_or_bin: &str, kind: ProbeKind) -> storefront_core::Result<CardProbeResult> {
        self.lookup_card(pan_or_bin, kind).await.map_err(PaymentError::into_probe)
    }
}

#[async_trait]
impl Tokenizer for ProcessorClient {
    async fn tokenize_card(&self, card: &CardDetails) -> storefront_core::Result<TokenizedCard> {
        self.request_token(card).await.map_err(PaymentError::into_tokenization)
    }
}

/// Body shared by payment links and payment sessions
#[derive(Debug, Serialize)]
struct PaymentRequest<'a> {
    amount: i64,
    currency: &'static str,
    reference: &'a str,
    billing: Billing<'a>,
    customer: CustomerRequest<'a>,
    products: Vec<ProductRequest<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    processing_channel_id: Option<&'a str>,
    success_url: &'a str,
    failure_url: &'a str,
    /// "enabled" asks the shopper to let the processor keep the card
    store_payment_details: &'static str,
}

#[derive(Debug, Serialize)]
struct Billing<'a> {
    address: BillingAddress<'a>,
}

#[derive(Debug, Serialize)]
struct BillingAddress<'a> {
    country: &'a str,
}

#[derive(Debug, Serialize)]
struct CustomerRequest<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct ProductRequest<'a> {
    name: &'a str,
    quantity: u32,
    price: i64,
}

impl<'a> PaymentRequest<'a> {
    fn from_payload(payload: &'a PaymentPayload, config: &'a ProcessorConfig) -> Self {
        Self {
            amount: payload.amount_minor_units,
            currency: payload.currency.code(),
            reference: &payload.reference,
            billing: Billing {
                address: BillingAddress {
                    country: &payload.country,
                },
            },
            customer: CustomerRequest {
                name: &payload.customer.name,
                email: payload.customer.email.as_deref(),
                id: payload.customer.id.as_deref(),
            },
            products: payload
                .product_lines
                .iter()
                .map(|line| ProductRequest {
                    name: &line.name,
                    quantity: line.quantity,
                    price: line.unit_price_minor_units,
                })
                .collect(),
            processing_channel_id: config.processing_channel_id.as_deref(),
            success_url: &config.success_url,
            failure_url: &config.failure_url,
            store_payment_details: if payload.collect_consent { "enabled" } else { "disabled" },
        }
    }
}

#[derive(Debug, Deserialize)]
struct LinkResponse {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "_links", default)]
    links: Links,
}

#[derive(Debug, Default, Deserialize)]
struct Links {
    #[serde(default)]
    redirect: Option<Href>,
}

#[derive(Debug, Deserialize)]
struct Href {
    href: String,
}

#[derive(Debug, Serialize)]
struct MetadataRequest<'a> {
    source: MetadataSource<'a>,
    format: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum MetadataSource<'a> {
    Card { number: &'a str },
    Bin { bin: &'a str },
}

#[derive(Serialize)]
struct TokenRequest<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    number: &'a str,
    expiry_month: u32,
    expiry_year: i32,
    cvv: &'a str,
    name: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: String,
    #[serde(default)]
    scheme: String,
    #[serde(default)]
    last4: String,
    #[serde(default)]
    expiry_month: Option<u32>,
    #[serde(default)]
    expiry_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    customer: Option<IdOnly>,
    #[serde(default)]
    source: Option<IdOnly>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    #[serde(default)]
    id: Option<String>,
}

impl From<PaymentResponse> for PaymentDetails {
    fn from(response: PaymentResponse) -> Self {
        Self {
            status: response.status,
            customer_id: response.customer.and_then(|c| c.id),
            instrument_id: response.source.and_then(|s| s.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use storefront_core::handoff::PayloadBuilder;
    use storefront_core::{Currency, Customer, ManualClock, SeatHold, StaticRatesSource};
    use storefront_core::FxAdapter;
    use std::sync::Arc;

    fn payload(collect_consent: bool) -> PaymentPayload {
        let hold = SeatHold {
            seat: "A12".into(),
            session_id: "s1".into(),
            expires_at: chrono::Utc::now(),
        };
        let fx = FxAdapter::new(Arc::new(StaticRatesSource::default()));
        PayloadBuilder::new(Arc::new(ManualClock::new(chrono::Utc::now())), "HK", Currency::Hkd)
            .customer(Customer {
                name: "Mei Chan".into(),
                email: Some("mei@example.com".into()),
                ..Customer::default()
            })
            .collect_consent(collect_consent)
            .for_seat(&hold, dec!(680), &fx)
    }

    #[test]
    fn test_payment_request_shape() {
        let mut config = ProcessorConfig::new("sk", "pk");
        config.processing_channel_id = Some("pc_1".into());
        let payload = payload(true);

        let body = serde_json::to_value(PaymentRequest::from_payload(&payload, &config)).unwrap();
        assert_eq!(body["amount"], 68_000);
        assert_eq!(body["currency"], "HKD");
        assert_eq!(body["billing"]["address"]["country"], "HK");
        assert_eq!(body["customer"]["email"], "mei@example.com");
        assert!(body["customer"].get("id").is_none());
        assert_eq!(body["products"][0]["price"], 68_000);
        assert_eq!(body["processing_channel_id"], "pc_1");
        assert_eq!(body["store_payment_details"], "enabled");
    }

    #[test]
    fn test_consent_off() {
        let config = ProcessorConfig::new("sk", "pk");
        let payload = payload(false);
        let body = serde_json::to_value(PaymentRequest::from_payload(&payload, &config)).unwrap();
        assert_eq!(body["store_payment_details"], "disabled");
        assert!(body.get("processing_channel_id").is_none());
    }

    #[test]
    fn test_metadata_request_by_kind() {
        let full = serde_json::to_value(MetadataRequest {
            source: MetadataSource::Card { number: "4242424242424242" },
            format: "basic",
        })
        .unwrap();
        assert_eq!(full["source"]["type"], "card");
        assert_eq!(full["source"]["number"], "4242424242424242");

        let bin = serde_json::to_value(MetadataSource::Bin { bin: "424242" }).unwrap();
        assert_eq!(bin, serde_json::json!({"type": "bin", "bin": "424242"}));
    }

    #[test]
    fn test_link_response_parsing() {
        let response: LinkResponse = serde_json::from_value(serde_json::json!({
            "id": "pl_123",
            "_links": {"redirect": {"href": "https://pay.example/pl_123"}}
        }))
        .unwrap();
        assert_eq!(response.links.redirect.unwrap().href, "https://pay.example/pl_123");

        let empty: LinkResponse = serde_json::from_value(serde_json::json!({"id": "pl_1"})).unwrap();
        assert!(empty.links.redirect.is_none());
    }

    #[test]
    fn test_payment_details_mapping() {
        let response: PaymentResponse = serde_json::from_value(serde_json::json!({
            "id": "pay_1",
            "status": "Captured",
            "customer": {"id": "cus_1", "email": "mei@example.com"},
            "source": {"id": "src_1", "type": "card"}
        }))
        .unwrap();
        let details = PaymentDetails::from(response);
        assert_eq!(details.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(details.instrument_id.as_deref(), Some("src_1"));
    }
}
