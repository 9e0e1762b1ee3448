//! Storefront Proxy Client
//!
//! Page-side implementation of the gateway traits. Pages never hold the
//! processor's secret key; they call the storefront server's `/api` routes,
//! which forward to `ProcessorClient`.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use storefront_core::gateway::{
    CardDetails, CardMetadataService, CardProbeResult, PaymentDetails, PaymentGateway, PaymentLink,
    PaymentSession, ProbeKind, TokenizedCard, Tokenizer,
};
use storefront_core::handoff::PaymentPayload;
use storefront_core::StorefrontError;

use crate::config::join_segment;
use crate::error::Result;

/// Error body returned by the storefront server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message; processor bodies are passed through untouched
    pub error: String,
    /// Machine-readable code
    pub code: String,
}

/// Body of `POST /api/card-metadata`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardMetadataRequest {
    pub pan_or_bin: String,
    pub kind: ProbeKind,
}

/// Client for the storefront server's payment API
pub struct ProxyClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Self {
        Self::new(std::env::var("STOREFRONT_API_URL").unwrap_or_else(|_| "http://localhost:3000".into()))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{path}", self.base_url)
    }

    async fn call<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder) -> Result<std::result::Result<T, ApiError>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&body).map_err(|e| ApiError {
                error: format!("unexpected response from storefront server: {e}"),
                code: "malformed_response".into(),
            }));
        }

        tracing::debug!(status = status.as_u16(), "Storefront API returned an error");
        Ok(Err(decode_error(status.as_u16(), body)))
    }
}

/// Read `{error, code}`, or keep a non-JSON body as the message
pub fn decode_error(status: u16, body: String) -> ApiError {
    serde_json::from_str(&body).unwrap_or_else(|_| ApiError {
        error: if body.is_empty() { format!("request failed with status {status}") } else { body },
        code: format!("http_{status}"),
    })
}

/// Transport failures and API errors alike end up as the page-level error
fn flatten<T>(
    result: Result<std::result::Result<T, ApiError>>,
    wrap: impl FnOnce(ApiError) -> StorefrontError,
) -> storefront_core::Result<T> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(api)) => Err(wrap(api)),
        Err(e) => Err(wrap(ApiError {
            error: e.user_message(),
            code: "network_error".into(),
        })),
    }
}

fn handoff(api: ApiError) -> StorefrontError {
    StorefrontError::Handoff(api.error)
}

#[async_trait]
impl PaymentGateway for ProxyClient {
    async fn create_payment_link(&self, payload: &PaymentPayload) -> storefront_core::Result<PaymentLink> {
        let result = self.call(self.http.post(self.url("payment-links")).json(payload)).await;
        flatten(result, handoff)
    }

    async fn create_payment_session(&self, payload: &PaymentPayload) -> storefront_core::Result<PaymentSession> {
        let result = self.call(self.http.post(self.url("payment-sessions")).json(payload)).await;
        flatten(result, handoff)
    }

    async fn fetch_payment_details(&self, payment_id: &str) -> storefront_core::Result<PaymentDetails> {
        let result = match join_segment(&self.url("payments"), payment_id) {
            Ok(url) => self.call(self.http.get(url)).await,
            Err(e) => Err(e),
        };
        flatten(result, handoff)
    }
}

#[async_trait]
impl CardMetadataService for ProxyClient {
    async fn probe_card_metadata(&self, pan_or_bin: &str, kind: ProbeKind) -> storefront_core::Result<CardProbeResult> {
        let body = CardMetadataRequest {
            pan_or_bin: pan_or_bin.to_string(),
            kind,
        };
        let result = self.call(self.http.post(self.url("card-metadata")).json(&body)).await;
        flatten(result, |api| StorefrontError::Probe(api.error))
    }
}

#[async_trait]
impl Tokenizer for ProxyClient {
    async fn tokenize_card(&self, card: &CardDetails) -> storefront_core::Result<TokenizedCard> {
        let result = self.call(self.http.post(self.url("tokens")).json(card)).await;
        flatten(result, |api| StorefrontError::Tokenization {
            code: api.code,
            message: api.error,
        })
    }
}
