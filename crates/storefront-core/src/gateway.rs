//! Payment Service Contracts
//!
//! The payment processor is an opaque remote service. Pages reach it through
//! these traits; `storefront-payments` provides the HTTP implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::handoff::PaymentPayload;

/// How much of the card number is sent for a metadata probe
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// Full card number, probed once 16 digits are entered
    FullPan,
    /// Leading digits only
    BinOnly,
}

impl ProbeKind {
    /// Digits required before a probe may be issued
    pub const fn min_digits(self) -> usize {
        match self {
            Self::FullPan => 16,
            Self::BinOnly => 6,
        }
    }

    /// Length of the prefix that identifies the issuer
    pub const fn bin_len(self) -> usize {
        match self {
            Self::FullPan => 8,
            Self::BinOnly => 6,
        }
    }
}

/// Card metadata returned by a BIN lookup
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardProbeResult {
    pub bin: String,
    pub scheme: String,
    #[serde(default)]
    pub card_type: String,
    #[serde(default)]
    pub issuer: String,
    #[serde(default)]
    pub issuer_country: String,
}

/// Raw card data for tokenization; never logged or persisted
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub number: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
    pub cvv: String,
    pub name: String,
}

impl CardDetails {
    pub fn last4(&self) -> &str {
        let start = self.number.len().saturating_sub(4);
        self.number.get(start..).unwrap_or_default()
    }
}

impl std::fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CardDetails")
            .field("number", &format_args!("**** {}", self.last4()))
            .field("expiry_month", &self.expiry_month)
            .field("expiry_year", &self.expiry_year)
            .field("cvv", &"***")
            .field("name", &self.name)
            .finish()
    }
}

/// Token and display data returned by tokenization
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizedCard {
    pub token: String,
    pub scheme: String,
    pub last4: String,
    pub expiry_month: u32,
    pub expiry_year: i32,
}

/// Hosted payment page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    #[serde(default)]
    pub id: Option<String>,
    pub link: String,
}

/// Session used to mount the processor's embedded widget
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSession {
    pub id: String,
    pub payment_session_token: String,
    #[serde(default)]
    pub payment_session_secret: Option<String>,
}

/// Identifiers attached to a completed payment
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub instrument_id: Option<String>,
}

/// BIN / card metadata lookup
#[async_trait]
pub trait CardMetadataService: Send + Sync {
    async fn probe_card_metadata(&self, pan_or_bin: &str, kind: ProbeKind) -> Result<CardProbeResult>;
}

/// Card tokenization
#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Rejections carry the processor's machine-readable code
    async fn tokenize_card(&self, card: &CardDetails) -> Result<TokenizedCard>;
}

/// Hosted-page links, embedded sessions and payment lookups
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment_link(&self, payload: &PaymentPayload) -> Result<PaymentLink>;

    async fn create_payment_session(&self, payload: &PaymentPayload) -> Result<PaymentSession>;

    async fn fetch_payment_details(&self, payment_id: &str) -> Result<PaymentDetails>;
}
