//! Processor Configuration

use crate::error::{PaymentError, Result};

const DEFAULT_BASE_URL: &str = "https://api.sandbox.checkout.com";

/// Keys and URLs for the payment processor
#[derive(Clone, Debug)]
pub struct ProcessorConfig {
    /// Server-side key for links, sessions and lookups
    pub secret_key: String,

    /// Publishable key used for card tokenization
    pub public_key: String,

    pub base_url: String,

    /// Shared secret for webhook signatures; webhooks are rejected without it
    pub webhook_secret: Option<String>,

    pub processing_channel_id: Option<String>,

    /// Where the hosted page sends the shopper afterwards
    pub success_url: String,
    pub failure_url: String,

    pub timeout_secs: u64,
}

impl ProcessorConfig {
    /// Config with sandbox defaults
    pub fn new(secret_key: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            public_key: public_key.into(),
            base_url: DEFAULT_BASE_URL.into(),
            webhook_secret: None,
            processing_channel_id: None,
            success_url: "http://localhost:3000/success.html".into(),
            failure_url: "http://localhost:3000/checkout.html?payment=failed".into(),
            timeout_secs: 15,
        }
    }

    /// Create from environment variables
    pub fn from_env() -> Result<Self> {
        let secret_key = std::env::var("PROCESSOR_SECRET_KEY")
            .map_err(|_| PaymentError::Config("PROCESSOR_SECRET_KEY not set".into()))?;
        let public_key = std::env::var("PROCESSOR_PUBLIC_KEY")
            .map_err(|_| PaymentError::Config("PROCESSOR_PUBLIC_KEY not set".into()))?;

        let mut config = Self::new(secret_key, public_key);
        if let Ok(url) = std::env::var("PROCESSOR_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        config.webhook_secret = std::env::var("PROCESSOR_WEBHOOK_SECRET").ok().filter(|s| !s.is_empty());
        config.processing_channel_id = std::env::var("PROCESSOR_CHANNEL_ID").ok().filter(|s| !s.is_empty());
        if let Ok(url) = std::env::var("PAYMENT_SUCCESS_URL") {
            config.success_url = url;
        }
        if let Ok(url) = std::env::var("PAYMENT_FAILURE_URL") {
            config.failure_url = url;
        }
        if let Some(secs) = std::env::var("PROCESSOR_TIMEOUT_SECS").ok().and_then(|s| s.parse().ok()) {
            config.timeout_secs = secs;
        }

        Ok(config)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

/// Append one percent-encoded path segment, e.g. a payment id
pub(crate) fn join_segment(base: &str, segment: &str) -> Result<reqwest::Url> {
    let mut url = reqwest::Url::parse(base).map_err(|e| PaymentError::Config(format!("invalid URL {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|()| PaymentError::Config(format!("URL cannot take a path: {base}")))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}
