//! Payment Error Types

use storefront_core::StorefrontError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Processor-related errors
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Non-2xx from the processor; `body` is kept exactly as received
    #[error("Processor returned {status}: {body}")]
    Processor { status: u16, body: String },

    /// 2xx response without a field we need
    #[error("Malformed processor response: {0}")]
    MalformedResponse(String),

    /// Webhook signature verification failed
    #[error("Webhook signature invalid: {0}")]
    WebhookSignature(String),

    /// Webhook payload parsing failed
    #[error("Webhook parse error: {0}")]
    WebhookParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Ledger error
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Processor { status, .. } => *status == 429 || *status >= 500,
            Self::Network(_) | Self::Storage(_) => true,
            _ => false,
        }
    }

    /// Get user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            // Shown verbatim so the shopper sees what the processor said
            Self::Processor { body, .. } => body.clone(),
            Self::MalformedResponse(msg) => msg.clone(),
            Self::Network(_) => "Could not reach the payment service. Please try again.".into(),
            Self::Config(_) => "Service configuration error.".into(),
            _ => "An error occurred processing your request.".into(),
        }
    }

    /// Error codes the processor attached to a rejection, if any
    pub fn processor_codes(&self) -> Vec<String> {
        let Self::Processor { body, .. } = self else {
            return Vec::new();
        };
        serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v.get("error_codes").cloned())
            .and_then(|codes| serde_json::from_value(codes).ok())
            .unwrap_or_default()
    }

    /// As a handoff failure on the page
    pub fn into_handoff(self) -> StorefrontError {
        StorefrontError::Handoff(self.user_message())
    }

    /// As a failed card metadata probe
    pub fn into_probe(self) -> StorefrontError {
        StorefrontError::Probe(self.user_message())
    }

    /// As a tokenization rejection keeping the processor's first code
    pub fn into_tokenization(self) -> StorefrontError {
        let code = self
            .processor_codes()
            .into_iter()
            .next()
            .unwrap_or_else(|| "tokenization_failed".into());
        StorefrontError::Tokenization {
            code,
            message: self.user_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rejected(status: u16) -> PaymentError {
        PaymentError::Processor {
            status,
            body: r#"{"request_id":"r1","error_type":"request_invalid","error_codes":["card_number_invalid","cvv_invalid"]}"#.into(),
        }
    }

    #[test]
    fn test_retryable() {
        assert!(rejected(503).is_retryable());
        assert!(rejected(429).is_retryable());
        assert!(!rejected(422).is_retryable());
        assert!(!PaymentError::WebhookSignature("bad".into()).is_retryable());
    }

    #[test]
    fn test_processor_body_is_verbatim() {
        let err = rejected(422);
        let body = err.user_message();
        assert!(matches!(err.into_handoff(), StorefrontError::Handoff(msg) if msg == body));
    }

    #[test]
    fn test_tokenization_code() {
        let StorefrontError::Tokenization { code, .. } = rejected(422).into_tokenization() else {
            panic!("expected tokenization error");
        };
        assert_eq!(code, "card_number_invalid");

        let StorefrontError::Tokenization { code, .. } =
            PaymentError::MalformedResponse("no token".into()).into_tokenization()
        else {
            panic!("expected tokenization error");
        };
        assert_eq!(code, "tokenization_failed");
    }
}
