//! Error Types

use std::collections::BTreeMap;

use thiserror::Error;

/// Result type alias for storefront operations
pub type Result<T> = std::result::Result<T, StorefrontError>;

/// Field-level validation failures, keyed by form field name
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure for a field (first message wins)
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    /// `Ok(())` when nothing was recorded
    pub fn into_result(self) -> Result<()> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(StorefrontError::Validation(self))
        }
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(field, message)| format!("{field}: {message}"))
            .collect();
        write!(f, "{}", parts.join(", "))
    }
}

/// Storefront error types
#[derive(Error, Debug)]
pub enum StorefrontError {
    /// Missing or invalid user input
    #[error("Validation failed: {0}")]
    Validation(FieldErrors),

    /// Cart position does not exist
    #[error("No cart item at index {index} (cart has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// BIN / card metadata lookup failed or was inconclusive
    #[error("Card lookup failed: {0}")]
    Probe(String),

    /// External payment service call failed
    #[error("Payment handoff failed: {0}")]
    Handoff(String),

    /// Tokenization rejected by the payment service
    #[error("Tokenization failed ({code}): {message}")]
    Tokenization { code: String, message: String },

    /// Durable storage could not be read or written
    #[error("Storage error: {0}")]
    Persistence(String),

    /// Seat hold ran out
    #[error("Seat hold expired")]
    HoldExpired,

    /// FX rates could not be fetched
    #[error("Rates unavailable: {0}")]
    Rates(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StorefrontError {
    /// Check if the user can simply try again
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Probe(_) | Self::Handoff(_) | Self::Network(_) | Self::Rates(_)
        )
    }

    /// Convert to a message suitable for inline display
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(errors) => format!("Please check: {errors}"),
            Self::IndexOutOfRange { .. } => "That item is no longer in your cart.".into(),
            Self::Probe(msg) => format!("We could not verify this card: {msg}"),
            // Handoff failures are shown verbatim so the raw processor payload is visible
            Self::Handoff(msg) => msg.clone(),
            Self::Tokenization { message, .. } => format!("Card could not be saved: {message}"),
            Self::HoldExpired => "Your seat hold has expired. Please start again.".into(),
            _ => "An unexpected error occurred.".into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_keep_first_message() {
        let mut errors = FieldErrors::new();
        errors.add("first_name", "required");
        errors.add("first_name", "too long");
        assert_eq!(errors.get("first_name"), Some("required"));
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_empty_field_errors_are_ok() {
        assert!(FieldErrors::new().into_result().is_ok());
    }

    #[test]
    fn test_handoff_message_is_verbatim() {
        let err = StorefrontError::Handoff(r#"{"error_type":"request_invalid"}"#.into());
        assert_eq!(err.user_message(), r#"{"error_type":"request_invalid"}"#);
        assert!(err.is_retryable());
    }
}
