//! Processor Webhook Handling
//!
//! Verifies the HMAC-SHA256 signature on each delivery and records payment
//! lifecycle events in the ledger.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::error::{PaymentError, Result};
use crate::ledger::{PaymentLedger, PaymentRecord, PaymentStatus};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the hex signature
pub const SIGNATURE_HEADER: &str = "processor-signature";

/// Parsed webhook event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookEvent {
    PaymentApproved {
        payment_id: String,
        reference: Option<String>,
    },

    PaymentCaptured {
        payment_id: String,
        reference: Option<String>,
        amount: Option<i64>,
        currency: Option<String>,
    },

    PaymentDeclined {
        payment_id: String,
        reference: Option<String>,
        reason: Option<String>,
    },

    PaymentRefunded {
        payment_id: String,
        reference: Option<String>,
    },

    /// Redelivery of an event already handled
    Duplicate { event_id: String },

    /// Unhandled event type
    Other { event_type: String },
}

/// Delivery envelope as sent by the processor
#[derive(Clone, Debug, Deserialize)]
pub struct ProcessorEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub created_on: Option<DateTime<Utc>>,
    pub data: EventData,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct EventData {
    pub id: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub response_summary: Option<String>,
    #[serde(default)]
    pub customer: Option<IdRef>,
    #[serde(default)]
    pub source: Option<IdRef>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct IdRef {
    #[serde(default)]
    pub id: Option<String>,
}

/// Check a hex HMAC-SHA256 of the raw body
pub fn verify_signature(payload: &[u8], signature: &str, secret: &str) -> Result<()> {
    let expected = hex::decode(signature.trim())
        .map_err(|_| PaymentError::WebhookSignature("signature is not hex".into()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("invalid webhook secret: {e}")))?;
    mac.update(payload);
    mac.verify_slice(&expected)
        .map_err(|_| PaymentError::WebhookSignature("signature mismatch".into()))
}

/// Hex signature for a payload, as the processor computes it
pub fn sign(payload: &[u8], secret: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Config(format!("invalid webhook secret: {e}")))?;
    mac.update(payload);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Webhook handler
pub struct WebhookHandler<L: PaymentLedger> {
    ledger: Arc<L>,
}

impl<L: PaymentLedger> WebhookHandler<L> {
    pub const fn new(ledger: Arc<L>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Verify webhook signature and parse event
    pub fn parse_event(&self, payload: &[u8], signature: &str, secret: &str) -> Result<ProcessorEvent> {
        verify_signature(payload, signature, secret)?;
        serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookParse(e.to_string()))
    }

    /// Process a verified event
    pub async fn handle(&self, event: ProcessorEvent) -> Result<WebhookEvent> {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Processing processor webhook");

        if self.ledger.is_delivered(&event.id)? {
            tracing::debug!(event_id = %event.id, "Ignoring redelivered webhook");
            return Ok(WebhookEvent::Duplicate { event_id: event.id });
        }

        let Some(status) = status_for(&event.event_type) else {
            tracing::debug!(event_type = %event.event_type, "Unhandled webhook event");
            self.ledger.mark_delivered(&event.id)?;
            return Ok(WebhookEvent::Other {
                event_type: event.event_type,
            });
        };

        let data = event.data;
        if data.id.is_empty() {
            return Err(PaymentError::WebhookParse("event has no payment id".into()));
        }

        let record = PaymentRecord {
            payment_id: data.id.clone(),
            reference: data.reference.clone(),
            status,
            amount: data.amount,
            currency: data.currency.clone(),
            customer_id: data.customer.and_then(|c| c.id),
            instrument_id: data.source.and_then(|s| s.id),
            updated_at: event.created_on.unwrap_or_else(Utc::now),
        };
        let stored = self.ledger.record(record)?;
        // Only applied events count; a failed record is retried on redelivery
        self.ledger.mark_delivered(&event.id)?;

        tracing::info!(
            payment_id = %stored.payment_id,
            reference = ?stored.reference,
            status = ?stored.status,
            "Payment updated"
        );

        let parsed = match status {
            PaymentStatus::Approved => WebhookEvent::PaymentApproved {
                payment_id: data.id,
                reference: data.reference,
            },
            PaymentStatus::Captured => WebhookEvent::PaymentCaptured {
                payment_id: data.id,
                reference: data.reference,
                amount: data.amount,
                currency: data.currency,
            },
            PaymentStatus::Declined => {
                tracing::warn!(payment_id = %data.id, reason = ?data.response_summary, "Payment declined");
                WebhookEvent::PaymentDeclined {
                    payment_id: data.id,
                    reference: data.reference,
                    reason: data.response_summary,
                }
            }
            PaymentStatus::Refunded => WebhookEvent::PaymentRefunded {
                payment_id: data.id,
                reference: data.reference,
            },
        };
        Ok(parsed)
    }
}

fn status_for(event_type: &str) -> Option<PaymentStatus> {
    match event_type {
        "payment_approved" => Some(PaymentStatus::Approved),
        "payment_captured" => Some(PaymentStatus::Captured),
        "payment_declined" | "payment_capture_declined" => Some(PaymentStatus::Declined),
        "payment_refunded" => Some(PaymentStatus::Refunded),
        _ => None,
    }
}
