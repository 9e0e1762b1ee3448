//! Payment Ledger
//!
//! Server-side record of what the processor told us through webhooks.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};

/// Lifecycle of a payment as reported by the processor
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Approved,
    Declined,
    Captured,
    Refunded,
}

impl PaymentStatus {
    /// Later stages never move back when webhooks arrive out of order
    const fn stage(self) -> u8 {
        match self {
            Self::Approved | Self::Declined => 0,
            Self::Captured => 1,
            Self::Refunded => 2,
        }
    }
}

/// One payment, keyed by processor id
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: String,

    /// Our order reference
    pub reference: Option<String>,

    pub status: PaymentStatus,

    /// Minor units, when the event carried it
    pub amount: Option<i64>,
    pub currency: Option<String>,

    pub customer_id: Option<String>,
    pub instrument_id: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(payment_id: impl Into<String>, status: PaymentStatus) -> Self {
        Self {
            payment_id: payment_id.into(),
            reference: None,
            status,
            amount: None,
            currency: None,
            customer_id: None,
            instrument_id: None,
            updated_at: Utc::now(),
        }
    }

    /// Fold a newer observation into this record
    fn merge(&mut self, update: Self) {
        if update.status.stage() >= self.status.stage() {
            self.status = update.status;
        }
        self.reference = update.reference.or_else(|| self.reference.take());
        self.amount = update.amount.or(self.amount);
        self.currency = update.currency.or_else(|| self.currency.take());
        self.customer_id = update.customer_id.or_else(|| self.customer_id.take());
        self.instrument_id = update.instrument_id.or_else(|| self.instrument_id.take());
        self.updated_at = update.updated_at;
    }
}

/// Ledger storage trait
pub trait PaymentLedger: Send + Sync {
    /// Insert or merge into the existing record
    fn record(&self, record: PaymentRecord) -> Result<PaymentRecord>;

    fn get(&self, payment_id: &str) -> Result<Option<PaymentRecord>>;

    fn get_by_reference(&self, reference: &str) -> Result<Option<PaymentRecord>>;

    /// Whether an event id has already been applied
    fn is_delivered(&self, event_id: &str) -> Result<bool>;

    /// Remember an applied event id
    fn mark_delivered(&self, event_id: &str) -> Result<()>;
}

/// In-memory ledger (for development)
#[derive(Default)]
pub struct MemoryPaymentLedger {
    payments: RwLock<HashMap<String, PaymentRecord>>,
    by_reference: RwLock<HashMap<String, String>>,
    events: RwLock<HashSet<String>>,
}

impl MemoryPaymentLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> PaymentError {
    PaymentError::Storage("ledger lock poisoned".into())
}

impl PaymentLedger for MemoryPaymentLedger {
    fn record(&self, record: PaymentRecord) -> Result<PaymentRecord> {
        let mut payments = self.payments.write().map_err(poisoned)?;
        let mut by_reference = self.by_reference.write().map_err(poisoned)?;

        let merged = match payments.remove(&record.payment_id) {
            Some(mut existing) => {
                existing.merge(record);
                existing
            }
            None => record,
        };

        if let Some(reference) = &merged.reference {
            by_reference.insert(reference.clone(), merged.payment_id.clone());
        }
        payments.insert(merged.payment_id.clone(), merged.clone());
        Ok(merged)
    }

    fn get(&self, payment_id: &str) -> Result<Option<PaymentRecord>> {
        let payments = self.payments.read().map_err(poisoned)?;
        Ok(payments.get(payment_id).cloned())
    }

    fn get_by_reference(&self, reference: &str) -> Result<Option<PaymentRecord>> {
        let by_reference = self.by_reference.read().map_err(poisoned)?;
        let payments = self.payments.read().map_err(poisoned)?;
        Ok(by_reference.get(reference).and_then(|id| payments.get(id)).cloned())
    }

    fn is_delivered(&self, event_id: &str) -> Result<bool> {
        Ok(self.events.read().map_err(poisoned)?.contains(event_id))
    }

    fn mark_delivered(&self, event_id: &str) -> Result<()> {
        self.events.write().map_err(poisoned)?.insert(event_id.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_late_approval_does_not_downgrade() {
        let ledger = MemoryPaymentLedger::new();
        let mut captured = PaymentRecord::new("pay_1", PaymentStatus::Captured);
        captured.amount = Some(68_000);
        ledger.record(captured).unwrap();

        let mut approved = PaymentRecord::new("pay_1", PaymentStatus::Approved);
        approved.reference = Some("ORD-1".into());
        let merged = ledger.record(approved).unwrap();

        assert_eq!(merged.status, PaymentStatus::Captured);
        assert_eq!(merged.amount, Some(68_000));
        assert_eq!(ledger.get_by_reference("ORD-1").unwrap().unwrap().payment_id, "pay_1");
    }

    #[test]
    fn test_refund_after_capture() {
        let ledger = MemoryPaymentLedger::new();
        ledger.record(PaymentRecord::new("pay_1", PaymentStatus::Captured)).unwrap();
        ledger.record(PaymentRecord::new("pay_1", PaymentStatus::Refunded)).unwrap();
        assert_eq!(ledger.get("pay_1").unwrap().unwrap().status, PaymentStatus::Refunded);
        assert!(ledger.get("pay_2").unwrap().is_none());
    }

    #[test]
    fn test_event_dedup() {
        let ledger = MemoryPaymentLedger::new();
        assert!(!ledger.is_delivered("evt_1").unwrap());
        ledger.mark_delivered("evt_1").unwrap();
        assert!(ledger.is_delivered("evt_1").unwrap());
    }
}
