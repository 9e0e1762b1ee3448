//! Shopper Session
//!
//! Small durable facts about the shopper that outlive a single checkout:
//! login flag, saved shipping profile, where checkout was entered from, and
//! the processor identifiers of a returning customer.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Page, ShippingAddress};
use crate::storage::{Scope, Storage, StorageKey, load_json, save_json};

/// Identifiers the processor returned for earlier payments
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReturningCustomer {
    pub customer_id: Option<String>,
    pub instrument_ids: Vec<String>,
}

/// Durable per-browser shopper state
#[derive(Clone)]
pub struct ShopperSession {
    storage: Arc<dyn Storage>,
}

impl ShopperSession {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn is_logged_in(&self) -> bool {
        load_json(self.storage.as_ref(), Scope::Durable, StorageKey::LoggedIn).unwrap_or(false)
    }

    pub fn set_logged_in(&self, logged_in: bool) -> Result<()> {
        save_json(self.storage.as_ref(), Scope::Durable, StorageKey::LoggedIn, &logged_in)
    }

    pub fn shipping_profile(&self) -> Option<ShippingAddress> {
        load_json(self.storage.as_ref(), Scope::Durable, StorageKey::ShippingProfile)
    }

    pub fn save_shipping_profile(&self, address: &ShippingAddress) -> Result<()> {
        save_json(self.storage.as_ref(), Scope::Durable, StorageKey::ShippingProfile, address)
    }

    /// Page the shopper entered checkout from, for the back link
    pub fn checkout_source(&self) -> Option<Page> {
        load_json(self.storage.as_ref(), Scope::Durable, StorageKey::CheckoutSource)
    }

    pub fn record_checkout_source(&self, page: Page) -> Result<()> {
        save_json(self.storage.as_ref(), Scope::Durable, StorageKey::CheckoutSource, &page)
    }

    pub fn returning_customer(&self) -> ReturningCustomer {
        ReturningCustomer {
            customer_id: load_json(self.storage.as_ref(), Scope::Durable, StorageKey::CustomerId),
            instrument_ids: load_json(self.storage.as_ref(), Scope::Durable, StorageKey::InstrumentIds)
                .unwrap_or_default(),
        }
    }

    /// Store ids from a completed payment; instrument ids are kept unique
    pub fn remember_payment(&self, customer_id: Option<&str>, instrument_id: Option<&str>) -> Result<()> {
        if let Some(customer_id) = customer_id {
            save_json(self.storage.as_ref(), Scope::Durable, StorageKey::CustomerId, customer_id)?;
        }

        if let Some(instrument_id) = instrument_id {
            let mut ids = self.returning_customer().instrument_ids;
            if !ids.iter().any(|id| id == instrument_id) {
                ids.push(instrument_id.to_string());
                save_json(self.storage.as_ref(), Scope::Durable, StorageKey::InstrumentIds, &ids)?;
            }
        }
        Ok(())
    }

    /// Forget everything tied to the shopper's identity
    pub fn log_out(&self) -> Result<()> {
        self.set_logged_in(false)?;
        self.storage.remove(Scope::Durable, StorageKey::CustomerId)?;
        self.storage.remove(Scope::Durable, StorageKey::InstrumentIds)?;
        self.storage.remove(Scope::Durable, StorageKey::SavedCard)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;

    fn session() -> ShopperSession {
        ShopperSession::new(Arc::new(MemoryStorage::new()))
    }

    #[test]
    fn test_login_flag_defaults_to_false() {
        let session = session();
        assert!(!session.is_logged_in());
        session.set_logged_in(true).unwrap();
        assert!(session.is_logged_in());
    }

    #[test]
    fn test_instrument_ids_are_deduplicated() {
        let session = session();
        session.remember_payment(Some("cus_1"), Some("src_a")).unwrap();
        session.remember_payment(None, Some("src_a")).unwrap();
        session.remember_payment(None, Some("src_b")).unwrap();

        let customer = session.returning_customer();
        assert_eq!(customer.customer_id.as_deref(), Some("cus_1"));
        assert_eq!(customer.instrument_ids, vec!["src_a", "src_b"]);
    }

    #[test]
    fn test_log_out_clears_identity() {
        let session = session();
        session.set_logged_in(true).unwrap();
        session.remember_payment(Some("cus_1"), Some("src_a")).unwrap();
        session.record_checkout_source(Page::Cart).unwrap();

        session.log_out().unwrap();

        assert!(!session.is_logged_in());
        assert_eq!(session.returning_customer(), ReturningCustomer::default());
        assert_eq!(session.checkout_source(), Some(Page::Cart));
    }
}
