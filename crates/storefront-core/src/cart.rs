//! Cart Store
//!
//! Owns the cart's line items. Built from the persisted snapshot when a page
//! loads and written back after every mutation.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::currency::FxAdapter;
use crate::error::{Result, StorefrontError};
use crate::model::{CartItem, Currency};
use crate::storage::{Scope, Storage, StorageKey, load_json, save_json};

/// Persisted list of line items
pub struct CartStore {
    storage: Arc<dyn Storage>,
    items: Vec<CartItem>,
}

impl CartStore {
    /// Load the cart; missing or corrupt data yields an empty cart
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let mut items: Vec<CartItem> =
            load_json(storage.as_ref(), Scope::Durable, StorageKey::Cart).unwrap_or_default();

        let before = items.len();
        items.retain(|item| item.quantity >= 1);
        if items.len() != before {
            tracing::warn!(dropped = before - items.len(), "Dropped stored cart lines with zero quantity");
        }

        Self { storage, items }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of units across all lines
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|item| item.quantity).sum()
    }

    /// Add one unit; a line with the same name is incremented instead
    pub fn add(&mut self, item: CartItem) -> Result<()> {
        if let Some(existing) = self.items.iter_mut().find(|i| i.name == item.name) {
            existing.quantity = existing.quantity.saturating_add(1);
            tracing::debug!(name = %existing.name, quantity = existing.quantity, "Incremented cart line");
        } else {
            tracing::debug!(name = %item.name, "Added cart line");
            self.items.push(CartItem { quantity: 1, ..item });
        }
        self.persist()
    }

    /// Adjust quantity by `delta`; lines reaching zero are removed
    pub fn set_quantity(&mut self, index: usize, delta: i64) -> Result<()> {
        let len = self.items.len();
        let item = self
            .items
            .get_mut(index)
            .ok_or(StorefrontError::IndexOutOfRange { index, len })?;

        let updated = i64::from(item.quantity).saturating_add(delta);
        if updated <= 0 {
            let removed = self.items.remove(index);
            tracing::debug!(name = %removed.name, "Removed cart line at zero quantity");
        } else {
            item.quantity = u32::try_from(updated).unwrap_or(u32::MAX);
        }
        self.persist()
    }

    /// Delete the line at `index`
    pub fn remove(&mut self, index: usize) -> Result<CartItem> {
        if index >= self.items.len() {
            return Err(StorefrontError::IndexOutOfRange {
                index,
                len: self.items.len(),
            });
        }
        let removed = self.items.remove(index);
        self.persist()?;
        Ok(removed)
    }

    /// Sum of lines displayed in `currency`
    ///
    /// Lines shown in other currencies are left out, not converted.
    pub fn total(&self, currency: Currency) -> Decimal {
        self.items
            .iter()
            .filter(|item| item.display_currency == currency)
            .map(CartItem::line_total)
            .sum()
    }

    /// Every line converted from its canonical price into `currency`
    pub fn total_converted(&self, fx: &FxAdapter, currency: Currency) -> Decimal {
        self.items
            .iter()
            .map(|item| fx.convert(item.unit_price_canonical, currency) * Decimal::from(item.quantity))
            .sum()
    }

    /// Empty the cart
    pub fn clear(&mut self) -> Result<()> {
        self.items.clear();
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        save_json(self.storage.as_ref(), Scope::Durable, StorageKey::Cart, &self.items)
    }
}
