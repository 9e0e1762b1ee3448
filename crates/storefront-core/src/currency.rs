//! Currency Conversion
//!
//! Converts canonical-currency amounts for display. Rates are fetched once
//! per page; failures install the fallback table instead of surfacing.

use std::sync::Arc;

use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::Currency;
use crate::rates::{RateTable, RatesSource, fallback_rates};
use crate::storage::{Scope, Storage, StorageKey, load_json, save_json};

/// Display-currency converter with cached rates
pub struct FxAdapter {
    source: Arc<dyn RatesSource>,
    rates: RateTable,
    live: bool,
}

impl FxAdapter {
    /// Starts on the fallback table until `fetch_rates` succeeds
    pub fn new(source: Arc<dyn RatesSource>) -> Self {
        Self {
            source,
            rates: fallback_rates(),
            live: false,
        }
    }

    /// Refresh rates from the source; always resolves
    pub async fn fetch_rates(&mut self) -> &RateTable {
        match self.source.fetch_rates().await {
            Ok(rates) => {
                tracing::info!(source = self.source.name(), currencies = rates.len(), "Fetched FX rates");
                self.rates = rates;
                self.live = true;
            }
            Err(e) => {
                tracing::warn!(source = self.source.name(), error = %e, "FX fetch failed, using fallback rates");
                self.rates = fallback_rates();
                self.live = false;
            }
        }
        &self.rates
    }

    /// Whether the current table came from the live source
    pub const fn is_live(&self) -> bool {
        self.live
    }

    pub const fn rates(&self) -> &RateTable {
        &self.rates
    }

    /// Multiplier for `currency`, falling back per currency when missing
    pub fn rate(&self, currency: Currency) -> Decimal {
        if currency == Currency::CANONICAL {
            return Decimal::ONE;
        }
        self.rates
            .get(&currency)
            .copied()
            .or_else(|| fallback_rates().get(&currency).copied())
            .unwrap_or(Decimal::ONE)
    }

    /// Canonical amount expressed in `target`, rounded for display
    pub fn convert(&self, amount_canonical: Decimal, target: Currency) -> Decimal {
        target.round(amount_canonical * self.rate(target))
    }
}

/// Sticky display-currency choice
///
/// The session copy wins; the durable copy seeds new tabs.
pub struct CurrencyPreference {
    storage: Arc<dyn Storage>,
    current: Currency,
}

impl CurrencyPreference {
    pub fn load(storage: Arc<dyn Storage>) -> Self {
        let current = load_json(storage.as_ref(), Scope::Session, StorageKey::DisplayCurrency)
            .or_else(|| load_json(storage.as_ref(), Scope::Durable, StorageKey::DisplayCurrency))
            .unwrap_or_default();
        Self { storage, current }
    }

    pub const fn current(&self) -> Currency {
        self.current
    }

    /// Change the display currency; callers re-render with cached rates
    pub fn select(&mut self, currency: Currency) -> Result<()> {
        save_json(self.storage.as_ref(), Scope::Session, StorageKey::DisplayCurrency, &currency)?;
        save_json(self.storage.as_ref(), Scope::Durable, StorageKey::DisplayCurrency, &currency)?;
        tracing::debug!(currency = %currency, "Display currency selected");
        self.current = currency;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorefrontError;
    use crate::rates::StaticRatesSource;
    use crate::storage::MemoryStorage;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FailingSource;

    #[async_trait]
    impl RatesSource for FailingSource {
        async fn fetch_rates(&self) -> Result<RateTable> {
            Err(StorefrontError::Rates("offline".into()))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    #[derive(Default)]
    struct CountingSource(AtomicUsize);

    #[async_trait]
    impl RatesSource for CountingSource {
        async fn fetch_rates(&self) -> Result<RateTable> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(RateTable::from([(Currency::Usd, dec!(0.13))]))
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn test_failed_fetch_uses_fallback() {
        let mut fx = FxAdapter::new(Arc::new(FailingSource));
        let rates = fx.fetch_rates().await;
        assert_eq!(rates, &fallback_rates());
        assert!(!fx.is_live());
    }

    #[tokio::test]
    async fn test_rounding_per_currency() {
        let mut fx = FxAdapter::new(Arc::new(StaticRatesSource::default()));
        fx.fetch_rates().await;

        assert_eq!(fx.convert(dec!(100), Currency::Usd), dec!(12.80));
        assert_eq!(fx.convert(dec!(99.99), Currency::Jpy), dec!(1920));
        assert_eq!(fx.convert(dec!(100), Currency::Hkd), dec!(100));
    }

    #[tokio::test]
    async fn test_missing_currency_uses_fallback_rate() {
        let source = Arc::new(CountingSource::default());
        let mut fx = FxAdapter::new(source);
        fx.fetch_rates().await;

        assert_eq!(fx.rate(Currency::Usd), dec!(0.13));
        assert_eq!(fx.rate(Currency::Eur), fallback_rates()[&Currency::Eur]);
    }

    #[tokio::test]
    async fn test_selecting_currency_does_not_refetch() {
        let source = Arc::new(CountingSource::default());
        let mut fx = FxAdapter::new(source.clone());
        fx.fetch_rates().await;

        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let mut preference = CurrencyPreference::load(storage.clone());
        assert_eq!(preference.current(), Currency::Hkd);

        preference.select(Currency::Usd).unwrap();
        assert_eq!(fx.convert(dec!(100), preference.current()), dec!(13.00));
        assert_eq!(source.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_preference_is_sticky() {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        CurrencyPreference::load(storage.clone()).select(Currency::Jpy).unwrap();

        // New tab: session gone, durable mirror remains
        storage.clear_scope(Scope::Session).unwrap();
        assert_eq!(CurrencyPreference::load(storage.clone()).current(), Currency::Jpy);

        save_json(storage.as_ref(), Scope::Session, StorageKey::DisplayCurrency, &Currency::Eur).unwrap();
        assert_eq!(CurrencyPreference::load(storage).current(), Currency::Eur);
    }
}
