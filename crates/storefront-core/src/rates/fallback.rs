//! Static Rates
//!
//! Used whenever the live source cannot be reached, and in tests.

use async_trait::async_trait;
use rust_decimal_macros::dec;

use super::{RateTable, RatesSource};
use crate::error::Result;
use crate::model::Currency;

/// Fixed table installed when fetching fails
pub fn fallback_rates() -> RateTable {
    RateTable::from([
        (Currency::Hkd, dec!(1)),
        (Currency::Usd, dec!(0.128)),
        (Currency::Cny, dec!(0.92)),
        (Currency::Jpy, dec!(19.2)),
        (Currency::Eur, dec!(0.118)),
        (Currency::Gbp, dec!(0.101)),
        (Currency::Sgd, dec!(0.172)),
    ])
}

/// Rates source that always returns the same table
pub struct StaticRatesSource {
    rates: RateTable,
}

impl Default for StaticRatesSource {
    fn default() -> Self {
        Self::new(fallback_rates())
    }
}

impl StaticRatesSource {
    pub const fn new(rates: RateTable) -> Self {
        Self { rates }
    }
}

#[async_trait]
impl RatesSource for StaticRatesSource {
    async fn fetch_rates(&self) -> Result<RateTable> {
        Ok(self.rates.clone())
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_covers_every_currency() {
        let rates = fallback_rates();
        for currency in Currency::ALL {
            assert!(rates.contains_key(&currency), "missing {currency}");
        }
        assert_eq!(rates[&Currency::CANONICAL], dec!(1));
    }
}
