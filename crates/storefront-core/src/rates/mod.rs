//! FX Rate Sources
//!
//! Abstractions and implementations for fetching currency multipliers
//! relative to the canonical currency.

mod fallback;
mod http;

pub use fallback::{StaticRatesSource, fallback_rates};
pub use http::{HttpRatesSource, RatesConfig};

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;
use crate::model::Currency;

/// Multiplier from one canonical unit to each currency
pub type RateTable = HashMap<Currency, Decimal>;

/// Rates source trait (Strategy pattern)
///
/// Implement this for each provider of exchange rates.
#[async_trait]
pub trait RatesSource: Send + Sync {
    /// Fetch multipliers keyed by currency
    async fn fetch_rates(&self) -> Result<RateTable>;

    /// Source name for logs
    fn name(&self) -> &str;
}
