//! Public Rates Endpoint
//!
//! Fetches `{base_url}/{canonical}` and reads a `rates` object of
//! currency code to multiplier.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::{RateTable, RatesSource};
use crate::error::{Result, StorefrontError};
use crate::model::Currency;

/// Rates endpoint configuration
#[derive(Clone, Debug)]
pub struct RatesConfig {
    /// Endpoint prefix; the canonical currency code is appended
    pub base_url: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RatesConfig {
    fn default() -> Self {
        Self {
            base_url: "https://open.er-api.com/v6/latest".into(),
            timeout_secs: 5,
        }
    }
}

impl RatesConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("RATES_URL").unwrap_or(defaults.base_url),
            timeout_secs: std::env::var("RATES_TIMEOUT_SECS")
                .ok()
                .and_then(|t| t.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RatesResponse {
    rates: HashMap<String, Decimal>,
}

/// Rates source backed by an HTTP endpoint
pub struct HttpRatesSource {
    client: reqwest::Client,
    config: RatesConfig,
}

impl HttpRatesSource {
    pub fn new(config: RatesConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(RatesConfig::from_env())
    }

    fn url(&self) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            Currency::CANONICAL.code()
        )
    }

    /// Keep the currencies we know, ignore the rest
    fn into_table(response: RatesResponse) -> Result<RateTable> {
        let table: RateTable = response
            .rates
            .into_iter()
            .filter_map(|(code, rate)| Currency::from_code(&code).map(|c| (c, rate)))
            .collect();

        if table.is_empty() {
            return Err(StorefrontError::Rates("response contained no supported currencies".into()));
        }
        Ok(table)
    }
}

#[async_trait]
impl RatesSource for HttpRatesSource {
    async fn fetch_rates(&self) -> Result<RateTable> {
        let response = self
            .client
            .get(self.url())
            .send()
            .await?
            .error_for_status()?
            .json::<RatesResponse>()
            .await?;

        Self::into_table(response)
    }

    fn name(&self) -> &str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_appends_canonical_code() {
        let source = HttpRatesSource::new(RatesConfig {
            base_url: "https://rates.example/latest/".into(),
            timeout_secs: 1,
        })
        .unwrap();
        assert_eq!(source.url(), "https://rates.example/latest/HKD");
    }

    #[test]
    fn test_unknown_codes_are_ignored() {
        let response: RatesResponse =
            serde_json::from_str(r#"{"result":"success","rates":{"USD":0.128,"XAU":0.00005}}"#)
                .unwrap();
        let table = HttpRatesSource::into_table(response).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.contains_key(&Currency::Usd));
    }

    #[test]
    fn test_empty_table_is_an_error() {
        let response: RatesResponse = serde_json::from_str(r#"{"rates":{"XAU":1}}"#).unwrap();
        assert!(HttpRatesSource::into_table(response).is_err());
    }
}
