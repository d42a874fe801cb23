//! HTTP Rate Source
//!
//! Fetches the exchange rate from an exchangerate-api style endpoint
//! (`{"rates": {"INR": 83.1}}`) and the crypto price from a CoinGecko style
//! endpoint (`{"bitcoin": {"usd": 60000}}`).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use super::RateSource;
use crate::error::{CalcError, Result};

const DEFAULT_FX_URL: &str = "https://api.exchangerate-api.com/v4/latest/USD";
const DEFAULT_PRICE_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd";

/// Endpoints and keys for the HTTP rate source
#[derive(Clone, Debug)]
pub struct RateSourceConfig {
    /// Exchange-rate endpoint (USD base)
    pub fx_url: String,

    /// Crypto price endpoint
    pub price_url: String,

    /// Key read from the `rates` map (e.g. "INR")
    pub local_currency: String,

    /// Outer key of the price response (e.g. "bitcoin")
    pub crypto_id: String,

    /// Inner key of the price response (e.g. "usd")
    pub reference_currency: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RateSourceConfig {
    fn default() -> Self {
        Self {
            fx_url: DEFAULT_FX_URL.into(),
            price_url: DEFAULT_PRICE_URL.into(),
            local_currency: "INR".into(),
            crypto_id: "bitcoin".into(),
            reference_currency: "usd".into(),
            timeout_secs: 15,
        }
    }
}

impl RateSourceConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let var = |key: &str, fallback: String| std::env::var(key).unwrap_or(fallback);

        Self {
            fx_url: var("FX_RATES_URL", defaults.fx_url),
            price_url: var("CRYPTO_PRICE_URL", defaults.price_url),
            local_currency: var("LOCAL_CURRENCY", defaults.local_currency).to_uppercase(),
            crypto_id: var("CRYPTO_ID", defaults.crypto_id).to_lowercase(),
            reference_currency: var("REFERENCE_CURRENCY", defaults.reference_currency)
                .to_lowercase(),
            timeout_secs: std::env::var("RATE_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.timeout_secs),
        }
    }
}

#[derive(Deserialize)]
struct FxResponse {
    rates: HashMap<String, f64>,
}

/// `{ "<coin id>": { "<currency>": price } }`
type PriceResponse = HashMap<String, HashMap<String, f64>>;

/// Rate source backed by two public REST endpoints
pub struct HttpRateSource {
    client: reqwest::Client,
    config: RateSourceConfig,
}

impl HttpRateSource {
    pub fn new(config: RateSourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(RateSourceConfig::from_env())
    }

    pub const fn config(&self) -> &RateSourceConfig {
        &self.config
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}

/// Extract the local-currency entry from an exchange-rate body
fn parse_fx_rate(body: &str, currency: &str) -> Result<Decimal> {
    let parsed: FxResponse = serde_json::from_str(body)?;
    let rate = parsed
        .rates
        .get(currency)
        .copied()
        .ok_or_else(|| CalcError::MissingField {
            source_name: "exchange-rate".into(),
            field: format!("rates.{currency}"),
        })?;

    to_decimal(rate, currency)
}

/// Extract `<crypto_id>.<currency>` from a price body
fn parse_crypto_price(body: &str, crypto_id: &str, currency: &str) -> Result<Decimal> {
    let parsed: PriceResponse = serde_json::from_str(body)?;
    let price = parsed
        .get(crypto_id)
        .and_then(|quotes| quotes.get(currency))
        .copied()
        .ok_or_else(|| CalcError::MissingField {
            source_name: "crypto-price".into(),
            field: format!("{crypto_id}.{currency}"),
        })?;

    to_decimal(price, crypto_id)
}

fn to_decimal(value: f64, label: &str) -> Result<Decimal> {
    Decimal::from_f64(value)
        .filter(|d| *d > Decimal::ZERO)
        .ok_or_else(|| CalcError::InvalidRate(format!("{label}: {value}")))
}

#[async_trait]
impl RateSource for HttpRateSource {
    async fn fx_rate(&self) -> Result<Decimal> {
        let body = self.get_text(&self.config.fx_url).await?;
        parse_fx_rate(&body, &self.config.local_currency)
    }

    async fn crypto_price(&self) -> Result<Decimal> {
        let body = self.get_text(&self.config.price_url).await?;
        parse_crypto_price(&body, &self.config.crypto_id, &self.config.reference_currency)
    }

    fn name(&self) -> &str {
        "HTTP"
    }
}
