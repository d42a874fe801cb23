//! Mock Rate Source
//!
//! For testing and offline demos. Serves configurable static rates and can be
//! told to fail either request.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;

use super::RateSource;
use crate::error::{CalcError, Result};

/// Mock rate source with static, adjustable rates
pub struct MockRateSource {
    fx_rate: RwLock<Decimal>,
    crypto_price: RwLock<Decimal>,
    fail_fx: AtomicBool,
    fail_price: AtomicBool,
}

impl Default for MockRateSource {
    fn default() -> Self {
        Self::new(dec!(83), dec!(60000))
    }
}

impl MockRateSource {
    pub fn new(fx_rate: Decimal, crypto_price: Decimal) -> Self {
        Self {
            fx_rate: RwLock::new(fx_rate),
            crypto_price: RwLock::new(crypto_price),
            fail_fx: AtomicBool::new(false),
            fail_price: AtomicBool::new(false),
        }
    }

    /// Change the rates served by subsequent polls
    pub async fn set_rates(&self, fx_rate: Decimal, crypto_price: Decimal) {
        *self.fx_rate.write().await = fx_rate;
        *self.crypto_price.write().await = crypto_price;
    }

    /// Make the exchange-rate request fail
    pub fn fail_fx(&self, fail: bool) {
        self.fail_fx.store(fail, Ordering::SeqCst);
    }

    /// Make the crypto-price request fail
    pub fn fail_price(&self, fail: bool) {
        self.fail_price.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RateSource for MockRateSource {
    async fn fx_rate(&self) -> Result<Decimal> {
        if self.fail_fx.load(Ordering::SeqCst) {
            return Err(CalcError::RateSource("mock exchange-rate outage".into()));
        }
        Ok(*self.fx_rate.read().await)
    }

    async fn crypto_price(&self) -> Result<Decimal> {
        if self.fail_price.load(Ordering::SeqCst) {
            return Err(CalcError::RateSource("mock crypto-price outage".into()));
        }
        Ok(*self.crypto_price.read().await)
    }

    fn name(&self) -> &str {
        "Mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_rates() {
        let source = MockRateSource::default();
        assert_eq!(source.fx_rate().await.unwrap(), dec!(83));
        assert_eq!(source.crypto_price().await.unwrap(), dec!(60000));
    }

    #[tokio::test]
    async fn test_mock_failures() {
        let source = MockRateSource::default();
        source.fail_fx(true);
        assert!(source.fx_rate().await.is_err());
        assert!(source.crypto_price().await.is_ok());

        source.fail_fx(false);
        source.fail_price(true);
        assert!(source.fx_rate().await.is_ok());
        assert!(source.crypto_price().await.is_err());
    }

    #[tokio::test]
    async fn test_set_rates() {
        let source = MockRateSource::default();
        source.set_rates(dec!(84), dec!(65000)).await;
        assert_eq!(source.fx_rate().await.unwrap(), dec!(84));
        assert_eq!(source.crypto_price().await.unwrap(), dec!(65000));
    }
}
