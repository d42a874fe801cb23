//! Rate Sources
//!
//! Abstractions and implementations for the two market inputs: the
//! reference-to-local exchange rate and the crypto price.

mod http;
mod mock;

pub use http::{HttpRateSource, RateSourceConfig};
pub use mock::MockRateSource;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::error::Result;

/// Rate source trait (Strategy pattern)
///
/// The two fetches are independent; callers decide how to combine them.
#[async_trait]
pub trait RateSource: Send + Sync {
    /// Units of local currency per unit of reference currency (e.g. USD/INR)
    async fn fx_rate(&self) -> Result<Decimal>;

    /// Crypto price in the reference currency (e.g. BTC/USD)
    async fn crypto_price(&self) -> Result<Decimal>;

    /// Source name
    fn name(&self) -> &str;
}
