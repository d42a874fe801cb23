//! Conversion Engine
//!
//! Pure conversions between a target fiat amount and the net crypto a seller
//! sends after a premium. Every function is total: missing or non-positive
//! rates, a 100% premium, and arithmetic overflow all degrade to zero.
//!
//! ```text
//! market crypto = (fiat / fx_rate) / crypto_price
//! net crypto    = market crypto * (1 - premium / 100)
//! ```

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::model::{RateSnapshot, TradeState};

/// Positive rate, or `None` when absent/zero/negative
fn usable(rate: Option<Decimal>) -> Option<Decimal> {
    rate.filter(|r| *r > Decimal::ZERO)
}

/// `1 - premium/100`
pub fn premium_factor(premium_percent: Decimal) -> Decimal {
    premium_percent
        .checked_div(dec!(100))
        .and_then(|p| Decimal::ONE.checked_sub(p))
        .unwrap_or(Decimal::ZERO)
}

/// Crypto whose fair market value equals `fiat`
pub fn market_crypto_for_fiat(
    fiat: Decimal,
    fx_rate: Option<Decimal>,
    crypto_price: Option<Decimal>,
) -> Decimal {
    let (Some(rate), Some(price)) = (usable(fx_rate), usable(crypto_price)) else {
        return Decimal::ZERO;
    };

    fiat.checked_div(rate)
        .and_then(|reference| reference.checked_div(price))
        .unwrap_or(Decimal::ZERO)
}

/// Market-equivalent crypto of a net amount: `net / premium_factor`.
///
/// Zero unless the premium factor is positive.
pub fn market_crypto_for_net(net_crypto: Decimal, premium_percent: Decimal) -> Decimal {
    let factor = premium_factor(premium_percent);
    if factor <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    net_crypto.checked_div(factor).unwrap_or(Decimal::ZERO)
}

/// Net crypto to send so the buyer's `target_fiat` covers market value less the premium.
pub fn fiat_to_net_crypto(
    target_fiat: Decimal,
    fx_rate: Option<Decimal>,
    crypto_price: Option<Decimal>,
    premium_percent: Decimal,
) -> Decimal {
    let market = market_crypto_for_fiat(target_fiat, fx_rate, crypto_price);
    market
        .checked_mul(premium_factor(premium_percent))
        .unwrap_or(Decimal::ZERO)
}

/// Fiat to ask for when sending `net_crypto` at the given premium.
pub fn net_crypto_to_fiat(
    net_crypto: Decimal,
    fx_rate: Option<Decimal>,
    crypto_price: Option<Decimal>,
    premium_percent: Decimal,
) -> Decimal {
    let (Some(rate), Some(price)) = (usable(fx_rate), usable(crypto_price)) else {
        return Decimal::ZERO;
    };

    market_crypto_for_net(net_crypto, premium_percent)
        .checked_mul(price)
        .and_then(|reference| reference.checked_mul(rate))
        .unwrap_or(Decimal::ZERO)
}

/// Display quantities derived from the current state and rates.
///
/// Unset amounts count as zero here; these values are never fed back into
/// the trade state.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breakdown {
    /// Crypto worth the same as the net amount before the premium discount
    pub market_crypto: Decimal,

    /// Crypto the seller keeps thanks to the premium
    pub discount_crypto: Decimal,

    /// Market value, in local currency, of the crypto actually sent
    pub fiat_value_sent: Decimal,

    /// Target fiat minus the market value of what is sent
    pub profit_fiat: Decimal,
}

impl Breakdown {
    pub fn compute(state: &TradeState, rates: Option<&RateSnapshot>) -> Self {
        let net = state.net_crypto_amount.unwrap_or(Decimal::ZERO);
        let fiat = state.target_fiat_amount.unwrap_or(Decimal::ZERO);

        let market_crypto = market_crypto_for_net(net, state.premium_percent);
        let fiat_value_sent = rates
            .and_then(|r| net.checked_mul(r.crypto_price())?.checked_mul(r.fx_rate()))
            .unwrap_or(Decimal::ZERO);

        Self {
            market_crypto,
            discount_crypto: market_crypto.checked_sub(net).unwrap_or(Decimal::ZERO),
            fiat_value_sent,
            profit_fiat: fiat.checked_sub(fiat_value_sent).unwrap_or(Decimal::ZERO),
        }
    }
}
