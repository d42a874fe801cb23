//! Domain Models
//!
//! Market inputs and the user-adjustable trade quantities.
//! Uses `rust_decimal` for all monetary values - never use f64 for money!

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{CalcError, Result};

/// Lowest premium the input layer accepts (percent)
pub const PREMIUM_MIN: Decimal = dec!(0);

/// Highest premium the input layer accepts (percent)
pub const PREMIUM_MAX: Decimal = dec!(20);

/// Slider step for premium input (percent)
pub const PREMIUM_STEP: Decimal = dec!(0.1);

/// Market inputs captured at one instant.
///
/// Both values are validated positive on construction and the snapshot is
/// never modified afterwards; a newer poll produces a whole new snapshot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateSnapshot {
    crypto_price: Decimal,
    fx_rate: Decimal,
    captured_at: DateTime<Utc>,
}

impl RateSnapshot {
    /// Snapshot stamped with the current time
    pub fn new(crypto_price: Decimal, fx_rate: Decimal) -> Result<Self> {
        Self::captured(crypto_price, fx_rate, Utc::now())
    }

    /// Snapshot with an explicit capture time
    pub fn captured(
        crypto_price: Decimal,
        fx_rate: Decimal,
        captured_at: DateTime<Utc>,
    ) -> Result<Self> {
        if crypto_price <= Decimal::ZERO {
            return Err(CalcError::InvalidRate(format!(
                "crypto price must be positive, got {crypto_price}"
            )));
        }
        if fx_rate <= Decimal::ZERO {
            return Err(CalcError::InvalidRate(format!(
                "exchange rate must be positive, got {fx_rate}"
            )));
        }

        Ok(Self {
            crypto_price,
            fx_rate,
            captured_at,
        })
    }

    /// Crypto price in the reference currency (e.g. BTC/USD)
    pub const fn crypto_price(&self) -> Decimal {
        self.crypto_price
    }

    /// Reference-to-local exchange rate (e.g. USD/INR)
    pub const fn fx_rate(&self) -> Decimal {
        self.fx_rate
    }

    pub const fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }
}

/// Which linked amount the user typed last
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EditedField {
    #[default]
    Fiat,
    Crypto,
}

impl std::fmt::Display for EditedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fiat => write!(f, "fiat"),
            Self::Crypto => write!(f, "crypto"),
        }
    }
}

/// The user-adjustable quantities of one trade.
///
/// `None` on an amount means the input box was cleared.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeState {
    /// Local-currency amount the seller wants to receive
    pub target_fiat_amount: Option<Decimal>,

    /// Crypto the seller sends
    pub net_crypto_amount: Option<Decimal>,

    /// Premium (percent) the seller keeps by sending less than market value
    pub premium_percent: Decimal,

    /// Authoritative field; the other amount is derived from it
    pub edited_field: EditedField,
}

impl Default for TradeState {
    fn default() -> Self {
        Self {
            target_fiat_amount: Some(dec!(35000)),
            net_crypto_amount: Some(Decimal::ZERO),
            premium_percent: dec!(3.0),
            edited_field: EditedField::Fiat,
        }
    }
}

impl TradeState {
    /// Fresh state with a custom target and premium
    pub fn with_defaults(target_fiat: Decimal, premium_percent: Decimal) -> Self {
        Self {
            target_fiat_amount: Some(target_fiat),
            premium_percent,
            ..Self::default()
        }
    }

    /// Value of the authoritative field
    pub const fn authoritative_amount(&self) -> Option<Decimal> {
        match self.edited_field {
            EditedField::Fiat => self.target_fiat_amount,
            EditedField::Crypto => self.net_crypto_amount,
        }
    }
}

/// Parse raw amount input. Blank or non-numeric text yields `None`.
pub fn parse_amount(input: &str) -> Option<Decimal> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }

    let parsed = trimmed
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(trimmed))
        .ok();
    if parsed.is_none() {
        tracing::debug!(input = trimmed, "non-numeric amount treated as unset");
    }
    parsed
}

/// Whether a premium lies within the slider range
pub fn premium_in_range(premium: Decimal) -> bool {
    (PREMIUM_MIN..=PREMIUM_MAX).contains(&premium)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_rejects_non_positive_rates() {
        assert!(RateSnapshot::new(dec!(60000), dec!(83)).is_ok());
        assert!(RateSnapshot::new(Decimal::ZERO, dec!(83)).is_err());
        assert!(RateSnapshot::new(dec!(60000), dec!(-1)).is_err());
    }

    #[test]
    fn test_default_trade_state() {
        let state = TradeState::default();
        assert_eq!(state.target_fiat_amount, Some(dec!(35000)));
        assert_eq!(state.net_crypto_amount, Some(Decimal::ZERO));
        assert_eq!(state.premium_percent, dec!(3));
        assert_eq!(state.edited_field, EditedField::Fiat);
        assert_eq!(state.authoritative_amount(), Some(dec!(35000)));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("35000"), Some(dec!(35000)));
        assert_eq!(parse_amount(" 0.00682065 "), Some(dec!(0.00682065)));
        assert_eq!(parse_amount("1e-3"), Some(dec!(0.001)));
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("   "), None);
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_premium_range() {
        assert!(premium_in_range(dec!(0)));
        assert!(premium_in_range(dec!(20)));
        assert!(!premium_in_range(dec!(20.1)));
        assert!(!premium_in_range(dec!(-0.1)));
    }

    #[test]
    fn test_edited_field_serde() {
        let json = serde_json::to_string(&EditedField::Crypto).unwrap();
        assert_eq!(json, "\"crypto\"");
    }
}
