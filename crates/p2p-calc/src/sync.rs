//! Sync Controller
//!
//! Owns the trade state and keeps the two linked amounts consistent.
//!
//! Whichever amount the user typed last is authoritative. Every transition
//! (amount edit, premium change, fresh rates) re-derives only the other
//! amount, so a background rate refresh or a premium drag never overwrites
//! what the user entered.
//!
//! ```text
//!   edit fiat ──▶ fiat := v, authority := Fiat ──▶ crypto := f(fiat)
//!   edit crypto ▶ crypto := v, authority := Crypto ▶ fiat := g(crypto)
//!   premium / rates ──────────────────────────────▶ re-derive non-authority
//! ```

use rust_decimal::Decimal;

use crate::conversion::{fiat_to_net_crypto, net_crypto_to_fiat, Breakdown};
use crate::model::{EditedField, RateSnapshot, TradeState};

/// State machine over [`TradeState`] and the latest [`RateSnapshot`]
#[derive(Clone, Debug, Default)]
pub struct SyncController {
    state: TradeState,
    rates: Option<RateSnapshot>,
}

impl SyncController {
    pub const fn new(state: TradeState) -> Self {
        Self { state, rates: None }
    }

    pub const fn state(&self) -> &TradeState {
        &self.state
    }

    pub const fn rates(&self) -> Option<&RateSnapshot> {
        self.rates.as_ref()
    }

    /// Derived display values for the current state
    pub fn breakdown(&self) -> Breakdown {
        Breakdown::compute(&self.state, self.rates.as_ref())
    }

    /// User typed into the fiat box. `None` means the box was cleared.
    pub fn edit_fiat(&mut self, value: Option<Decimal>) {
        self.state.target_fiat_amount = value;
        self.state.edited_field = EditedField::Fiat;

        if let (Some(fiat), Some(rates)) = (value, self.rates) {
            self.state.net_crypto_amount = Some(fiat_to_net_crypto(
                fiat,
                Some(rates.fx_rate()),
                Some(rates.crypto_price()),
                self.state.premium_percent,
            ));
        }

        tracing::debug!(fiat = ?value, crypto = ?self.state.net_crypto_amount, "fiat edited");
    }

    /// User typed into the crypto box. `None` means the box was cleared.
    pub fn edit_crypto(&mut self, value: Option<Decimal>) {
        self.state.net_crypto_amount = value;
        self.state.edited_field = EditedField::Crypto;

        if let (Some(crypto), Some(rates)) = (value, self.rates) {
            self.state.target_fiat_amount = Some(net_crypto_to_fiat(
                crypto,
                Some(rates.fx_rate()),
                Some(rates.crypto_price()),
                self.state.premium_percent,
            ));
        }

        tracing::debug!(crypto = ?value, fiat = ?self.state.target_fiat_amount, "crypto edited");
    }

    /// Premium moved. Authority is unchanged.
    pub fn set_premium(&mut self, premium_percent: Decimal) {
        self.state.premium_percent = premium_percent;
        self.rederive();
    }

    /// User focused an input box; it becomes authoritative without recomputing.
    pub fn focus(&mut self, field: EditedField) {
        self.state.edited_field = field;
    }

    /// A successful poll delivered new rates; they replace the current ones.
    ///
    /// The feed delivers polls in issue order, so the wall-clock capture
    /// time is not consulted.
    pub fn apply_rates(&mut self, snapshot: RateSnapshot) {
        self.rates = Some(snapshot);
        self.rederive();
    }

    /// Recompute the non-authoritative amount from the authoritative one.
    ///
    /// Skipped without rates, or while the authoritative box is empty.
    fn rederive(&mut self) {
        let Some(rates) = self.rates else {
            return;
        };
        let fx_rate = Some(rates.fx_rate());
        let price = Some(rates.crypto_price());
        let premium = self.state.premium_percent;

        match self.state.edited_field {
            EditedField::Fiat => {
                if let Some(fiat) = self.state.target_fiat_amount {
                    self.state.net_crypto_amount =
                        Some(fiat_to_net_crypto(fiat, fx_rate, price, premium));
                }
            }
            EditedField::Crypto => {
                if let Some(crypto) = self.state.net_crypto_amount {
                    self.state.target_fiat_amount =
                        Some(net_crypto_to_fiat(crypto, fx_rate, price, premium));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    fn rates() -> RateSnapshot {
        RateSnapshot::new(dec!(60000), dec!(83)).unwrap()
    }

    fn live_controller() -> SyncController {
        let mut controller = SyncController::default();
        controller.apply_rates(rates());
        controller
    }

    #[test]
    fn test_initial_load_keeps_zero_crypto_until_rates() {
        let controller = SyncController::default();
        assert_eq!(controller.state().net_crypto_amount, Some(Decimal::ZERO));
        assert!(controller.rates().is_none());
    }

    #[test]
    fn test_first_rates_derive_crypto_from_default_fiat() {
        let controller = live_controller();
        let expected = fiat_to_net_crypto(dec!(35000), Some(dec!(83)), Some(dec!(60000)), dec!(3));
        assert_eq!(controller.state().net_crypto_amount, Some(expected));
        assert_eq!(controller.state().target_fiat_amount, Some(dec!(35000)));
    }

    #[test]
    fn test_edit_without_rates_keeps_paired_value() {
        let mut controller = SyncController::default();
        controller.edit_fiat(Some(dec!(50000)));

        assert_eq!(controller.state().target_fiat_amount, Some(dec!(50000)));
        assert_eq!(controller.state().net_crypto_amount, Some(Decimal::ZERO));
        assert_eq!(controller.state().edited_field, EditedField::Fiat);
    }

    #[test]
    fn test_edit_crypto_derives_fiat() {
        let mut controller = live_controller();
        controller.set_premium(dec!(5));
        controller.edit_crypto(Some(dec!(0.01)));

        let fiat = controller.state().target_fiat_amount.unwrap();
        assert!((fiat - dec!(52421.05)).abs() < dec!(0.01));
        assert_eq!(controller.state().edited_field, EditedField::Crypto);
    }

    #[test]
    fn test_cleared_input_does_not_snap_partner_to_zero() {
        let mut controller = live_controller();
        let crypto_before = controller.state().net_crypto_amount;

        controller.edit_fiat(None);

        assert_eq!(controller.state().target_fiat_amount, None);
        assert_eq!(controller.state().net_crypto_amount, crypto_before);
    }

    #[test]
    fn test_premium_change_preserves_fiat_authority() {
        let mut controller = live_controller();
        controller.edit_fiat(Some(dec!(35000)));
        let crypto_before = controller.state().net_crypto_amount.unwrap();

        controller.set_premium(dec!(10));

        assert_eq!(controller.state().target_fiat_amount, Some(dec!(35000)));
        let crypto_after = controller.state().net_crypto_amount.unwrap();
        assert!(crypto_after < crypto_before);
        assert_eq!(controller.state().edited_field, EditedField::Fiat);
    }

    #[test]
    fn test_premium_change_preserves_crypto_authority() {
        let mut controller = live_controller();
        controller.edit_crypto(Some(dec!(0.01)));
        let fiat_before = controller.state().target_fiat_amount.unwrap();

        controller.set_premium(dec!(10));

        assert_eq!(controller.state().net_crypto_amount, Some(dec!(0.01)));
        let fiat_after = controller.state().target_fiat_amount.unwrap();
        assert!(fiat_after > fiat_before);
        assert_eq!(controller.state().edited_field, EditedField::Crypto);
    }

    #[test]
    fn test_premium_change_with_unset_authority_is_noop() {
        let mut controller = live_controller();
        controller.edit_fiat(None);
        let crypto_before = controller.state().net_crypto_amount;

        controller.set_premium(dec!(7.5));

        assert_eq!(controller.state().premium_percent, dec!(7.5));
        assert_eq!(controller.state().net_crypto_amount, crypto_before);
    }

    #[test]
    fn test_rate_refresh_does_not_clobber_unset_crypto() {
        let mut controller = live_controller();
        controller.edit_fiat(Some(dec!(12345)));
        controller.edit_crypto(None);

        let later = RateSnapshot::captured(dec!(65000), dec!(84), Utc::now() + Duration::seconds(60))
            .unwrap();
        controller.apply_rates(later);

        assert_eq!(controller.state().net_crypto_amount, None);
        assert_eq!(controller.state().target_fiat_amount, Some(dec!(12345)));
        assert_eq!(controller.rates(), Some(&later));
    }

    #[test]
    fn test_rate_refresh_rederives_from_crypto_authority() {
        let mut controller = live_controller();
        controller.edit_crypto(Some(dec!(0.02)));

        let later = RateSnapshot::captured(dec!(70000), dec!(83), Utc::now() + Duration::seconds(60))
            .unwrap();
        controller.apply_rates(later);

        assert_eq!(controller.state().net_crypto_amount, Some(dec!(0.02)));
        let expected = net_crypto_to_fiat(dec!(0.02), Some(dec!(83)), Some(dec!(70000)), dec!(3));
        assert_eq!(controller.state().target_fiat_amount, Some(expected));
    }

    #[test]
    fn test_poll_after_clock_step_back_is_applied() {
        let mut controller = SyncController::default();
        let ahead = RateSnapshot::captured(dec!(60000), dec!(83), Utc::now() + Duration::hours(1))
            .unwrap();
        controller.apply_rates(ahead);

        let fresh = RateSnapshot::new(dec!(30000), dec!(83)).unwrap();
        controller.apply_rates(fresh);

        assert_eq!(controller.rates(), Some(&fresh));
        let expected = fiat_to_net_crypto(dec!(35000), Some(dec!(83)), Some(dec!(30000)), dec!(3));
        assert_eq!(controller.state().net_crypto_amount, Some(expected));
    }

    #[test]
    fn test_focus_switches_authority_without_recompute() {
        let mut controller = live_controller();
        let before = controller.state().clone();

        controller.focus(EditedField::Crypto);

        assert_eq!(controller.state().edited_field, EditedField::Crypto);
        assert_eq!(controller.state().target_fiat_amount, before.target_fiat_amount);
        assert_eq!(controller.state().net_crypto_amount, before.net_crypto_amount);

        // The next premium change now derives fiat from crypto.
        controller.set_premium(dec!(4));
        assert_eq!(controller.state().net_crypto_amount, before.net_crypto_amount);
        assert_ne!(controller.state().target_fiat_amount, before.target_fiat_amount);
    }
}
