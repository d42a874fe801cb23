//! Session
//!
//! One live calculator: the sync controller, the rate feed driving it, and
//! the advisor. All trade mutations go through the controller lock, so feed
//! updates and user edits are applied one at a time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::advisor::{Advisory, AdvisoryMode, MarketLabels, TradeAdvisor, TradeContext};
use crate::conversion::Breakdown;
use crate::error::{CalcError, Result};
use crate::export::{format_fiat, format_rate, net_crypto_text};
use crate::feed::{FeedConfig, FeedHandle, FeedStatus, RateFeed, RateListener};
use crate::model::{parse_amount, premium_in_range, EditedField, RateSnapshot, TradeState};
use crate::rates::RateSource;
use crate::sync::SyncController;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Startup values for a session
#[derive(Clone, Debug, Default)]
pub struct SessionConfig {
    pub defaults: TradeState,
    pub feed: FeedConfig,
}

impl SessionConfig {
    /// Reads `DEFAULT_TARGET_FIAT`, `DEFAULT_PREMIUM_PERCENT` and the feed settings.
    pub fn from_env() -> Self {
        let mut defaults = TradeState::default();

        if let Ok(raw) = std::env::var("DEFAULT_TARGET_FIAT") {
            match parse_amount(&raw) {
                Some(target) if target >= Decimal::ZERO => {
                    defaults.target_fiat_amount = Some(target);
                }
                _ => tracing::warn!(value = %raw, "Ignoring invalid DEFAULT_TARGET_FIAT"),
            }
        }

        if let Ok(raw) = std::env::var("DEFAULT_PREMIUM_PERCENT") {
            match parse_amount(&raw) {
                Some(premium) if premium_in_range(premium) => defaults.premium_percent = premium,
                _ => tracing::warn!(value = %raw, "Ignoring invalid DEFAULT_PREMIUM_PERCENT"),
            }
        }

        Self {
            defaults,
            feed: FeedConfig::from_env(),
        }
    }
}

#[async_trait]
impl RateListener for Mutex<SyncController> {
    async fn on_rates(&self, snapshot: RateSnapshot) {
        self.lock().await.apply_rates(snapshot);
    }
}

/// Everything a client needs to render the calculator
#[derive(Clone, Debug, Serialize)]
pub struct TradeView {
    pub session_id: SessionId,
    pub state: TradeState,
    pub rates: Option<RateSnapshot>,
    pub breakdown: Breakdown,

    /// Net crypto as copied to the clipboard
    pub net_crypto_text: String,

    pub display: TradeDisplay,
    pub feed: FeedStatus,
}

/// Amounts and rates formatted for display
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TradeDisplay {
    /// Crypto price in the reference currency, `None` until rates arrive
    pub crypto_price: Option<String>,

    /// Local currency per reference unit, two decimals
    pub fx_rate: Option<String>,

    /// Target fiat, empty while the box is cleared
    pub target_fiat: String,

    pub profit_fiat: String,
}

impl TradeDisplay {
    fn render(
        state: &TradeState,
        rates: Option<&RateSnapshot>,
        breakdown: &Breakdown,
        labels: &MarketLabels,
    ) -> Self {
        Self {
            crypto_price: rates.map(|r| format_fiat(r.crypto_price(), &labels.reference_currency)),
            fx_rate: rates.map(|r| format_rate(r.fx_rate())),
            target_fiat: state
                .target_fiat_amount
                .map(|fiat| format_fiat(fiat, &labels.local_currency))
                .unwrap_or_default(),
            profit_fiat: format_fiat(breakdown.profit_fiat, &labels.local_currency),
        }
    }
}

/// Advisory slot as seen by a client
#[derive(Clone, Debug, Serialize)]
pub struct AdviceView {
    pub latest: Option<Advisory>,
    pub pending: bool,
}

pub struct Session {
    id: SessionId,
    controller: Arc<Mutex<SyncController>>,
    feed: FeedHandle,
    advisor: TradeAdvisor,
    started_at: DateTime<Utc>,
}

impl Session {
    /// Build the controller and start polling. Requires a tokio runtime.
    pub fn start(source: Arc<dyn RateSource>, advisor: TradeAdvisor, config: SessionConfig) -> Self {
        let id = SessionId::new();
        let controller = Arc::new(Mutex::new(SyncController::new(config.defaults)));

        tracing::info!(
            session = %id,
            source = source.name(),
            advisor = advisor.provider_name().unwrap_or("none"),
            "Session started"
        );

        let feed = RateFeed::new(source, config.feed).start(controller.clone());

        Self {
            id,
            controller,
            feed,
            advisor,
            started_at: Utc::now(),
        }
    }

    pub const fn id(&self) -> &SessionId {
        &self.id
    }

    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub const fn advisor(&self) -> &TradeAdvisor {
        &self.advisor
    }

    pub async fn view(&self) -> TradeView {
        let controller = self.controller.lock().await;
        let state = controller.state().clone();
        let rates = controller.rates().copied();
        let breakdown = controller.breakdown();

        TradeView {
            session_id: self.id.clone(),
            net_crypto_text: net_crypto_text(state.net_crypto_amount),
            display: TradeDisplay::render(&state, rates.as_ref(), &breakdown, self.advisor.labels()),
            rates,
            breakdown,
            state,
            feed: self.feed.status(),
        }
    }

    pub async fn edit_fiat(&self, value: Option<Decimal>) -> TradeView {
        self.controller.lock().await.edit_fiat(value);
        self.view().await
    }

    pub async fn edit_crypto(&self, value: Option<Decimal>) -> TradeView {
        self.controller.lock().await.edit_crypto(value);
        self.view().await
    }

    /// Rejects premiums outside the slider range.
    pub async fn set_premium(&self, premium_percent: Decimal) -> Result<TradeView> {
        if !premium_in_range(premium_percent) {
            return Err(CalcError::PremiumOutOfRange(premium_percent));
        }

        self.controller.lock().await.set_premium(premium_percent);
        Ok(self.view().await)
    }

    pub async fn focus(&self, field: EditedField) -> TradeView {
        self.controller.lock().await.focus(field);
        self.view().await
    }

    pub async fn net_crypto_text(&self) -> String {
        net_crypto_text(self.controller.lock().await.state().net_crypto_amount)
    }

    pub fn feed_status(&self) -> FeedStatus {
        self.feed.status()
    }

    /// Queue an immediate poll; `false` if one is already queued.
    pub fn refresh_rates(&self) -> Result<bool> {
        self.feed.refresh()
    }

    async fn trade_context(&self) -> TradeContext {
        let controller = self.controller.lock().await;
        TradeContext::capture(controller.state(), controller.rates())
    }

    /// Fire-and-forget advisory request; returns its generation.
    pub async fn request_advice(&self, mode: AdvisoryMode) -> u64 {
        let context = self.trade_context().await;
        let advisor = self.advisor.clone();
        let generation = advisor.begin().await;

        tracing::info!(session = %self.id, %mode, generation, "Advisory requested");

        tokio::spawn(async move {
            advisor.complete(generation, mode, &context).await;
        });

        generation
    }

    pub async fn advice(&self) -> AdviceView {
        AdviceView {
            latest: self.advisor.latest().await,
            pending: self.advisor.pending().await > 0,
        }
    }

    pub async fn dismiss_advice(&self) {
        self.advisor.dismiss().await;
    }

    /// Stop the rate feed. Trade state stays readable.
    pub async fn shutdown(&self) {
        self.feed.cancel().await;
        tracing::info!(session = %self.id, "Session stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::FALLBACK_ADVISORY;
    use crate::rates::MockRateSource;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    async fn live_session() -> (Session, Arc<MockRateSource>) {
        let source = Arc::new(MockRateSource::default());
        let session = Session::start(
            source.clone(),
            TradeAdvisor::disabled(),
            SessionConfig::default(),
        );
        settle().await;
        (session, source)
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_poll_derives_default_trade() {
        let (session, _) = live_session().await;
        let view = session.view().await;

        assert!(view.rates.is_some());
        assert_eq!(view.state.target_fiat_amount, Some(dec!(35000)));
        assert_eq!(view.state.net_crypto_amount.unwrap().round_dp(8), dec!(0.00681727));
        assert_eq!(view.net_crypto_text, "0.00681727");
        assert!(view.breakdown.profit_fiat > Decimal::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_view_formats_amounts_in_market_currencies() {
        let (session, _) = live_session().await;
        let display = session.view().await.display;

        assert_eq!(display.crypto_price.as_deref(), Some("$60,000"));
        assert_eq!(display.fx_rate.as_deref(), Some("83.00"));
        assert_eq!(display.target_fiat, "₹35,000");

        let display = session.edit_fiat(Some(dec!(3500000))).await.display;
        assert_eq!(display.target_fiat, "₹35,00,000");
        assert_eq!(display.profit_fiat, "₹1,05,000");

        let display = session.edit_fiat(None).await.display;
        assert_eq!(display.target_fiat, "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_crypto_edit_then_premium() {
        let (session, _) = live_session().await;

        session.edit_crypto(Some(dec!(0.01))).await;
        let view = session.set_premium(dec!(5)).await.unwrap();

        assert_eq!(view.state.edited_field, EditedField::Crypto);
        assert_eq!(view.state.net_crypto_amount, Some(dec!(0.01)));
        let fiat = view.state.target_fiat_amount.unwrap();
        assert!((fiat - dec!(52421.05)).abs() < dec!(0.01));
    }

    #[tokio::test(start_paused = true)]
    async fn test_premium_out_of_range_is_rejected() {
        let (session, _) = live_session().await;
        let before = session.view().await.state;

        let result = session.set_premium(dec!(25)).await;

        assert!(matches!(result, Err(CalcError::PremiumOutOfRange(_))));
        assert_eq!(session.view().await.state, before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_net_crypto_text_tracks_crypto_box() {
        let (session, _) = live_session().await;

        let view = session.edit_fiat(None).await;
        assert_eq!(view.state.target_fiat_amount, None);
        assert_eq!(view.net_crypto_text, "0.00681727");

        let view = session.edit_crypto(None).await;
        assert_eq!(view.net_crypto_text, "0");
        assert_eq!(session.net_crypto_text().await, "0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_keeps_trade_state() {
        let (session, source) = live_session().await;
        let before = session.view().await;

        source.fail_fx(true);
        source.set_rates(dec!(90), dec!(10000)).await;
        assert!(session.refresh_rates().unwrap());
        settle().await;

        let after = session.view().await;
        assert!(after.feed.is_failed());
        assert_eq!(after.rates, before.rates);
        assert_eq!(after.state, before.state);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fresh_rates_rederive_from_authority() {
        let (session, source) = live_session().await;
        let before = session.view().await.state;

        source.set_rates(dec!(83), dec!(30000)).await;
        session.refresh_rates().unwrap();
        settle().await;

        let after = session.view().await.state;
        assert_eq!(after.target_fiat_amount, before.target_fiat_amount);
        assert!(after.net_crypto_amount > before.net_crypto_amount);
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_switches_authority() {
        let (session, _) = live_session().await;
        let view = session.focus(EditedField::Crypto).await;
        assert_eq!(view.state.edited_field, EditedField::Crypto);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_advice_without_provider_falls_back() {
        let (session, _) = live_session().await;

        let generation = session.request_advice(AdvisoryMode::TradeAnalysis).await;
        assert_eq!(generation, 1);
        settle().await;

        let advice = session.advice().await;
        assert!(!advice.pending);
        let latest = advice.latest.unwrap();
        assert_eq!(latest.text, FALLBACK_ADVISORY);
        assert!(latest.fallback);

        session.dismiss_advice().await;
        assert!(session.advice().await.latest.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_feed() {
        let (session, _) = live_session().await;

        session.shutdown().await;

        assert!(!session.feed_status().running);
        assert!(matches!(session.refresh_rates(), Err(CalcError::FeedStopped)));
        // State is still readable after shutdown.
        assert!(session.view().await.rates.is_some());
    }
}
