//! Trade Advisor
//!
//! Sends the current trade parameters to an [`LlmProvider`] and keeps the
//! latest free-text answer in a single slot.
//!
//! Requests are numbered as they are issued. A response only lands in the
//! slot if no later-issued request has landed before it, so a slow early
//! answer can never replace a newer one. Any failure (no provider, transport
//! error, empty text) stores [`FALLBACK_ADVISORY`] instead of erroring.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use advisor_core::{GenerationOptions, LlmError, LlmProvider, Message};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::model::{RateSnapshot, TradeState};
use crate::rates::RateSourceConfig;

/// Shown whenever no usable advisory text came back
pub const FALLBACK_ADVISORY: &str = "Could not reach the trade advisor. Check your connection.";

/// What the user asked for
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdvisoryMode {
    /// Is the premium on this trade competitive?
    #[serde(rename = "analysis")]
    TradeAnalysis,

    /// Current market mood and news for a P2P seller
    #[serde(rename = "market")]
    MarketSentiment,
}

impl AdvisoryMode {
    pub const fn user_query(self) -> &'static str {
        match self {
            Self::TradeAnalysis => "Analyze this specific trade setup.",
            Self::MarketSentiment => {
                "What is the current Bitcoin market sentiment and news summary for a P2P seller?"
            }
        }
    }

    /// Market sentiment needs fresh news, so it is grounded with web search.
    pub const fn web_search(self) -> bool {
        matches!(self, Self::MarketSentiment)
    }
}

impl std::fmt::Display for AdvisoryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TradeAnalysis => write!(f, "analysis"),
            Self::MarketSentiment => write!(f, "market"),
        }
    }
}

/// Currency names used in prompts
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MarketLabels {
    pub local_currency: String,
    pub crypto_symbol: String,
    pub reference_currency: String,
}

impl Default for MarketLabels {
    fn default() -> Self {
        Self {
            local_currency: "INR".into(),
            crypto_symbol: "BTC".into(),
            reference_currency: "USD".into(),
        }
    }
}

impl MarketLabels {
    pub fn from_rate_config(config: &RateSourceConfig) -> Self {
        let crypto_symbol = match config.crypto_id.as_str() {
            "bitcoin" => "BTC".to_string(),
            "ethereum" => "ETH".to_string(),
            "tether" => "USDT".to_string(),
            other => other.to_uppercase(),
        };

        Self {
            local_currency: config.local_currency.to_uppercase(),
            crypto_symbol,
            reference_currency: config.reference_currency.to_uppercase(),
        }
    }
}

/// Trade parameters captured at request time
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TradeContext {
    pub target_fiat: Option<Decimal>,
    pub net_crypto: Option<Decimal>,
    pub premium_percent: Decimal,
    pub rates: Option<RateSnapshot>,
}

impl TradeContext {
    pub fn capture(state: &TradeState, rates: Option<&RateSnapshot>) -> Self {
        Self {
            target_fiat: state.target_fiat_amount,
            net_crypto: state.net_crypto_amount,
            premium_percent: state.premium_percent,
            rates: rates.copied(),
        }
    }
}

fn or_unset(value: Option<Decimal>) -> String {
    value.map_or_else(|| "unset".to_string(), |v| v.normalize().to_string())
}

/// System prompt embedding the trade parameters
pub fn system_prompt(ctx: &TradeContext, labels: &MarketLabels) -> String {
    let MarketLabels {
        local_currency: local,
        crypto_symbol: crypto,
        reference_currency: reference,
    } = labels;

    format!(
        "You are a professional {crypto} P2P trade consultant. Analyze the following trade data:\n\
         Target {local}: {target}\n\
         {crypto} to Send: {net}\n\
         Premium: {premium}%\n\
         Current {crypto}/{reference}: {price}\n\
         {reference}/{local}: {fx}\n\n\
         If asked about this trade, provide a brief 2-sentence strategy on whether this premium is competitive.\n\
         If asked about the market, summarize current {crypto} market sentiment and any major news affecting P2P trading.",
        target = or_unset(ctx.target_fiat),
        net = or_unset(ctx.net_crypto),
        premium = ctx.premium_percent.normalize(),
        price = or_unset(ctx.rates.map(|r| r.crypto_price())),
        fx = or_unset(ctx.rates.map(|r| r.fx_rate())),
    )
}

/// One answer in the advisory slot
#[derive(Clone, Debug, Serialize)]
pub struct Advisory {
    pub text: String,
    pub mode: AdvisoryMode,

    /// Issue order of the request that produced this answer
    pub generation: u64,

    /// The text is [`FALLBACK_ADVISORY`]
    pub fallback: bool,

    /// Why the fallback was used
    pub detail: Option<String>,

    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct AdvisorySlot {
    latest: Option<Advisory>,

    /// Highest generation ever stored, survives dismissal
    watermark: u64,

    pending: usize,
}

/// Shared advisory client and slot; clones share the same slot.
#[derive(Clone)]
pub struct TradeAdvisor {
    provider: Option<Arc<dyn LlmProvider>>,
    options: GenerationOptions,
    labels: MarketLabels,
    slot: Arc<RwLock<AdvisorySlot>>,
    issued: Arc<AtomicU64>,

    /// Outcome of the last health check
    reachable: Arc<AtomicBool>,
}

impl TradeAdvisor {
    pub fn new(provider: Option<Arc<dyn LlmProvider>>, options: GenerationOptions) -> Self {
        Self {
            provider,
            options,
            labels: MarketLabels::default(),
            slot: Arc::default(),
            issued: Arc::new(AtomicU64::new(0)),
            reachable: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Advisor that always answers with the fallback text
    pub fn disabled() -> Self {
        Self::new(None, GenerationOptions::default())
    }

    #[must_use]
    pub fn with_labels(mut self, labels: MarketLabels) -> Self {
        self.labels = labels;
        self
    }

    pub fn provider_name(&self) -> Option<&str> {
        self.provider.as_deref().map(|p| p.name())
    }

    pub const fn labels(&self) -> &MarketLabels {
        &self.labels
    }

    /// Probe the provider and remember the outcome for [`is_reachable`](Self::is_reachable).
    pub async fn health_check(&self) -> bool {
        let reachable = match &self.provider {
            Some(provider) => provider.health_check().await.unwrap_or(false),
            None => false,
        };
        self.reachable.store(reachable, Ordering::SeqCst);
        reachable
    }

    /// Result of the last [`health_check`](Self::health_check), without a network call
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Reserve the next generation number and mark a request pending.
    pub async fn begin(&self) -> u64 {
        let generation = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        self.slot.write().await.pending += 1;
        generation
    }

    /// Run a request reserved with [`begin`](Self::begin) and store the
    /// answer unless a later generation already landed.
    pub async fn complete(
        &self,
        generation: u64,
        mode: AdvisoryMode,
        context: &TradeContext,
    ) -> Advisory {
        let (text, detail) = match self.generate(mode, context).await {
            Ok(text) => (text, None),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    retryable = e.is_retryable(),
                    %mode,
                    generation,
                    "Advisory request failed"
                );
                (FALLBACK_ADVISORY.to_string(), Some(e.user_message()))
            }
        };

        let advisory = Advisory {
            text,
            mode,
            generation,
            fallback: detail.is_some(),
            detail,
            received_at: Utc::now(),
        };

        let mut slot = self.slot.write().await;
        slot.pending = slot.pending.saturating_sub(1);
        if generation > slot.watermark {
            slot.watermark = generation;
            slot.latest = Some(advisory.clone());
        } else {
            tracing::debug!(generation, newest = slot.watermark, "Discarding stale advisory");
        }

        advisory
    }

    /// Issue and await one request
    pub async fn advise(&self, mode: AdvisoryMode, context: &TradeContext) -> Advisory {
        let generation = self.begin().await;
        self.complete(generation, mode, context).await
    }

    async fn generate(
        &self,
        mode: AdvisoryMode,
        context: &TradeContext,
    ) -> advisor_core::Result<String> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| LlmError::Config("no advisor provider configured".into()))?;

        let messages = [
            Message::system(system_prompt(context, &self.labels)),
            Message::user(mode.user_query()),
        ];
        let options = self.options.clone().with_web_search(mode.web_search());

        let completion = provider.complete(&messages, &options).await?;
        let text = completion.content.trim();
        if text.is_empty() {
            return Err(LlmError::EmptyResponse(provider.name().into()));
        }

        Ok(text.to_string())
    }

    pub async fn latest(&self) -> Option<Advisory> {
        self.slot.read().await.latest.clone()
    }

    pub async fn pending(&self) -> usize {
        self.slot.read().await.pending
    }

    /// Clear the slot. Requests still in flight may refill it.
    pub async fn dismiss(&self) {
        self.slot.write().await.latest = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use advisor_core::provider::FinishReason;
    use advisor_core::Completion;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct StubProvider {
        reply: String,
        seen: Mutex<Vec<GenerationOptions>>,
    }

    impl StubProvider {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.into(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubProvider {
        fn name(&self) -> &str {
            "Stub"
        }

        async fn health_check(&self) -> advisor_core::Result<bool> {
            Ok(true)
        }

        async fn complete(
            &self,
            messages: &[Message],
            options: &GenerationOptions,
        ) -> advisor_core::Result<Completion> {
            assert_eq!(messages.len(), 2);
            self.seen.lock().unwrap().push(options.clone());
            Ok(Completion {
                content: self.reply.clone(),
                model: options.model.clone(),
                usage: None,
                finish_reason: Some(FinishReason::Stop),
            })
        }
    }

    struct DownProvider;

    #[async_trait::async_trait]
    impl LlmProvider for DownProvider {
        fn name(&self) -> &str {
            "Down"
        }

        async fn health_check(&self) -> advisor_core::Result<bool> {
            Ok(false)
        }

        async fn complete(
            &self,
            _messages: &[Message],
            _options: &GenerationOptions,
        ) -> advisor_core::Result<Completion> {
            Err(LlmError::ProviderUnavailable("connection refused".into()))
        }
    }

    fn context() -> TradeContext {
        TradeContext {
            target_fiat: Some(dec!(35000)),
            net_crypto: Some(dec!(0.00681727)),
            premium_percent: dec!(3.0),
            rates: RateSnapshot::new(dec!(60000), dec!(83)).ok(),
        }
    }

    fn advisor(provider: Arc<dyn LlmProvider>) -> TradeAdvisor {
        TradeAdvisor::new(Some(provider), GenerationOptions::default())
    }

    #[test]
    fn test_mode_serde() {
        assert_eq!(
            serde_json::to_string(&AdvisoryMode::MarketSentiment).unwrap(),
            "\"market\""
        );
        let mode: AdvisoryMode = serde_json::from_str("\"analysis\"").unwrap();
        assert_eq!(mode, AdvisoryMode::TradeAnalysis);
        assert!(!mode.web_search());
        assert!(AdvisoryMode::MarketSentiment.web_search());
    }

    #[test]
    fn test_system_prompt_embeds_trade() {
        let prompt = system_prompt(&context(), &MarketLabels::default());
        assert!(prompt.contains("Target INR: 35000"));
        assert!(prompt.contains("BTC to Send: 0.00681727"));
        assert!(prompt.contains("Premium: 3%"));
        assert!(prompt.contains("Current BTC/USD: 60000"));
        assert!(prompt.contains("USD/INR: 83"));
    }

    #[test]
    fn test_system_prompt_marks_missing_values() {
        let ctx = TradeContext {
            target_fiat: None,
            rates: None,
            ..context()
        };
        let prompt = system_prompt(&ctx, &MarketLabels::default());
        assert!(prompt.contains("Target INR: unset"));
        assert!(prompt.contains("USD/INR: unset"));
    }

    #[test]
    fn test_labels_from_rate_config() {
        let config = RateSourceConfig {
            crypto_id: "ethereum".into(),
            local_currency: "eur".into(),
            ..RateSourceConfig::default()
        };
        let labels = MarketLabels::from_rate_config(&config);
        assert_eq!(labels.crypto_symbol, "ETH");
        assert_eq!(labels.local_currency, "EUR");
        assert_eq!(labels.reference_currency, "USD");
    }

    #[tokio::test]
    async fn test_advice_is_stored() {
        let provider = StubProvider::replying("  Premium looks competitive.  ");
        let advisor = advisor(provider.clone());

        let advisory = advisor.advise(AdvisoryMode::MarketSentiment, &context()).await;

        assert_eq!(advisory.text, "Premium looks competitive.");
        assert!(!advisory.fallback);
        assert_eq!(advisory.generation, 1);
        assert_eq!(advisor.latest().await.unwrap().text, advisory.text);
        assert_eq!(advisor.pending().await, 0);
        assert!(provider.seen.lock().unwrap()[0].web_search);
    }

    #[tokio::test]
    async fn test_health_check_result_is_cached() {
        let up = advisor(StubProvider::replying("ok"));
        assert!(!up.is_reachable());
        assert!(up.health_check().await);
        assert!(up.is_reachable());
        assert!(up.clone().is_reachable());

        let down = advisor(Arc::new(DownProvider));
        assert!(!down.health_check().await);
        assert!(!down.is_reachable());
    }

    #[tokio::test]
    async fn test_failure_stores_fallback() {
        let advisor = advisor(Arc::new(DownProvider));
        let advisory = advisor.advise(AdvisoryMode::TradeAnalysis, &context()).await;

        assert!(advisory.fallback);
        assert_eq!(
            advisory.detail.as_deref(),
            Some("The AI service is currently unavailable. Please try again.")
        );
        assert_eq!(advisor.latest().await.unwrap().text, FALLBACK_ADVISORY);
    }

    #[tokio::test]
    async fn test_empty_text_stores_fallback() {
        let advisor = advisor(StubProvider::replying("   "));
        let advisory = advisor.advise(AdvisoryMode::TradeAnalysis, &context()).await;
        assert!(advisory.fallback);
        assert_eq!(advisory.text, FALLBACK_ADVISORY);
        assert_eq!(advisory.detail.as_deref(), Some("The AI service returned no commentary."));
    }

    #[tokio::test]
    async fn test_no_provider_stores_fallback() {
        let advisor = TradeAdvisor::disabled();
        assert!(advisor.provider_name().is_none());
        assert!(!advisor.health_check().await);

        let advisory = advisor.advise(AdvisoryMode::TradeAnalysis, &context()).await;
        assert!(advisory.fallback);
        assert!(advisory.detail.unwrap().contains("not configured"));
    }

    #[tokio::test]
    async fn test_stale_response_never_overwrites_newer() {
        let advisor = advisor(StubProvider::replying("answer"));

        let first = advisor.begin().await;
        let second = advisor.begin().await;
        assert_eq!(advisor.pending().await, 2);

        advisor.complete(second, AdvisoryMode::MarketSentiment, &context()).await;
        advisor.complete(first, AdvisoryMode::TradeAnalysis, &context()).await;

        let latest = advisor.latest().await.unwrap();
        assert_eq!(latest.generation, second);
        assert_eq!(latest.mode, AdvisoryMode::MarketSentiment);
        assert_eq!(advisor.pending().await, 0);
    }

    #[tokio::test]
    async fn test_dismiss_clears_slot() {
        let advisor = advisor(StubProvider::replying("answer"));
        let first = advisor.begin().await;
        let second = advisor.begin().await;
        advisor.complete(second, AdvisoryMode::TradeAnalysis, &context()).await;

        advisor.dismiss().await;
        assert!(advisor.latest().await.is_none());

        // An older answer arriving after dismissal stays discarded.
        advisor.complete(first, AdvisoryMode::TradeAnalysis, &context()).await;
        assert!(advisor.latest().await.is_none());

        advisor.advise(AdvisoryMode::TradeAnalysis, &context()).await;
        assert_eq!(advisor.latest().await.unwrap().generation, 3);
    }
}
