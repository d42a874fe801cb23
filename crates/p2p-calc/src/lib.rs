//! # p2p-calc
//!
//! Premium-aware calculator for selling crypto peer-to-peer.
//!
//! A seller wants a fixed amount of local currency and is willing to send
//! slightly less crypto than its market value (the premium they keep). The
//! two amounts are linked: edit either one and the other follows, at the
//! latest market rates.
//!
//! ## Data Flow
//!
//! ```text
//! ┌──────────────┐  snapshot  ┌────────────────┐  derive  ┌──────────────────┐
//! │   RateFeed   │───────────▶│ SyncController │─────────▶│ ConversionEngine │
//! │ (fx + price) │            │  (TradeState)  │◀─────────│   (pure fns)     │
//! └──────────────┘            └────────────────┘          └──────────────────┘
//!                                     ▲
//!                     user edits ─────┘        TradeAdvisor ◀── trade context
//! ```
//!
//! ## Example: 35,000 INR at 3% premium
//!
//! ```text
//! USD/INR 83, BTC/USD 60,000
//! market BTC = (35000 / 83) / 60000      = 0.00702811
//! net BTC    = market * (1 - 3/100)      = 0.00681727
//! ```

pub mod advisor;
pub mod conversion;
pub mod error;
pub mod export;
pub mod feed;
pub mod model;
pub mod rates;
pub mod session;
pub mod sync;

pub use advisor::{Advisory, AdvisoryMode, MarketLabels, TradeAdvisor, FALLBACK_ADVISORY};
pub use conversion::{fiat_to_net_crypto, net_crypto_to_fiat, Breakdown};
pub use error::{CalcError, Result};
pub use feed::{FeedConfig, FeedHandle, FeedStatus, RateFeed};
pub use model::{parse_amount, EditedField, RateSnapshot, TradeState};
pub use rates::{HttpRateSource, MockRateSource, RateSource, RateSourceConfig};
pub use session::{AdviceView, Session, SessionConfig, SessionId, TradeDisplay, TradeView};
pub use sync::SyncController;
