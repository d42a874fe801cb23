//! Rate Feed
//!
//! Polls a [`RateSource`] on a fixed cadence and hands every complete
//! snapshot to a [`RateListener`].
//!
//! Each poll issues both requests concurrently and only succeeds if both do;
//! a half-successful poll is discarded. Failures never stop the schedule,
//! they only raise the error flag in [`FeedStatus`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::error::{CalcError, Result};
use crate::model::RateSnapshot;
use crate::rates::RateSource;

/// Polling cadence
#[derive(Clone, Debug)]
pub struct FeedConfig {
    pub interval: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
        }
    }
}

impl FeedConfig {
    pub fn from_env() -> Self {
        let secs = std::env::var("RATE_POLL_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|s| *s > 0)
            .unwrap_or(60);

        Self {
            interval: Duration::from_secs(secs),
        }
    }
}

/// Observable state of the feed
#[derive(Clone, Debug, Default, Serialize)]
pub struct FeedStatus {
    /// Latest complete snapshot
    pub snapshot: Option<RateSnapshot>,

    /// Whether the polling task is alive
    pub running: bool,

    /// A poll is in flight
    pub fetching: bool,

    /// Message of the most recent failure, cleared by the next success
    pub last_error: Option<String>,

    pub consecutive_failures: u32,

    /// Polls started, successful or not
    pub attempts: u64,

    pub last_attempt_at: Option<DateTime<Utc>>,
}

impl FeedStatus {
    pub const fn is_failed(&self) -> bool {
        self.last_error.is_some()
    }
}

/// Receives every complete snapshot, in poll order
#[async_trait]
pub trait RateListener: Send + Sync {
    async fn on_rates(&self, snapshot: RateSnapshot);
}

/// Scheduled, cancellable rate poller
pub struct RateFeed {
    source: Arc<dyn RateSource>,
    config: FeedConfig,
}

impl RateFeed {
    pub fn new(source: Arc<dyn RateSource>, config: FeedConfig) -> Self {
        Self { source, config }
    }

    /// One poll: both requests concurrently, both-or-neither.
    pub async fn poll_once(&self) -> Result<RateSnapshot> {
        let (fx_rate, crypto_price) =
            tokio::try_join!(self.source.fx_rate(), self.source.crypto_price())?;
        RateSnapshot::new(crypto_price, fx_rate)
    }

    /// Spawn the polling task. The first poll runs immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self, listener: Arc<dyn RateListener>) -> FeedHandle {
        let (status_tx, status_rx) = watch::channel(FeedStatus {
            running: true,
            ..FeedStatus::default()
        });
        let (refresh_tx, refresh_rx) = mpsc::channel(1);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(self.run(listener, status_tx, refresh_rx, shutdown_rx));

        FeedHandle {
            status: status_rx,
            refresh: refresh_tx,
            shutdown: shutdown_tx,
            task,
        }
    }

    async fn run(
        self,
        listener: Arc<dyn RateListener>,
        status: watch::Sender<FeedStatus>,
        mut refresh: mpsc::Receiver<()>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            source = self.source.name(),
            interval_secs = self.config.interval.as_secs(),
            "Rate feed started"
        );

        loop {
            tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                _ = ticker.tick() => {}
                Some(()) = refresh.recv() => {
                    tracing::debug!("Manual rate refresh");
                    ticker.reset();
                }
            }

            status.send_modify(|s| {
                s.fetching = true;
                s.attempts += 1;
                s.last_attempt_at = Some(Utc::now());
            });

            let outcome = tokio::select! {
                biased;
                _ = shutdown.changed() => break,
                outcome = self.poll_once() => outcome,
            };

            match outcome {
                Ok(snapshot) => {
                    status.send_modify(|s| {
                        s.snapshot = Some(snapshot);
                        s.fetching = false;
                        s.last_error = None;
                        s.consecutive_failures = 0;
                    });
                    tracing::info!(
                        price = %snapshot.crypto_price(),
                        fx_rate = %snapshot.fx_rate(),
                        captured_at = %snapshot.captured_at(),
                        "Rates updated"
                    );
                    listener.on_rates(snapshot).await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch rates");
                    status.send_modify(|s| {
                        s.fetching = false;
                        s.last_error = Some(format!("Failed to fetch rates: {e}"));
                        s.consecutive_failures += 1;
                    });
                }
            }
        }

        status.send_modify(|s| {
            s.running = false;
            s.fetching = false;
        });
        tracing::info!("Rate feed stopped");
    }
}

/// Lifecycle handle for a running [`RateFeed`].
///
/// Dropping the handle aborts the task.
pub struct FeedHandle {
    status: watch::Receiver<FeedStatus>,
    refresh: mpsc::Sender<()>,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl FeedHandle {
    pub fn status(&self) -> FeedStatus {
        self.status.borrow().clone()
    }

    pub fn latest(&self) -> Option<RateSnapshot> {
        self.status.borrow().snapshot
    }

    /// Queue one immediate poll.
    ///
    /// Returns `false` when a refresh is already queued.
    pub fn refresh(&self) -> Result<bool> {
        match self.refresh.try_send(()) {
            Ok(()) => Ok(true),
            Err(mpsc::error::TrySendError::Full(())) => Ok(false),
            Err(mpsc::error::TrySendError::Closed(())) => Err(CalcError::FeedStopped),
        }
    }

    /// Stop polling and wait for the task to wind down.
    ///
    /// An in-flight poll is dropped without being applied.
    pub async fn cancel(&self) {
        // Err means the task is already gone.
        let _ = self.shutdown.send(true);

        let mut status = self.status.clone();
        let _ = status.wait_for(|s| !s.running).await;
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
