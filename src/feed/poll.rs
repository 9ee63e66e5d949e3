use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use crate::api::{with_retry, ExchangeApi, RetryPolicy};
use crate::models::{Candle, Timeframe};

/// Polls bucketed history and feeds closed native bins into a channel
///
/// Stands in for a streaming transport: once per native interval it asks
/// for everything since the last delivered bin and pushes each candle in
/// order, exactly once.
pub struct RestPoller {
    api: Arc<dyn ExchangeApi>,
    retry: RetryPolicy,
    timeframe: Timeframe,
}

impl RestPoller {
    /// `timeframe` is the native granularity to deliver at
    pub fn new(api: Arc<dyn ExchangeApi>, retry: RetryPolicy, timeframe: Timeframe) -> Self {
        Self {
            api,
            retry,
            timeframe,
        }
    }

    /// Run until the consumer hangs up
    pub async fn run(self, tx: mpsc::Sender<Candle>) {
        let period = self
            .timeframe
            .duration()
            .to_std()
            .unwrap_or(std::time::Duration::from_secs(60));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut last_seen: Option<DateTime<Utc>> = None;

        loop {
            ticker.tick().await;

            let end = Utc::now();
            let start = match last_seen {
                Some(ts) => ts + self.timeframe.duration(),
                None => end - self.timeframe.duration() * 2,
            };

            let batch = match with_retry(&self.retry, || {
                self.api.fetch_candles(self.timeframe, start, end)
            })
            .await
            {
                Ok(batch) => batch,
                Err(e) => {
                    tracing::warn!(error = %e, "feed poll failed, will retry next tick");
                    continue;
                }
            };

            for candle in batch {
                if last_seen.is_some_and(|ts| candle.timestamp <= ts) {
                    continue;
                }
                last_seen = Some(candle.timestamp);
                if tx.send(candle).await.is_err() {
                    tracing::info!("feed consumer gone, stopping poller");
                    return;
                }
            }
        }
    }
}
