use std::sync::Arc;

use crate::api::{ExchangeApi, RetryPolicy};
use crate::candles::{bootstrap, CandleWindow};
use crate::execution::OrderExecutor;
use crate::feed::MarketFeed;
use crate::models::Timeframe;
use crate::notify::Notifier;
use crate::strategy::Strategy;
use crate::Result;

/// Owns the candle cache and drives the strategy off the feed
///
/// One feed event at a time: bootstrap on the first event, merge on every
/// later one, then hand the four OHLC series to the strategy. The
/// dispatcher is the only layer allowed to terminate the run: a fatal
/// strategy error closes the feed, anything else is logged and the loop
/// continues with the next event.
pub struct Dispatcher {
    api: Arc<dyn ExchangeApi>,
    retry: RetryPolicy,
    orders: OrderExecutor,
    strategy: Box<dyn Strategy>,
    notifier: Arc<dyn Notifier>,
    window: CandleWindow,
    bootstrapped: bool,
}

impl Dispatcher {
    pub fn new(
        api: Arc<dyn ExchangeApi>,
        retry: RetryPolicy,
        orders: OrderExecutor,
        strategy: Box<dyn Strategy>,
        notifier: Arc<dyn Notifier>,
        timeframe: Timeframe,
        window_len: usize,
    ) -> Self {
        Self {
            api,
            retry,
            orders,
            strategy,
            notifier,
            window: CandleWindow::new(timeframe, window_len),
            bootstrapped: false,
        }
    }

    /// Current window contents, resampled to the strategy timeframe
    pub fn window(&self) -> &CandleWindow {
        &self.window
    }

    /// Consume the feed until it drains or the strategy requests shutdown
    pub async fn run<F: MarketFeed>(&mut self, feed: &mut F) -> Result<()> {
        tracing::info!(
            strategy = self.strategy.name(),
            timeframe = %self.window.timeframe(),
            window_len = self.window.window_len(),
            "dispatcher started"
        );

        while let Some(candle) = feed.next().await {
            if !self.bootstrapped {
                // the bootstrap fetch covers the incoming candle's range,
                // so the event itself is not merged
                match bootstrap(
                    self.api.as_ref(),
                    &self.retry,
                    self.window.timeframe(),
                    self.window.window_len(),
                )
                .await
                {
                    Ok(window) => {
                        self.window = window;
                        self.bootstrapped = true;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "bootstrap failed, will retry on next event");
                        self.notifier
                            .notify(&format!("Bootstrap failed: {e}"))
                            .await;
                        continue;
                    }
                }
            } else {
                self.window.merge(candle);
            }

            if self.window.is_empty() {
                continue;
            }

            let series = self.window.series();
            match self.strategy.evaluate(&series, &self.orders).await {
                Ok(()) => {}
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "fatal error, stopping bot");
                    self.notifier
                        .notify(&format!("Fatal error occurred. Stopping bot. {e}"))
                        .await;
                    feed.close();
                    return Err(e);
                }
                Err(e) => {
                    tracing::error!(error = %e, "strategy error, continuing");
                    self.notifier.notify(&format!("An error occurred. {e}")).await;
                }
            }
        }

        tracing::info!("feed drained, dispatcher stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candles::OhlcSeries;
    use crate::error::BotError;
    use crate::feed::ChannelFeed;
    use crate::testutil::{flat_candle, FakeExchange};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Duration;

    /// Records window lengths and fails on scripted ticks
    struct ScriptedStrategy {
        calls: Arc<AtomicUsize>,
        lengths: Arc<std::sync::Mutex<Vec<usize>>>,
        fail_on: Option<usize>,
        fatal_on: Option<usize>,
    }

    impl ScriptedStrategy {
        fn new() -> Self {
            Self {
                calls: Arc::new(AtomicUsize::new(0)),
                lengths: Arc::new(std::sync::Mutex::new(Vec::new())),
                fail_on: None,
                fatal_on: None,
            }
        }
    }

    #[async_trait]
    impl Strategy for ScriptedStrategy {
        fn name(&self) -> &str {
            "scripted"
        }

        fn min_candles(&self) -> usize {
            1
        }

        async fn evaluate(&mut self, series: &OhlcSeries, _orders: &OrderExecutor) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            self.lengths.lock().unwrap().push(series.len());
            if self.fatal_on == Some(call) {
                return Err(BotError::Fatal("scripted fatal".to_string()));
            }
            if self.fail_on == Some(call) {
                return Err(BotError::Strategy("scripted failure".to_string()));
            }
            Ok(())
        }
    }

    fn retry() -> RetryPolicy {
        RetryPolicy::new(2, Duration::from_millis(1), Duration::from_millis(2))
    }

    fn dispatcher_with(
        api: Arc<FakeExchange>,
        strategy: ScriptedStrategy,
        timeframe: Timeframe,
        window_len: usize,
    ) -> Dispatcher {
        let orders = OrderExecutor::new(api.clone(), retry()).with_trade_log(false);
        Dispatcher::new(
            api,
            retry(),
            orders,
            Box::new(strategy),
            Arc::new(crate::notify::NoopNotifier),
            timeframe,
            window_len,
        )
    }

    #[tokio::test]
    async fn test_bootstraps_on_first_event_then_merges() {
        let api = Arc::new(FakeExchange::new());
        // bootstrap page: three closed 1m candles
        api.push_history(vec![
            flat_candle(0, 100.0),
            flat_candle(1, 101.0),
            flat_candle(2, 102.0),
        ]);
        // follow-up fetch for the undershot window comes back empty
        api.push_history(Vec::new());

        let strategy = ScriptedStrategy::new();
        let calls = strategy.calls.clone();
        let lengths = strategy.lengths.clone();
        let mut dispatcher = dispatcher_with(api.clone(), strategy, Timeframe::M1, 10);

        let (tx, mut feed) = ChannelFeed::new(8);
        tx.send(flat_candle(2, 102.0)).await.unwrap();
        tx.send(flat_candle(3, 103.0)).await.unwrap();
        drop(tx);

        dispatcher.run(&mut feed).await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // first tick sees the bootstrapped window, second the merged candle
        assert_eq!(*lengths.lock().unwrap(), vec![3, 4]);
        assert_eq!(
            dispatcher.window().candles().last().unwrap().close,
            103.0
        );
    }

    #[tokio::test]
    async fn test_empty_bootstrap_accumulates_from_stream() {
        let api = Arc::new(FakeExchange::new());
        // no trades in range: bootstrap yields an empty window
        api.push_history(Vec::new());

        let strategy = ScriptedStrategy::new();
        let calls = strategy.calls.clone();
        let mut dispatcher = dispatcher_with(api.clone(), strategy, Timeframe::M1, 10);

        let (tx, mut feed) = ChannelFeed::new(8);
        tx.send(flat_candle(0, 100.0)).await.unwrap();
        tx.send(flat_candle(1, 101.0)).await.unwrap();
        tx.send(flat_candle(2, 102.0)).await.unwrap();
        drop(tx);

        dispatcher.run(&mut feed).await.unwrap();

        // the bootstrap event found nothing to evaluate; the two merges did
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(api.fetch_calls.load(Ordering::SeqCst), 1);
        assert_eq!(dispatcher.window().candles().len(), 2);
    }

    #[tokio::test]
    async fn test_ordinary_strategy_error_keeps_running() {
        let api = Arc::new(FakeExchange::new());
        api.push_history(vec![flat_candle(0, 100.0)]);
        api.push_history(Vec::new());

        let mut strategy = ScriptedStrategy::new();
        strategy.fail_on = Some(2);
        let calls = strategy.calls.clone();
        let mut dispatcher = dispatcher_with(api, strategy, Timeframe::M1, 10);

        let (tx, mut feed) = ChannelFeed::new(8);
        for minute in 0..4 {
            tx.send(flat_candle(minute, 100.0)).await.unwrap();
        }
        drop(tx);

        // a bad tick must not stop the dispatcher
        dispatcher.run(&mut feed).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_fatal_strategy_error_stops_the_feed() {
        let api = Arc::new(FakeExchange::new());
        api.push_history(vec![flat_candle(0, 100.0)]);
        api.push_history(Vec::new());

        let mut strategy = ScriptedStrategy::new();
        strategy.fatal_on = Some(2);
        let calls = strategy.calls.clone();
        let mut dispatcher = dispatcher_with(api, strategy, Timeframe::M1, 10);

        let (tx, mut feed) = ChannelFeed::new(8);
        for minute in 0..4 {
            tx.send(flat_candle(minute, 100.0)).await.unwrap();
        }
        drop(tx);

        let result = dispatcher.run(&mut feed).await;
        assert!(matches!(result, Err(BotError::Fatal(_))));
        // the run ended on the fatal tick, later events were never seen
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
