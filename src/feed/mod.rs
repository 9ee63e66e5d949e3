// Market data delivery
pub mod poll;

pub use poll::RestPoller;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::models::Candle;

/// Push source of native-granularity candles
///
/// Delivery is one event at a time: the dispatcher awaits `next` serially,
/// so the candle cache is only ever touched by one logical flow.
#[async_trait]
pub trait MarketFeed: Send {
    /// Next candle, or None once the feed has closed and drained
    async fn next(&mut self) -> Option<Candle>;

    /// Stop delivery; events still in flight are discarded by the producer
    fn close(&mut self);
}

/// Channel-backed feed that any transport task can write into
pub struct ChannelFeed {
    rx: mpsc::Receiver<Candle>,
}

impl ChannelFeed {
    /// Returns the producer handle and the feed
    pub fn new(capacity: usize) -> (mpsc::Sender<Candle>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl MarketFeed for ChannelFeed {
    async fn next(&mut self) -> Option<Candle> {
        self.rx.recv().await
    }

    fn close(&mut self) {
        self.rx.close();
    }
}
