pub mod bitmex;
pub mod retry;

pub use bitmex::BitMexClient;
pub use retry::{with_retry, RetryPolicy};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    Candle, Instrument, Margin, NewOrder, OpenOrder, Position, Side, Timeframe, Wallet,
};
use crate::Result;

/// Exchange REST surface consumed by the execution and candle layers
///
/// Every call is a fresh remote read. Implementations must not cache
/// position, order or margin state across calls; the staleness window of a
/// decision is bounded by re-reading on each one.
#[async_trait]
pub trait ExchangeApi: Send + Sync {
    /// Wallet balance
    async fn wallet(&self) -> Result<Wallet>;

    /// Margin available for new orders
    async fn margin(&self) -> Result<Margin>;

    /// Current position for the configured symbol
    async fn position(&self) -> Result<Position>;

    /// Contract metadata and last traded price
    async fn instrument(&self) -> Result<Instrument>;

    /// Bucketed trade history at `timeframe` over `[start, end]`, ascending
    ///
    /// The server caps one page at 500 buckets; callers needing more issue
    /// follow-up fetches.
    async fn fetch_candles(
        &self,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>>;

    /// Submit a new order
    async fn submit_order(&self, order: &NewOrder) -> Result<OpenOrder>;

    /// Cancel one order by exchange id
    async fn cancel_order(&self, order_id: &str) -> Result<OpenOrder>;

    /// Cancel every open order for the symbol, returning what was cancelled
    async fn cancel_all(&self) -> Result<Vec<OpenOrder>>;

    /// Open orders for the symbol on one side
    async fn open_orders(&self, side: Side) -> Result<Vec<OpenOrder>>;

    /// Market-close the whole position
    async fn close_position(&self) -> Result<OpenOrder>;
}
