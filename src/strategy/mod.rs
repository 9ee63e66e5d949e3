// Trading strategy module
pub mod sma_cross;

pub use sma_cross::SmaCross;

use async_trait::async_trait;

use crate::candles::OhlcSeries;
use crate::execution::OrderExecutor;
use crate::Result;

/// Base trait for all trading strategies
///
/// A strategy sees the full rolling window on every native tick; the last
/// element of each series is the still-forming bin, so intrabar values are
/// provisional. Returning `BotError::Fatal` asks the dispatcher to stop
/// the bot; any other error is logged and the loop continues.
#[async_trait]
pub trait Strategy: Send {
    /// Strategy name, used in logs
    fn name(&self) -> &str;

    /// Minimum window length before signals are meaningful
    fn min_candles(&self) -> usize;

    /// Evaluate the current window and place orders as needed
    async fn evaluate(&mut self, series: &OhlcSeries, orders: &OrderExecutor) -> Result<()>;
}

/// Simple moving average over the last `period` values
pub fn sma(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    Some(values[values.len() - period..].iter().sum::<f64>() / period as f64)
}
