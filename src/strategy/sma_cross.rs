use async_trait::async_trait;

use super::{sma, Strategy};
use crate::candles::OhlcSeries;
use crate::execution::OrderExecutor;
use crate::Result;

/// Moving-average crossover on closing prices
///
/// Goes long when the fast average crosses above the slow one and short on
/// the opposite cross. Repeated signals in the same direction are absorbed
/// by the executor's guards, so firing on every tick is harmless.
pub struct SmaCross {
    fast: usize,
    slow: usize,
    lot: f64,
}

impl SmaCross {
    pub fn new(fast: usize, slow: usize, lot: f64) -> Self {
        Self { fast, slow, lot }
    }
}

impl Default for SmaCross {
    fn default() -> Self {
        Self::new(10, 20, 100.0)
    }
}

#[async_trait]
impl Strategy for SmaCross {
    fn name(&self) -> &str {
        "sma-cross"
    }

    fn min_candles(&self) -> usize {
        self.slow + 1
    }

    async fn evaluate(&mut self, series: &OhlcSeries, orders: &OrderExecutor) -> Result<()> {
        let closes = &series.close;
        if closes.len() < self.min_candles() {
            return Ok(());
        }

        let previous = &closes[..closes.len() - 1];
        let (Some(fast_now), Some(slow_now), Some(fast_prev), Some(slow_prev)) = (
            sma(closes, self.fast),
            sma(closes, self.slow),
            sma(previous, self.fast),
            sma(previous, self.slow),
        ) else {
            return Ok(());
        };

        let golden_cross = fast_prev <= slow_prev && fast_now > slow_now;
        let dead_cross = fast_prev >= slow_prev && fast_now < slow_now;

        if golden_cross {
            tracing::info!(fast = fast_now, slow = slow_now, "golden cross, going long");
            orders.entry("L", true, self.lot, 0.0, 0.0, true).await?;
        } else if dead_cross {
            tracing::info!(fast = fast_now, slow = slow_now, "dead cross, going short");
            orders.entry("S", false, self.lot, 0.0, 0.0, true).await?;
        }
        Ok(())
    }
}
