use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::models::{Candle, Timeframe};

/// Floor `ts` to the start of its bin, aligned to the epoch
///
/// Hourly bins start on the hour, not at the first observed timestamp.
pub fn bin_start(ts: DateTime<Utc>, timeframe: Timeframe) -> DateTime<Utc> {
    let bin_secs = timeframe.duration().num_seconds();
    let floored = ts.timestamp().div_euclid(bin_secs) * bin_secs;
    DateTime::from_timestamp(floored, 0).unwrap_or(ts)
}

/// Aggregate finer-granularity candles into `timeframe` bins
///
/// Within each bin: open = first, close = last, high = max, low = min.
/// A later candle carrying a duplicate timestamp overwrites the earlier
/// one before aggregation. Output is ascending by bin open time.
pub fn resample(candles: &[Candle], timeframe: Timeframe) -> Vec<Candle> {
    let mut by_ts: BTreeMap<i64, &Candle> = BTreeMap::new();
    for candle in candles {
        by_ts.insert(candle.timestamp.timestamp(), candle);
    }

    let mut bins: BTreeMap<i64, Candle> = BTreeMap::new();
    for candle in by_ts.into_values() {
        let start = bin_start(candle.timestamp, timeframe);
        match bins.get_mut(&start.timestamp()) {
            None => {
                bins.insert(
                    start.timestamp(),
                    Candle {
                        timestamp: start,
                        open: candle.open,
                        high: candle.high,
                        low: candle.low,
                        close: candle.close,
                    },
                );
            }
            Some(bin) => {
                bin.high = bin.high.max(candle.high);
                bin.low = bin.low.min(candle.low);
                bin.close = candle.close;
            }
        }
    }

    bins.into_values().collect()
}
