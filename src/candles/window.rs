use chrono::Utc;

use super::resample::resample;
use crate::api::{with_retry, ExchangeApi, RetryPolicy};
use crate::models::{Candle, Timeframe};
use crate::Result;

/// Four parallel OHLC columns over the current window
///
/// The last element tracks the still-forming bin, so its values are
/// provisional until that bin closes. Strategies see intrabar updates on
/// purpose.
#[derive(Debug, Clone, Default)]
pub struct OhlcSeries {
    pub open: Vec<f64>,
    pub high: Vec<f64>,
    pub low: Vec<f64>,
    pub close: Vec<f64>,
}

impl OhlcSeries {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }
}

/// Gap-free rolling window of candles at the strategy's timeframe
///
/// Storage holds native candles for the forming bin and already-resampled
/// bins for closed history; each time a bin closes the storage collapses
/// to the resampled tail of `window_len` bins, so the window is bounded
/// once it has stabilized past bootstrap.
#[derive(Debug, Clone)]
pub struct CandleWindow {
    timeframe: Timeframe,
    window_len: usize,
    data: Vec<Candle>,
}

impl CandleWindow {
    pub fn new(timeframe: Timeframe, window_len: usize) -> Self {
        Self {
            timeframe,
            window_len,
            data: Vec::new(),
        }
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Seed the window from a historical bootstrap fetch
    pub fn seed(&mut self, candles: Vec<Candle>) {
        self.data = candles;
    }

    /// Fold one native-granularity candle into the window
    ///
    /// Returns true when the incoming candle opened a new bin, i.e. the
    /// previous bin just closed; at that point closed history is trimmed
    /// to `window_len`. Merging the same candle twice leaves the window
    /// unchanged after the first merge.
    pub fn merge(&mut self, candle: Candle) -> bool {
        let prev_key = resample(&self.data, self.timeframe)
            .last()
            .map(|c| c.timestamp);

        // a rewrite of an already-stored native slot replaces it
        match self
            .data
            .iter()
            .position(|c| c.timestamp == candle.timestamp)
        {
            Some(i) => self.data[i] = candle,
            None => self.data.push(candle),
        }

        let resampled = resample(&self.data, self.timeframe);
        let new_key = resampled.last().map(|c| c.timestamp);
        let new_bin = matches!((prev_key, new_key), (Some(prev), Some(new)) if new > prev);

        if new_bin {
            let tail = resampled.len().saturating_sub(self.window_len);
            self.data = resampled[tail..].to_vec();
        }

        new_bin
    }

    /// The current window resampled to the target timeframe
    pub fn candles(&self) -> Vec<Candle> {
        resample(&self.data, self.timeframe)
    }

    /// Series view over the whole window, including the forming bin
    pub fn series(&self) -> OhlcSeries {
        let candles = self.candles();
        let mut series = OhlcSeries {
            open: Vec::with_capacity(candles.len()),
            high: Vec::with_capacity(candles.len()),
            low: Vec::with_capacity(candles.len()),
            close: Vec::with_capacity(candles.len()),
        };
        for candle in &candles {
            series.open.push(candle.open);
            series.high.push(candle.high);
            series.low.push(candle.low);
            series.close.push(candle.close);
        }
        series
    }
}

/// Fetch and resample the initial window from bucketed history
///
/// Fetches at the timeframe's native granularity over the trailing
/// `window_len` bins. When one server page undershoots the window, a
/// single follow-up fetch covers the tail at native granularity. An empty
/// fetch yields an empty window that fills from streaming merges.
pub async fn bootstrap(
    api: &dyn ExchangeApi,
    retry: &RetryPolicy,
    timeframe: Timeframe,
    window_len: usize,
) -> Result<CandleWindow> {
    let end = Utc::now();
    let start = end - timeframe.duration() * window_len as i32;
    let native = timeframe.native();

    let fetched = with_retry(retry, || api.fetch_candles(native, start, end)).await?;
    let mut window = CandleWindow::new(timeframe, window_len);
    if fetched.is_empty() {
        return Ok(window);
    }

    let mut data = resample(&fetched, timeframe);
    if data.len() < window_len {
        if let Some(last) = data.last() {
            let tail_start = last.timestamp + native.duration();
            let tail = with_retry(retry, || api.fetch_candles(native, tail_start, end)).await?;
            data.extend(tail);
        }
    }

    window.seed(data);
    tracing::info!(
        timeframe = %timeframe,
        candles = window.candles().len(),
        "bootstrapped candle window"
    );
    Ok(window)
}
