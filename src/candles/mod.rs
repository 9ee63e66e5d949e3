// Candle aggregation: resampling and the rolling window
pub mod resample;
pub mod window;

pub use resample::{bin_start, resample};
pub use window::{bootstrap, CandleWindow, OhlcSeries};
