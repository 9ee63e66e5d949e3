use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::BotError;

/// OHLC bar keyed by its open time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn from_long(long: bool) -> Self {
        if long {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }
}

impl FromStr for Side {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Buy" => Ok(Side::Buy),
            "Sell" => Ok(Side::Sell),
            other => Err(BotError::Parse(format!("unknown order side: {other}"))),
        }
    }
}

/// Exchange order types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    Stop,
    StopLimit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "Market",
            OrderType::Limit => "Limit",
            OrderType::Stop => "Stop",
            OrderType::StopLimit => "StopLimit",
        }
    }
}

impl FromStr for OrderType {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Market" => Ok(OrderType::Market),
            "Limit" => Ok(OrderType::Limit),
            "Stop" => Ok(OrderType::Stop),
            "StopLimit" => Ok(OrderType::StopLimit),
            other => Err(BotError::Parse(format!("unknown order type: {other}"))),
        }
    }
}

/// Open order snapshot, fetched fresh before every decision
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub id: String,
    pub side: Side,
    pub qty: f64,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub order_type: OrderType,
}

/// New order request
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub client_id: String,
    pub side: Side,
    pub qty: f64,
    pub limit_price: Option<f64>,
    pub stop_price: Option<f64>,
    pub order_type: OrderType,
}

/// Position snapshot; `qty` is signed, positive means long
#[derive(Debug, Clone, Default)]
pub struct Position {
    pub qty: f64,
    pub avg_entry_price: f64,
    pub leverage: f64,
    pub init_margin_req: f64,
}

/// Margin available for new orders
#[derive(Debug, Clone, Default)]
pub struct Margin {
    pub available: f64,
}

/// Wallet balance in the exchange's base unit (satoshis for XBT wallets)
#[derive(Debug, Clone, Default)]
pub struct Wallet {
    pub balance: f64,
}

/// Contract metadata; a negative multiplier marks an inverse contract
#[derive(Debug, Clone, Default)]
pub struct Instrument {
    pub multiplier: f64,
    pub last_price: f64,
}

/// Candle granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    M1,
    M2,
    M3,
    M5,
    M15,
    M30,
    H1,
    H2,
    H4,
    H12,
    D1,
}

impl Timeframe {
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M1 => 1,
            Timeframe::M2 => 2,
            Timeframe::M3 => 3,
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H2 => 120,
            Timeframe::H4 => 240,
            Timeframe::H12 => 720,
            Timeframe::D1 => 1440,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// The finer granularity the exchange serves history at for this target
    ///
    /// The REST bucket endpoint only supports 1m, 5m, 1h and 1d; every
    /// other timeframe is resampled from the next supported size below it.
    pub fn native(&self) -> Timeframe {
        match self {
            Timeframe::M1 | Timeframe::M2 | Timeframe::M3 | Timeframe::M5 => Timeframe::M1,
            Timeframe::M15 | Timeframe::M30 | Timeframe::H1 => Timeframe::M5,
            Timeframe::H2 | Timeframe::H4 | Timeframe::H12 => Timeframe::H1,
            Timeframe::D1 => Timeframe::D1,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M2 => "2m",
            Timeframe::M3 => "3m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H2 => "2h",
            Timeframe::H4 => "4h",
            Timeframe::H12 => "12h",
            Timeframe::D1 => "1d",
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Timeframe {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1m" => Ok(Timeframe::M1),
            "2m" => Ok(Timeframe::M2),
            "3m" => Ok(Timeframe::M3),
            "5m" => Ok(Timeframe::M5),
            "15m" => Ok(Timeframe::M15),
            "30m" => Ok(Timeframe::M30),
            "1h" => Ok(Timeframe::H1),
            "2h" => Ok(Timeframe::H2),
            "4h" => Ok(Timeframe::H4),
            "12h" => Ok(Timeframe::H12),
            "1d" => Ok(Timeframe::D1),
            other => Err(BotError::Parse(format!("unknown timeframe: {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_round_trip() {
        for tf in [
            Timeframe::M1,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::H1,
            Timeframe::H4,
            Timeframe::D1,
        ] {
            assert_eq!(tf.as_str().parse::<Timeframe>().unwrap(), tf);
        }
        assert!("7m".parse::<Timeframe>().is_err());
    }

    #[test]
    fn test_native_granularity_is_finer_and_supported() {
        let supported = [Timeframe::M1, Timeframe::M5, Timeframe::H1, Timeframe::D1];
        for tf in [
            Timeframe::M1,
            Timeframe::M2,
            Timeframe::M3,
            Timeframe::M5,
            Timeframe::M15,
            Timeframe::M30,
            Timeframe::H1,
            Timeframe::H2,
            Timeframe::H4,
            Timeframe::H12,
            Timeframe::D1,
        ] {
            let native = tf.native();
            assert!(supported.contains(&native));
            assert!(native.minutes() <= tf.minutes());
            // native bins must tile the target bin exactly
            assert_eq!(tf.minutes() % native.minutes(), 0);
        }
    }

    #[test]
    fn test_side_from_long() {
        assert_eq!(Side::from_long(true), Side::Buy);
        assert_eq!(Side::from_long(false), Side::Sell);
    }

    #[test]
    fn test_order_type_parse() {
        assert_eq!("StopLimit".parse::<OrderType>().unwrap(), OrderType::StopLimit);
        assert!("Iceberg".parse::<OrderType>().is_err());
    }
}
