use std::env;

use crate::error::BotError;
use crate::models::Timeframe;
use crate::Result;

const DEFAULT_SYMBOL: &str = "XBTUSD";
const DEFAULT_WINDOW_LEN: usize = 100;
const DEFAULT_RETAIN_RATE: f64 = 0.2;

/// Runtime configuration, read from the environment
///
/// The testnet flag selects between the `BITMEX_APIKEY`/`BITMEX_SECRET`
/// pair and the `BITMEX_TEST_*` pair.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub api_key: String,
    pub api_secret: String,
    pub testnet: bool,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub window_len: usize,
    pub webhook_url: Option<String>,
    /// Fraction of the balance held back when sizing the default lot
    pub retain_rate: f64,
}

impl BotConfig {
    pub fn from_env(testnet: bool) -> Result<Self> {
        let (key_var, secret_var) = if testnet {
            ("BITMEX_TEST_APIKEY", "BITMEX_TEST_SECRET")
        } else {
            ("BITMEX_APIKEY", "BITMEX_SECRET")
        };
        let api_key =
            env::var(key_var).map_err(|_| BotError::Config(format!("{key_var} not set")))?;
        let api_secret =
            env::var(secret_var).map_err(|_| BotError::Config(format!("{secret_var} not set")))?;

        let symbol = env::var("PERPBOT_SYMBOL").unwrap_or_else(|_| DEFAULT_SYMBOL.to_string());
        let timeframe = match env::var("PERPBOT_TIMEFRAME") {
            Ok(value) => value.parse()?,
            Err(_) => Timeframe::H1,
        };
        let window_len = env::var("PERPBOT_WINDOW")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_WINDOW_LEN);
        let webhook_url = env::var("PERPBOT_WEBHOOK_URL").ok();
        let retain_rate = env::var("PERPBOT_RETAIN_RATE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_RETAIN_RATE);

        Ok(Self {
            api_key,
            api_secret,
            testnet,
            symbol,
            timeframe,
            window_len,
            webhook_url,
            retain_rate,
        })
    }
}
