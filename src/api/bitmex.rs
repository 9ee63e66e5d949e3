use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::api::ExchangeApi;
use crate::config::BotConfig;
use crate::error::BotError;
use crate::models::{
    Candle, Instrument, Margin, NewOrder, OpenOrder, Position, Side, Timeframe, Wallet,
};
use crate::Result;

const MAINNET_BASE: &str = "https://www.bitmex.com";
const TESTNET_BASE: &str = "https://testnet.bitmex.com";
const API_PREFIX: &str = "/api/v1";

/// Seconds an outgoing request signature stays valid
const AUTH_EXPIRES_SECS: i64 = 5;

/// One history page is capped by the server at this many buckets
pub const FETCH_PAGE_LIMIT: u32 = 500;

type HmacSha256 = Hmac<Sha256>;

/// BitMEX REST client for a single contract symbol
///
/// Requests are signed with HMAC-SHA256 over `verb + path + expires + body`.
/// Errors map onto the bot taxonomy by status class so the retry executor
/// and the order controller can route on them.
#[derive(Clone)]
pub struct BitMexClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    symbol: String,
}

impl BitMexClient {
    pub fn new(config: &BotConfig) -> Self {
        let base = if config.testnet {
            TESTNET_BASE
        } else {
            MAINNET_BASE
        };
        Self::with_base_url(base, &config.api_key, &config.api_secret, &config.symbol)
    }

    /// Build a client against an explicit base URL (tests point this at a
    /// local mock server)
    pub fn with_base_url(base_url: &str, api_key: &str, api_secret: &str, symbol: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            symbol: symbol.to_string(),
        }
    }

    fn sign(&self, verb: &str, path: &str, expires: i64, body: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .map_err(|e| BotError::Config(format!("invalid api secret: {e}")))?;
        mac.update(format!("{verb}{path}{expires}{body}").as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn build_url(&self, path: &str, query: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}{}", self.base_url, API_PREFIX, path))
            .map_err(|e| BotError::Config(format!("invalid request url: {e}")))?;
        for (key, value) in query {
            url.query_pairs_mut().append_pair(key, value);
        }
        Ok(url)
    }

    /// Path-with-query string exactly as sent, for the signature payload
    fn signed_path(url: &Url) -> String {
        match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.build_url(path, query)?;
        let expires = Utc::now().timestamp() + AUTH_EXPIRES_SECS;
        let signature = self.sign("GET", &Self::signed_path(&url), expires, "")?;

        let response = self
            .client
            .get(url)
            .header("api-key", self.api_key.as_str())
            .header("api-expires", expires.to_string())
            .header("api-signature", signature)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn send_json<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.build_url(path, &[])?;
        let payload = serde_json::to_string(body)?;
        let expires = Utc::now().timestamp() + AUTH_EXPIRES_SECS;
        let signature = self.sign(
            method.as_str(),
            &Self::signed_path(&url),
            expires,
            &payload,
        )?;

        let response = self
            .client
            .request(method, url)
            .header("api-key", self.api_key.as_str())
            .header("api-expires", expires.to_string())
            .header("api-signature", signature)
            .header("content-type", "application/json")
            .body(payload)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                404 | 410 => BotError::NotFound(message),
                429 | 500..=599 => BotError::Transient(message),
                s => BotError::Http { status: s, message },
            });
        }
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(Into::into)
    }

    fn open_order_filter(&self, side: Side) -> String {
        serde_json::json!({
            "symbol": self.symbol,
            "open": true,
            "side": side.as_str(),
        })
        .to_string()
    }
}

#[derive(Debug, Deserialize)]
struct WalletResponse {
    amount: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarginResponse {
    excess_margin: f64,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct PositionResponse {
    #[serde(default)]
    current_qty: f64,
    #[serde(default)]
    avg_entry_price: Option<f64>,
    #[serde(default)]
    leverage: f64,
    #[serde(default)]
    init_margin_req: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstrumentResponse {
    multiplier: f64,
    last_price: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketResponse {
    timestamp: DateTime<Utc>,
    #[serde(default)]
    open: Option<f64>,
    #[serde(default)]
    high: Option<f64>,
    #[serde(default)]
    low: Option<f64>,
    #[serde(default)]
    close: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    #[serde(rename = "orderID")]
    order_id: String,
    side: String,
    order_qty: f64,
    #[serde(default)]
    price: Option<f64>,
    #[serde(default)]
    stop_px: Option<f64>,
    ord_type: String,
}

impl OrderResponse {
    fn into_open_order(self) -> Result<OpenOrder> {
        Ok(OpenOrder {
            id: self.order_id,
            side: self.side.parse()?,
            qty: self.order_qty,
            limit_price: self.price,
            stop_price: self.stop_px,
            order_type: self.ord_type.parse()?,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderPayload<'a> {
    symbol: &'a str,
    side: &'a str,
    order_qty: f64,
    ord_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_px: Option<f64>,
    #[serde(rename = "clOrdID")]
    cl_ord_id: &'a str,
}

#[derive(Serialize)]
struct CancelPayload<'a> {
    #[serde(rename = "orderID")]
    order_id: &'a str,
}

#[derive(Serialize)]
struct SymbolPayload<'a> {
    symbol: &'a str,
}

#[async_trait::async_trait]
impl ExchangeApi for BitMexClient {
    async fn wallet(&self) -> Result<Wallet> {
        let wallet: WalletResponse = self
            .get("/user/wallet", &[("currency", "XBt".to_string())])
            .await?;
        Ok(Wallet {
            balance: wallet.amount,
        })
    }

    async fn margin(&self) -> Result<Margin> {
        let margin: MarginResponse = self
            .get("/user/margin", &[("currency", "XBt".to_string())])
            .await?;
        Ok(Margin {
            available: margin.excess_margin,
        })
    }

    async fn position(&self) -> Result<Position> {
        let filter = serde_json::json!({ "symbol": self.symbol }).to_string();
        let positions: Vec<PositionResponse> =
            self.get("/position", &[("filter", filter)]).await?;
        // no row yet means the symbol was never traded: flat position
        let position = positions.into_iter().next().unwrap_or_default();
        Ok(Position {
            qty: position.current_qty,
            avg_entry_price: position.avg_entry_price.unwrap_or(0.0),
            leverage: position.leverage,
            init_margin_req: position.init_margin_req,
        })
    }

    async fn instrument(&self) -> Result<Instrument> {
        let instruments: Vec<InstrumentResponse> = self
            .get(
                "/instrument",
                &[
                    ("symbol", self.symbol.clone()),
                    ("count", "1".to_string()),
                ],
            )
            .await?;
        let instrument = instruments
            .into_iter()
            .next()
            .ok_or_else(|| BotError::Parse(format!("unknown instrument: {}", self.symbol)))?;
        Ok(Instrument {
            multiplier: instrument.multiplier,
            last_price: instrument.last_price,
        })
    }

    async fn fetch_candles(
        &self,
        timeframe: Timeframe,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        let buckets: Vec<BucketResponse> = self
            .get(
                "/trade/bucketed",
                &[
                    ("binSize", timeframe.as_str().to_string()),
                    ("partial", "false".to_string()),
                    ("symbol", self.symbol.clone()),
                    ("count", FETCH_PAGE_LIMIT.to_string()),
                    ("reverse", "false".to_string()),
                    (
                        "startTime",
                        start.to_rfc3339_opts(SecondsFormat::Millis, true),
                    ),
                    ("endTime", end.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ],
            )
            .await?;

        // buckets with no trades come back with null prices; drop them
        let candles = buckets
            .into_iter()
            .filter_map(|b| match (b.open, b.high, b.low, b.close) {
                (Some(open), Some(high), Some(low), Some(close)) => Some(Candle {
                    timestamp: b.timestamp,
                    open,
                    high,
                    low,
                    close,
                }),
                _ => None,
            })
            .collect();
        Ok(candles)
    }

    async fn submit_order(&self, order: &NewOrder) -> Result<OpenOrder> {
        let payload = OrderPayload {
            symbol: &self.symbol,
            side: order.side.as_str(),
            order_qty: order.qty,
            ord_type: order.order_type.as_str(),
            price: order.limit_price,
            stop_px: order.stop_price,
            cl_ord_id: &order.client_id,
        };
        let response: OrderResponse = self.send_json(Method::POST, "/order", &payload).await?;
        response.into_open_order()
    }

    async fn cancel_order(&self, order_id: &str) -> Result<OpenOrder> {
        let payload = CancelPayload { order_id };
        let cancelled: Vec<OrderResponse> =
            self.send_json(Method::DELETE, "/order", &payload).await?;
        cancelled
            .into_iter()
            .next()
            .ok_or_else(|| BotError::NotFound(format!("order {order_id} not found")))?
            .into_open_order()
    }

    async fn cancel_all(&self) -> Result<Vec<OpenOrder>> {
        let payload = SymbolPayload {
            symbol: &self.symbol,
        };
        let cancelled: Vec<OrderResponse> = self
            .send_json(Method::DELETE, "/order/all", &payload)
            .await?;
        cancelled
            .into_iter()
            .map(OrderResponse::into_open_order)
            .collect()
    }

    async fn open_orders(&self, side: Side) -> Result<Vec<OpenOrder>> {
        let orders: Vec<OrderResponse> = self
            .get(
                "/order",
                &[
                    ("filter", self.open_order_filter(side)),
                    ("count", FETCH_PAGE_LIMIT.to_string()),
                ],
            )
            .await?;
        orders
            .into_iter()
            .map(OrderResponse::into_open_order)
            .collect()
    }

    async fn close_position(&self) -> Result<OpenOrder> {
        let payload = SymbolPayload {
            symbol: &self.symbol,
        };
        let response: OrderResponse = self
            .send_json(Method::POST, "/order/closePosition", &payload)
            .await?;
        response.into_open_order()
    }
}
