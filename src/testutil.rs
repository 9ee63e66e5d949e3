use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::api::ExchangeApi;
use crate::error::BotError;
use crate::models::{
    Candle, Instrument, Margin, NewOrder, OpenOrder, Position, Side, Timeframe, Wallet,
};
use crate::Result;

/// In-memory exchange double used by unit tests
///
/// Records every submit/cancel and serves scripted history pages, so tests
/// can assert on the exact remote traffic a component produced.
pub(crate) struct FakeExchange {
    pub wallet: Mutex<Wallet>,
    pub margin: Mutex<Margin>,
    pub position: Mutex<Position>,
    pub instrument: Mutex<Instrument>,
    pub open: Mutex<Vec<OpenOrder>>,
    pub submitted: Mutex<Vec<NewOrder>>,
    pub cancelled: Mutex<Vec<String>>,
    /// order ids whose cancel comes back not-found
    pub vanished: Mutex<Vec<String>>,
    /// scripted pages served by fetch_candles, oldest first
    pub history: Mutex<VecDeque<Vec<Candle>>>,
    pub fetch_calls: AtomicUsize,
    next_id: AtomicUsize,
}

impl FakeExchange {
    pub fn new() -> Self {
        Self {
            wallet: Mutex::new(Wallet { balance: 100_000_000.0 }),
            margin: Mutex::new(Margin {
                available: 1_000_000_000.0,
            }),
            position: Mutex::new(Position {
                qty: 0.0,
                avg_entry_price: 0.0,
                leverage: 10.0,
                init_margin_req: 0.01,
            }),
            instrument: Mutex::new(Instrument {
                multiplier: 1.0,
                last_price: 100.0,
            }),
            open: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            vanished: Mutex::new(Vec::new()),
            history: Mutex::new(VecDeque::new()),
            fetch_calls: AtomicUsize::new(0),
            next_id: AtomicUsize::new(1),
        }
    }

    pub fn set_position_qty(&self, qty: f64) {
        self.position.lock().unwrap().qty = qty;
    }

    pub fn set_available_margin(&self, available: f64) {
        self.margin.lock().unwrap().available = available;
    }

    pub fn set_instrument(&self, multiplier: f64, last_price: f64) {
        *self.instrument.lock().unwrap() = Instrument {
            multiplier,
            last_price,
        };
    }

    pub fn push_history(&self, page: Vec<Candle>) {
        self.history.lock().unwrap().push_back(page);
    }

    pub fn add_open_order(&self, order: OpenOrder) {
        self.open.lock().unwrap().push(order);
    }

    /// Add an open order whose cancel will report not-found
    pub fn add_vanishing_order(&self, order: OpenOrder) {
        self.vanished.lock().unwrap().push(order.id.clone());
        self.open.lock().unwrap().push(order);
    }

    pub fn submitted_orders(&self) -> Vec<NewOrder> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

pub(crate) fn candle_at(minute: i64, open: f64, high: f64, low: f64, close: f64) -> Candle {
    Candle {
        timestamp: Utc.timestamp_opt(minute * 60, 0).unwrap(),
        open,
        high,
        low,
        close,
    }
}

pub(crate) fn flat_candle(minute: i64, price: f64) -> Candle {
    candle_at(minute, price, price, price, price)
}

#[async_trait]
impl ExchangeApi for FakeExchange {
    async fn wallet(&self) -> Result<Wallet> {
        Ok(self.wallet.lock().unwrap().clone())
    }

    async fn margin(&self) -> Result<Margin> {
        Ok(self.margin.lock().unwrap().clone())
    }

    async fn position(&self) -> Result<Position> {
        Ok(self.position.lock().unwrap().clone())
    }

    async fn instrument(&self) -> Result<Instrument> {
        Ok(self.instrument.lock().unwrap().clone())
    }

    async fn fetch_candles(
        &self,
        _timeframe: Timeframe,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Candle>> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.history.lock().unwrap().pop_front().unwrap_or_default())
    }

    async fn submit_order(&self, order: &NewOrder) -> Result<OpenOrder> {
        let id = format!("fake-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let placed = OpenOrder {
            id,
            side: order.side,
            qty: order.qty,
            limit_price: order.limit_price,
            stop_price: order.stop_price,
            order_type: order.order_type,
        };
        self.submitted.lock().unwrap().push(order.clone());
        self.open.lock().unwrap().push(placed.clone());
        Ok(placed)
    }

    async fn cancel_order(&self, order_id: &str) -> Result<OpenOrder> {
        if self.vanished.lock().unwrap().iter().any(|id| id == order_id) {
            return Err(BotError::NotFound(format!("order {order_id} not found")));
        }
        let mut open = self.open.lock().unwrap();
        match open.iter().position(|o| o.id == order_id) {
            Some(i) => {
                let order = open.remove(i);
                self.cancelled.lock().unwrap().push(order.id.clone());
                Ok(order)
            }
            None => Err(BotError::NotFound(format!("order {order_id} not found"))),
        }
    }

    async fn cancel_all(&self) -> Result<Vec<OpenOrder>> {
        let mut open = self.open.lock().unwrap();
        let cancelled: Vec<OpenOrder> = open.drain(..).collect();
        let mut ids = self.cancelled.lock().unwrap();
        for order in &cancelled {
            ids.push(order.id.clone());
        }
        Ok(cancelled)
    }

    async fn open_orders(&self, side: Side) -> Result<Vec<OpenOrder>> {
        Ok(self
            .open
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.side == side)
            .cloned()
            .collect())
    }

    async fn close_position(&self) -> Result<OpenOrder> {
        let mut position = self.position.lock().unwrap();
        let qty = position.qty.abs();
        let side = if position.qty >= 0.0 {
            Side::Sell
        } else {
            Side::Buy
        };
        position.qty = 0.0;
        Ok(OpenOrder {
            id: format!("close-{}", self.next_id.fetch_add(1, Ordering::SeqCst)),
            side,
            qty,
            limit_price: None,
            stop_price: None,
            order_type: crate::models::OrderType::Market,
        })
    }
}
