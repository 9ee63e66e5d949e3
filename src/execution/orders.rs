use std::sync::Arc;

use uuid::Uuid;

use crate::api::{with_retry, ExchangeApi, RetryPolicy};
use crate::error::BotError;
use crate::execution::margin::MarginValidator;
use crate::models::{NewOrder, OpenOrder, OrderType, Position, Side};
use crate::Result;

/// Taker fee charged by the exchange per executed contract value
pub const COMMISSION_RATE: f64 = 0.075 / 100.0;

/// Places and cancels orders for a single contract symbol
///
/// Each entry call is one atomic decision: guard, dedupe, cancel
/// conflicting orders, validate margin, submit. Position and open-order
/// state are re-read fresh on every call; nothing is cached between
/// decisions. Callers must not run two entry calls concurrently.
pub struct OrderExecutor {
    api: Arc<dyn ExchangeApi>,
    retry: RetryPolicy,
    margin: MarginValidator,
    trade_log: bool,
}

impl OrderExecutor {
    pub fn new(api: Arc<dyn ExchangeApi>, retry: RetryPolicy) -> Self {
        let margin = MarginValidator::new(retry.clone());
        Self {
            api,
            retry,
            margin,
            trade_log: true,
        }
    }

    pub fn with_trade_log(mut self, enabled: bool) -> Self {
        self.trade_log = enabled;
        self
    }

    /// Pine-style entry: open `qty` contracts in the requested direction,
    /// flattening any opposing position in the same order
    ///
    /// Skips without side effects when `proceed` is false, when the
    /// position already points the requested way, or when an identical
    /// order is already open. The limit/stop combination selects the order
    /// type: both set is a stop-limit, one of them a limit or stop, neither
    /// a market order.
    pub async fn entry(
        &self,
        label: &str,
        long: bool,
        qty: f64,
        limit: f64,
        stop: f64,
        proceed: bool,
    ) -> Result<()> {
        if !proceed {
            return Ok(());
        }

        let position = self.position().await?;
        if long && position.qty > 0.0 {
            tracing::debug!(label, "already long, skipping entry");
            return Ok(());
        }
        if !long && position.qty < 0.0 {
            tracing::debug!(label, "already short, skipping entry");
            return Ok(());
        }

        let side = Side::from_long(long);
        let order_qty = qty + position.qty.abs();

        if self.exist_open_order(side, order_qty, limit, stop).await? {
            tracing::debug!(label, "identical order already open, skipping entry");
            return Ok(());
        }

        self.cancel_side(side).await?;

        let (order_type, reference_price) = match (limit > 0.0, stop > 0.0) {
            (true, true) => (OrderType::StopLimit, limit),
            (true, false) => (OrderType::Limit, limit),
            (false, true) => (OrderType::Stop, stop),
            (false, false) => (OrderType::Market, 0.0),
        };
        self.margin
            .validate(self.api.as_ref(), order_qty, reference_price)
            .await?;

        let order = NewOrder {
            client_id: format!("{}-{}", label, Uuid::new_v4()),
            side,
            qty: order_qty,
            limit_price: (limit > 0.0).then_some(limit),
            stop_price: (stop > 0.0).then_some(stop),
            order_type,
        };
        let placed = with_retry(&self.retry, || self.api.submit_order(&order)).await?;

        if self.trade_log {
            tracing::info!(
                label,
                id = %placed.id,
                order_type = order_type.as_str(),
                side = side.as_str(),
                qty = order_qty,
                limit,
                stop,
                "order created"
            );
        }
        Ok(())
    }

    /// Cancel every open order on `side`
    ///
    /// An order that is already gone counts as cancelled and does not stop
    /// the rest of the batch.
    pub async fn cancel_side(&self, side: Side) -> Result<()> {
        let orders = self.open_orders(side).await?;
        for order in orders {
            match with_retry(&self.retry, || self.api.cancel_order(&order.id)).await {
                Ok(cancelled) => log_order("order cancelled", &cancelled),
                Err(BotError::NotFound(_)) => {
                    tracing::debug!(id = %order.id, "order already gone, nothing to cancel");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Cancel every open order on both sides
    pub async fn cancel_all(&self) -> Result<()> {
        let cancelled = with_retry(&self.retry, || self.api.cancel_all()).await?;
        for order in &cancelled {
            log_order("order cancelled", order);
        }
        tracing::info!(count = cancelled.len(), "cancelled all orders");
        Ok(())
    }

    /// Market-close the whole position
    pub async fn close_position(&self) -> Result<()> {
        let order = with_retry(&self.retry, || self.api.close_position()).await?;
        log_order("position closed", &order);
        Ok(())
    }

    /// Current position, fetched fresh
    pub async fn position(&self) -> Result<Position> {
        with_retry(&self.retry, || self.api.position()).await
    }

    /// Last traded price, fetched fresh
    pub async fn market_price(&self) -> Result<f64> {
        let instrument = with_retry(&self.retry, || self.api.instrument()).await?;
        Ok(instrument.last_price)
    }

    /// Open orders on one side, fetched fresh
    pub async fn open_orders(&self, side: Side) -> Result<Vec<OpenOrder>> {
        with_retry(&self.retry, || self.api.open_orders(side)).await
    }

    /// Default order size from balance, leverage and market price, with
    /// `retain_rate` of the balance held back
    pub async fn default_lot(&self, retain_rate: f64) -> Result<f64> {
        let wallet = with_retry(&self.retry, || self.api.wallet()).await?;
        let position = self.position().await?;
        let price = self.market_price().await?;
        let lot = (1.0 - retain_rate) * wallet.balance / 100_000_000.0 * position.leverage * price;
        Ok(lot.floor())
    }

    /// True when an open order on `side` matches the quantity and the
    /// exact limit/stop combination, including the absence of the other
    /// price field
    async fn exist_open_order(&self, side: Side, qty: f64, limit: f64, stop: f64) -> Result<bool> {
        if limit <= 0.0 && stop <= 0.0 {
            // market orders carry no resting state to match against
            return Ok(false);
        }
        let orders = self.open_orders(side).await?;
        Ok(orders.iter().any(|o| {
            o.qty == qty
                && o.limit_price == (limit > 0.0).then_some(limit)
                && o.stop_price == (stop > 0.0).then_some(stop)
        }))
    }
}

fn log_order(event: &str, order: &OpenOrder) {
    tracing::info!(
        id = %order.id,
        order_type = order.order_type.as_str(),
        side = order.side.as_str(),
        qty = order.qty,
        limit = order.limit_price.unwrap_or(0.0),
        stop = order.stop_price.unwrap_or(0.0),
        "{event}"
    );
}
