use crate::api::{with_retry, ExchangeApi, RetryPolicy};
use crate::error::BotError;
use crate::Result;

/// Margin gate run before every order submission
///
/// Wallet margin, position and instrument are three independent remote
/// reads combined for one decision; nothing is cached between calls.
pub struct MarginValidator {
    retry: RetryPolicy,
}

impl MarginValidator {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Check that an order of `qty` contracts fits the available margin
    ///
    /// A `reference_price` of zero falls back to the instrument's last
    /// traded price. The sign of the contract multiplier selects the
    /// pricing formula: positive is a linear contract, negative an inverse
    /// one. Insufficient margin is fatal; it means the strategy is sized
    /// wrong, not that the exchange hiccuped.
    pub async fn validate(
        &self,
        api: &dyn ExchangeApi,
        qty: f64,
        reference_price: f64,
    ) -> Result<()> {
        let margin = with_retry(&self.retry, || api.margin()).await?;
        let position = with_retry(&self.retry, || api.position()).await?;
        let instrument = with_retry(&self.retry, || api.instrument()).await?;

        let price = if reference_price > 0.0 {
            reference_price
        } else {
            instrument.last_price
        };
        let notional = if instrument.multiplier > 0.0 {
            qty * instrument.multiplier * price
        } else {
            qty * instrument.multiplier / price
        };
        let required = notional.abs() * position.init_margin_req;

        if required < margin.available {
            Ok(())
        } else {
            Err(BotError::Fatal(format!(
                "order of {qty} contracts requires {required:.2} margin but only {:.2} is available",
                margin.available
            )))
        }
    }
}
