//! Rebalancer
//!
//! When skew passes the risk threshold, crosses the spread with a single
//! capped order on the side that shrinks it.

use std::sync::Arc;
use tracing::info;

use super::order_manager::OrderManager;
use super::quote::clamp_price;
use crate::config::MakerConfig;
use crate::exchange::{Exchange, ExchangeError, ExchangeResult, OrderId, Quote, Side};

/// Skew below this is not worth crossing the spread for.
pub const MIN_REBALANCE_SKEW: f64 = 1.0;

pub struct Rebalancer {
    exchange: Arc<dyn Exchange>,
    token_id: String,
    threshold: f64,
    chunk: f64,
    tick_size: f64,
}

impl Rebalancer {
    pub fn new(exchange: Arc<dyn Exchange>, config: &MakerConfig) -> Self {
        Self {
            exchange,
            token_id: config.token_id.clone(),
            threshold: config.rebalance_threshold(),
            chunk: config.rebalance_chunk,
            tick_size: config.tick_size,
        }
    }

    /// `|skew|` above the threshold and at least one unit.
    pub fn should_rebalance(&self, skew: f64) -> bool {
        skew.abs() > self.threshold && skew.abs() >= MIN_REBALANCE_SKEW
    }

    /// Correction order priced one tick through the midpoint.
    pub fn correction(&self, skew: f64, midpoint: f64) -> Option<Quote> {
        if skew.abs() < MIN_REBALANCE_SKEW {
            return None;
        }
        let size = skew.abs().min(self.chunk);
        let (side, price) = if skew > 0.0 {
            (Side::Sell, midpoint - self.tick_size)
        } else {
            (Side::Buy, midpoint + self.tick_size)
        };
        Some(Quote {
            side,
            price: clamp_price(price, self.tick_size),
            size,
        })
    }

    /// Read the midpoint and submit the correction through the order manager.
    ///
    /// `Ok(None)` means nothing reached the book: skew too small or the
    /// exchange refused the order. Transport failures are returned.
    pub async fn execute(&self, skew: f64, orders: &mut OrderManager) -> ExchangeResult<Option<OrderId>> {
        let midpoint = self.exchange.get_midpoint(&self.token_id).await?;
        let Some(quote) = self.correction(skew, midpoint) else {
            return Ok(None);
        };

        info!("[REBAL] Skew {:.2} -> {} {:.2} @ {:.4} (mid {:.4})",
              skew, quote.side, quote.size, quote.price, midpoint);

        match orders.submit(quote).await {
            Ok(id) => Ok(Some(id)),
            Err(ExchangeError::OrderRejected(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
