//! State Tracker - position and resting orders for one token
//!
//! Refreshed once per iteration. A refresh either replaces both fields or
//! leaves both alone and marks the snapshot stale.

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::exchange::{Exchange, ExchangeResult, OpenOrder, Position};

pub struct StateTracker {
    exchange: Arc<dyn Exchange>,
    market_address: String,
    token_id: String,
    target_position: f64,
    position: Option<Position>,
    open_orders: Vec<OpenOrder>,
    fresh: bool,
    last_sync: Option<Instant>,
}

impl StateTracker {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        market_address: String,
        token_id: String,
        target_position: f64,
    ) -> Self {
        Self {
            exchange,
            market_address,
            token_id,
            target_position,
            position: None,
            open_orders: Vec::new(),
            fresh: false,
            last_sync: None,
        }
    }

    pub async fn refresh(&mut self) -> ExchangeResult<()> {
        let fetched = self.fetch().await;
        match fetched {
            Ok((position, orders)) => {
                let changed = self.position != Some(position);
                self.position = Some(position);
                self.open_orders = orders;
                self.fresh = true;
                self.last_sync = Some(Instant::now());

                if changed {
                    info!("[STATE] Position {:.2} | skew {:.2} | resting {}",
                          position.size, self.skew(), self.open_orders.len());
                } else {
                    debug!("[STATE] Position {:.2} | resting {}", position.size, self.open_orders.len());
                }
                Ok(())
            }
            Err(e) => {
                self.fresh = false;
                warn!("[STATE] Refresh failed ({}): {}", e.kind(), e);
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> ExchangeResult<(Position, Vec<OpenOrder>)> {
        let position = self.exchange.get_position(&self.market_address).await?;
        let orders = self.exchange.get_open_orders(&self.token_id).await?;
        Ok((position, orders))
    }

    /// Position minus target. Zero unless the last refresh succeeded.
    pub fn skew(&self) -> f64 {
        match (self.fresh, self.position) {
            (true, Some(p)) => p.size - self.target_position,
            _ => 0.0,
        }
    }

    pub fn position(&self) -> Option<Position> {
        self.position
    }

    pub fn open_orders(&self) -> &[OpenOrder] {
        &self.open_orders
    }

    pub fn secs_since_sync(&self) -> Option<u64> {
        self.last_sync.map(|t| t.elapsed().as_secs())
    }
}
