//! Exchange Abstraction Layer
//!
//! The capability surface the maker consumes. The REST client implements it
//! for the live venue; tests substitute an in-memory double.

use async_trait::async_trait;

use super::error::ExchangeResult;
use super::types::{OpenOrder, OrderId, Position, Side, TimeInForce};

/// Core exchange connector trait
///
/// Implementations must be safe to share across engines (`Arc<dyn Exchange>`).
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Exchange name for logging
    fn name(&self) -> &str;

    /// Current midpoint of the token's book
    async fn get_midpoint(&self, token_id: &str) -> ExchangeResult<f64>;

    /// Resting orders for a token
    async fn get_open_orders(&self, token_id: &str) -> ExchangeResult<Vec<OpenOrder>>;

    /// Signed inventory held in a market
    async fn get_position(&self, market_address: &str) -> ExchangeResult<Position>;

    /// Create, sign and submit a limit order
    async fn create_and_submit_order(
        &self,
        token_id: &str,
        price: f64,
        size: f64,
        side: Side,
        time_in_force: TimeInForce,
    ) -> ExchangeResult<OrderId>;

    /// Cancel one order. Idempotent if it is already gone.
    async fn cancel_order(&self, order_id: &OrderId) -> ExchangeResult<()>;

    /// Cancel every resting order for a token. Idempotent.
    async fn cancel_all_orders(&self, token_id: &str) -> ExchangeResult<()>;
}
