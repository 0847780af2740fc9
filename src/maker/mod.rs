//! Quoting and reconciliation engine for one outcome token.

pub mod engine;
pub mod order_manager;
pub mod predictor;
pub mod quote;
pub mod rebalance;
pub mod state;

pub use engine::{EngineStats, MakerError, MarketMaker, TickReport};
pub use order_manager::{OrderManager, ReconcileOutcome};
pub use predictor::{HttpSpreadPredictor, MarketSnapshot, SpreadPredictor, WidthProvider};
pub use quote::{QuotePlan, SideParams};
pub use rebalance::Rebalancer;
pub use state::StateTracker;
