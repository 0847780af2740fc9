//! Control Loop
//!
//! One engine per market. Each iteration runs
//! fetch state -> check skew -> (rebalance + settle) -> check changed ->
//! (reconcile | no-op), then sleeps. Iteration errors are logged and the
//! loop carries on; only cancellation ends it.

use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};

use super::order_manager::{OrderManager, ReconcileOutcome};
use super::predictor::{MarketSnapshot, WidthProvider};
use super::quote::{self, skew_ratio};
use super::rebalance::Rebalancer;
use super::state::StateTracker;
use crate::config::MakerConfig;
use crate::exchange::{Exchange, ExchangeError, ExchangeResult};

/// Why an engine could not be built.
#[derive(Debug, Error)]
pub enum MakerError {
    #[error("Invalid maker config: {0}")]
    Config(String),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),
}

/// Counters kept for the lifetime of one engine.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    pub iterations: u64,
    pub failed_iterations: u64,
    pub rebalances: u64,
    pub reconciles: u64,
    pub skipped_reconciles: u64,
}

/// What one iteration did.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// Skew the quotes were computed from
    pub skew: f64,
    pub rebalanced: bool,
    pub outcome: ReconcileOutcome,
}

pub struct MarketMaker {
    config: MakerConfig,
    exchange: Arc<dyn Exchange>,
    state: StateTracker,
    orders: OrderManager,
    rebalancer: Rebalancer,
    widths: WidthProvider,
    cancel: CancellationToken,
    stats: EngineStats,
}

impl MarketMaker {
    /// Validate the config, build an engine and perform the first state fetch.
    pub async fn create(
        config: MakerConfig,
        exchange: Arc<dyn Exchange>,
        widths: WidthProvider,
    ) -> Result<Self, MakerError> {
        config.validate().map_err(|e| MakerError::Config(format!("{e:#}")))?;

        let state = StateTracker::new(
            exchange.clone(),
            config.market_address.clone(),
            config.token_id.clone(),
            config.target_position,
        );
        let orders = OrderManager::new(
            exchange.clone(),
            config.token_id.clone(),
            config.tick_size,
            config.reconcile_policy,
        );
        let rebalancer = Rebalancer::new(exchange.clone(), &config);

        let mut maker = Self {
            config,
            exchange,
            state,
            orders,
            rebalancer,
            widths,
            cancel: CancellationToken::new(),
            stats: EngineStats::default(),
        };
        maker.state.refresh().await?;

        info!("[INIT] {} ready on {} | widths: {:?} | policy: {:?} | skew {:.2}",
              maker.config.token_id, maker.exchange.name(), maker.widths,
              maker.config.reconcile_policy, maker.state.skew());
        Ok(maker)
    }

    /// Token that stops `run` at its next iteration boundary.
    pub fn cancel_handle(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn config(&self) -> &MakerConfig {
        &self.config
    }

    /// Loop until cancelled. A slow iteration just delays the next sleep.
    pub async fn run(&mut self) {
        let span = info_span!("maker", token = %self.config.token_id);
        async {
            info!("[LOOP] Started, interval {:?}", self.config.interval());
            loop {
                if self.cancel.is_cancelled() {
                    break;
                }

                self.stats.iterations += 1;
                match self.tick().await {
                    Ok(report) => match report.outcome {
                        ReconcileOutcome::Skipped => self.stats.skipped_reconciles += 1,
                        ReconcileOutcome::Applied { .. } => self.stats.reconciles += 1,
                    },
                    Err(e) => {
                        self.stats.failed_iterations += 1;
                        if e.is_transient() {
                            warn!("[LOOP] Iteration {} aborted ({}): {}", self.stats.iterations, e.kind(), e);
                        } else {
                            error!("[LOOP] Iteration {} aborted ({}): {}", self.stats.iterations, e.kind(), e);
                        }
                    }
                }

                if self.config.stats_every > 0 && self.stats.iterations % self.config.stats_every == 0 {
                    self.log_stats();
                }

                tokio::select! {
                    _ = tokio::time::sleep(self.config.interval()) => {}
                    _ = self.cancel.cancelled() => break,
                }
            }

            if self.config.cancel_on_shutdown {
                self.orders.cancel_all(self.state.open_orders()).await;
            }
            info!("[LOOP] Stopped after {} iterations", self.stats.iterations);
            self.log_stats();
        }
        .instrument(span)
        .await
    }

    /// One pass of the state machine.
    pub async fn tick(&mut self) -> ExchangeResult<TickReport> {
        self.state.refresh().await?;
        let mut skew = self.state.skew();
        let mut rebalanced = false;

        if self.rebalancer.should_rebalance(skew) {
            warn!("[REBAL] Position skew {:.2} beyond {:.2}",
                  skew, self.config.rebalance_threshold());
            self.stats.rebalances += 1;
            rebalanced = true;

            self.orders.cancel_all(self.state.open_orders()).await;
            if self.rebalancer.execute(skew, &mut self.orders).await?.is_some() {
                tokio::time::sleep(self.config.settle_delay()).await;
            }
            self.state.refresh().await?;
            self.orders.invalidate();
            skew = self.state.skew();
        }

        let predicted = self.predicted_width(skew).await?;
        let plan = quote::calculate(&self.config, skew, predicted);
        let outcome = self.orders.reconcile(&plan, self.state.open_orders()).await?;

        Ok(TickReport {
            skew,
            rebalanced,
            outcome,
        })
    }

    async fn predicted_width(&self, skew: f64) -> ExchangeResult<Option<f64>> {
        if let WidthProvider::Fixed = self.widths {
            return Ok(None);
        }
        let midpoint = self.exchange.get_midpoint(&self.config.token_id).await?;
        let snapshot = MarketSnapshot {
            token_id: self.config.token_id.clone(),
            midpoint,
            position: self.state.position().map(|p| p.size).unwrap_or_default(),
            skew,
            skew_ratio: skew_ratio(&self.config, skew),
        };
        Ok(self.widths.predicted_width(&self.config, &snapshot).await)
    }

    fn log_stats(&self) {
        let s = &self.stats;
        info!("[STATS] iters {} | failed {} | rebalances {} | requotes {} | unchanged {} | last sync {:?}s ago",
              s.iterations, s.failed_iterations, s.rebalances, s.reconciles,
              s.skipped_reconciles, self.state.secs_since_sync());
    }
}
