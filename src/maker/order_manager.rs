//! Order Lifecycle Manager
//!
//! Keeps at most one resting quote per side. A reconcile cancels whatever
//! rests for the token, then posts the new pair around a freshly read
//! midpoint. The widths and sizes that made it onto the book are remembered
//! per side so an unchanged plan can skip the cancel/replace cycle.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::quote::{QuotePlan, SideParams};
use crate::config::ReconcilePolicy;
use crate::exchange::{Exchange, ExchangeError, ExchangeResult, OpenOrder, OrderId, Quote, Side, TimeInForce};

/// Widths closer than this count as unchanged
pub const WIDTH_TOLERANCE: f64 = 0.0001;
/// Sizes closer than this count as unchanged
pub const SIZE_TOLERANCE: f64 = 0.01;

/// Parameters of the last quote set that reached the book, per side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LastApplied {
    pub buy: Option<SideParams>,
    pub sell: Option<SideParams>,
}

impl LastApplied {
    fn get(&self, side: Side) -> Option<SideParams> {
        match side {
            Side::Buy => self.buy,
            Side::Sell => self.sell,
        }
    }

    fn set(&mut self, side: Side, params: Option<SideParams>) {
        match side {
            Side::Buy => self.buy = params,
            Side::Sell => self.sell = params,
        }
    }

    /// True if either side is missing or moved beyond tolerance.
    pub fn differs_from(&self, plan: &QuotePlan) -> bool {
        [Side::Buy, Side::Sell].iter().any(|&side| match self.get(side) {
            None => true,
            Some(last) => {
                let want = plan.side(side);
                (want.width - last.width).abs() > WIDTH_TOLERANCE
                    || (want.size - last.size).abs() > SIZE_TOLERANCE
            }
        })
    }
}

/// Orders this manager believes are resting, one slot per side
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActiveOrders {
    pub buy: Option<OrderId>,
    pub sell: Option<OrderId>,
}

impl ActiveOrders {
    fn set(&mut self, side: Side, id: OrderId) {
        match side {
            Side::Buy => self.buy = Some(id),
            Side::Sell => self.sell = Some(id),
        }
    }

    fn ids(&self) -> impl Iterator<Item = &OrderId> {
        self.buy.iter().chain(self.sell.iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReconcileOutcome {
    /// Plan matched the last applied quotes; nothing sent
    Skipped,
    Applied {
        midpoint: f64,
        placed: Vec<Quote>,
        /// Sides the exchange refused or that failed in transit
        unplaced: Vec<Side>,
    },
}

pub struct OrderManager {
    exchange: Arc<dyn Exchange>,
    token_id: String,
    tick_size: f64,
    policy: ReconcilePolicy,
    last_applied: LastApplied,
    active: ActiveOrders,
}

impl OrderManager {
    pub fn new(exchange: Arc<dyn Exchange>, token_id: String, tick_size: f64, policy: ReconcilePolicy) -> Self {
        Self {
            exchange,
            token_id,
            tick_size,
            policy,
            last_applied: LastApplied::default(),
            active: ActiveOrders::default(),
        }
    }

    pub fn needs_update(&self, plan: &QuotePlan) -> bool {
        match self.policy {
            ReconcilePolicy::Always => true,
            ReconcilePolicy::OnChange => self.last_applied.differs_from(plan),
        }
    }

    /// Bring the book in line with `plan`.
    ///
    /// `resting` is the latest exchange view of the token's orders; it backs
    /// up the bulk cancel if that fails. An error is returned only when the
    /// midpoint cannot be read, after the old quotes were already pulled.
    pub async fn reconcile(&mut self, plan: &QuotePlan, resting: &[OpenOrder]) -> ExchangeResult<ReconcileOutcome> {
        if !self.needs_update(plan) {
            debug!("[ORDERS] Quotes unchanged, keeping resting orders");
            return Ok(ReconcileOutcome::Skipped);
        }

        self.cancel_all(resting).await;

        let midpoint = self.exchange.get_midpoint(&self.token_id).await?;
        let mut placed = Vec::with_capacity(2);
        let mut unplaced = Vec::new();

        for quote in plan.quotes(midpoint, self.tick_size) {
            match self.submit(quote).await {
                Ok(_) => {
                    self.last_applied.set(quote.side, Some(plan.side(quote.side)));
                    placed.push(quote);
                }
                Err(_) => unplaced.push(quote.side),
            }
        }

        info!("[ORDERS] mid {:.4} | placed {} | unplaced {:?}", midpoint, placed.len(), unplaced);
        Ok(ReconcileOutcome::Applied {
            midpoint,
            placed,
            unplaced,
        })
    }

    /// Submit one GTC order and track it in its side's slot.
    ///
    /// Failures are logged here; callers only decide what to remember.
    pub async fn submit(&mut self, quote: Quote) -> ExchangeResult<OrderId> {
        let result = self
            .exchange
            .create_and_submit_order(&self.token_id, quote.price, quote.size, quote.side, TimeInForce::GTC)
            .await;

        match result {
            Ok(id) => {
                info!("[ORDERS] {} {:.2} @ {:.4} -> {}", quote.side, quote.size, quote.price, id);
                self.active.set(quote.side, id.clone());
                Ok(id)
            }
            Err(e @ ExchangeError::OrderRejected(_)) => {
                warn!("[ORDERS] {} {:.2} @ {:.4} rejected: {}", quote.side, quote.size, quote.price, e);
                Err(e)
            }
            Err(e) => {
                warn!("[ORDERS] {} {:.2} @ {:.4} failed ({}): {}", quote.side, quote.size, quote.price, e.kind(), e);
                Err(e)
            }
        }
    }

    /// Best-effort cancel of everything resting for the token.
    ///
    /// The bulk cancel is tried first; if it fails each known order id is
    /// cancelled individually. Failures are logged and never block the
    /// caller. Afterwards the active set and the last-applied snapshot are
    /// empty.
    pub async fn cancel_all(&mut self, resting: &[OpenOrder]) {
        match self.exchange.cancel_all_orders(&self.token_id).await {
            Ok(()) => debug!("[ORDERS] Cancelled all orders for {}", self.token_id),
            Err(e) => {
                warn!("[ORDERS] Bulk cancel failed ({}), cancelling individually", e);
                let mut seen = HashSet::new();
                let ids: Vec<OrderId> = resting
                    .iter()
                    .map(|o| &o.order_id)
                    .chain(self.active.ids())
                    .filter(|id| seen.insert((*id).clone()))
                    .cloned()
                    .collect();
                for id in ids {
                    if let Err(e) = self.exchange.cancel_order(&id).await {
                        warn!("[ORDERS] Cancel {} failed, may still rest: {}", id, e);
                    }
                }
            }
        }
        self.active = ActiveOrders::default();
        self.last_applied = LastApplied::default();
    }

    /// Forget the last applied quotes so the next reconcile always posts.
    pub fn invalidate(&mut self) {
        self.last_applied = LastApplied::default();
    }

    pub fn last_applied(&self) -> &LastApplied {
        &self.last_applied
    }

    pub fn active(&self) -> &ActiveOrders {
        &self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MakerConfig;
    use crate::exchange::mock::MockExchange;
    use crate::maker::quote;

    fn manager(mock: &Arc<MockExchange>, policy: ReconcilePolicy) -> OrderManager {
        OrderManager::new(mock.clone(), "token".into(), 0.01, policy)
    }

    fn plan(skew: f64) -> QuotePlan {
        quote::calculate(&MakerConfig::new("0xmarket", "token", 1.0), skew, None)
    }

    #[tokio::test]
    async fn test_identical_plans_reconcile_once() {
        let mock = Arc::new(MockExchange::new(0.5, 0.0));
        let mut om = manager(&mock, ReconcilePolicy::OnChange);

        let first = om.reconcile(&plan(0.0), &[]).await.unwrap();
        let second = om.reconcile(&plan(0.0), &mock.book()).await.unwrap();

        assert!(matches!(first, ReconcileOutcome::Applied { .. }));
        assert_eq!(second, ReconcileOutcome::Skipped);
        mock.with_calls(|c| {
            assert_eq!(c.cancel_all, 1);
            assert_eq!(c.submit, 2);
            assert_eq!(c.midpoint, 1);
        });
        assert_eq!(mock.book().len(), 2);
    }

    #[tokio::test]
    async fn test_always_policy_replaces_every_time() {
        let mock = Arc::new(MockExchange::new(0.5, 0.0));
        let mut om = manager(&mock, ReconcilePolicy::Always);

        om.reconcile(&plan(0.0), &[]).await.unwrap();
        om.reconcile(&plan(0.0), &mock.book()).await.unwrap();

        mock.with_calls(|c| {
            assert_eq!(c.cancel_all, 2);
            assert_eq!(c.submit, 4);
        });
        assert_eq!(mock.book().len(), 2);
    }

    #[tokio::test]
    async fn test_placed_prices_use_fresh_midpoint() {
        let mock = Arc::new(MockExchange::new(0.5, 0.0));
        let mut om = manager(&mock, ReconcilePolicy::OnChange);

        let outcome = om.reconcile(&plan(0.0), &[]).await.unwrap();
        let ReconcileOutcome::Applied { midpoint, placed, unplaced } = outcome else {
            panic!("expected quotes to be applied");
        };
        assert_eq!(midpoint, 0.5);
        assert!(unplaced.is_empty());
        assert!((placed[0].price - 0.45).abs() < 1e-9);
        assert!((placed[1].price - 0.55).abs() < 1e-9);
        assert!(om.active().buy.is_some() && om.active().sell.is_some());
    }

    #[tokio::test]
    async fn test_rejected_side_is_retried_next_time() {
        let mock = Arc::new(MockExchange::new(0.5, 0.0));
        let mut om = manager(&mock, ReconcilePolicy::OnChange);
        mock.reject_side(Some(Side::Sell));

        let outcome = om.reconcile(&plan(0.0), &[]).await.unwrap();
        assert!(matches!(&outcome, ReconcileOutcome::Applied { unplaced, .. } if unplaced == &vec![Side::Sell]));
        assert!(om.last_applied().buy.is_some());
        assert!(om.last_applied().sell.is_none());
        assert!(om.active().sell.is_none());

        mock.reject_side(None);
        assert!(om.needs_update(&plan(0.0)));
        om.reconcile(&plan(0.0), &mock.book()).await.unwrap();
        assert!(om.last_applied().sell.is_some());
        mock.with_calls(|c| assert_eq!(c.submit, 4));
    }

    #[tokio::test]
    async fn test_failed_bulk_cancel_falls_back_and_still_places() {
        let mock = Arc::new(MockExchange::new(0.5, 0.0));
        let mut om = manager(&mock, ReconcilePolicy::OnChange);
        om.reconcile(&plan(0.0), &[]).await.unwrap();

        mock.fail_cancel_all(Some("connection reset"));
        let resting = mock.book();
        om.reconcile(&plan(40.0), &resting).await.unwrap();

        mock.with_calls(|c| {
            assert_eq!(c.cancel_all, 2);
            // one per previously resting order, duplicates from the active set skipped
            assert_eq!(c.cancel, 2);
            assert_eq!(c.submit, 4);
        });
        assert_eq!(mock.book().len(), 2);
    }

    #[test]
    fn test_size_change_within_tolerance_is_ignored() {
        let mut last = LastApplied::default();
        let p = plan(0.0);
        last.set(Side::Buy, Some(p.buy));
        last.set(Side::Sell, Some(p.sell));
        assert!(!last.differs_from(&p));

        let mut nudged = p;
        nudged.buy.width += WIDTH_TOLERANCE / 2.0;
        nudged.sell.size += SIZE_TOLERANCE / 2.0;
        assert!(!last.differs_from(&nudged));

        nudged.sell.size += SIZE_TOLERANCE;
        assert!(last.differs_from(&nudged));
    }

    #[tokio::test]
    async fn test_invalidate_forces_requote() {
        let mock = Arc::new(MockExchange::new(0.5, 0.0));
        let mut om = manager(&mock, ReconcilePolicy::OnChange);
        om.reconcile(&plan(0.0), &[]).await.unwrap();
        assert!(!om.needs_update(&plan(0.0)));
        om.invalidate();
        assert!(om.needs_update(&plan(0.0)));
    }
}
