//! In-memory exchange double for tests.
//!
//! Holds a midpoint, a position and a resting book; records every call so
//! tests can assert on cancel/submit counts. Failures are injected per
//! operation.

use async_trait::async_trait;
use std::sync::Mutex;
use tokio::time::Instant;

use super::error::{ExchangeError, ExchangeResult};
use super::traits::Exchange;
use super::types::{OpenOrder, OrderId, Position, Side, TimeInForce};

#[derive(Debug, Clone, PartialEq)]
pub struct Submitted {
    pub side: Side,
    pub price: f64,
    pub size: f64,
}

#[derive(Debug, Default)]
pub struct Calls {
    pub midpoint: usize,
    pub open_orders: usize,
    pub position: usize,
    pub submit: usize,
    pub cancel: usize,
    pub cancel_all: usize,
    /// Clock readings per call, for timing assertions under a paused clock
    pub position_at: Vec<Instant>,
    pub submit_at: Vec<Instant>,
}

#[derive(Default)]
struct Failures {
    position: Option<String>,
    open_orders: Option<String>,
    cancel_all: Option<String>,
    reject_side: Option<Side>,
}

pub struct MockExchange {
    midpoint: Mutex<f64>,
    position: Mutex<f64>,
    book: Mutex<Vec<OpenOrder>>,
    submitted: Mutex<Vec<Submitted>>,
    calls: Mutex<Calls>,
    failures: Mutex<Failures>,
    next_id: Mutex<u64>,
}

impl MockExchange {
    pub fn new(midpoint: f64, position: f64) -> Self {
        Self {
            midpoint: Mutex::new(midpoint),
            position: Mutex::new(position),
            book: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            calls: Mutex::new(Calls::default()),
            failures: Mutex::new(Failures::default()),
            next_id: Mutex::new(0),
        }
    }

    pub fn set_midpoint(&self, mid: f64) {
        *self.midpoint.lock().unwrap() = mid;
    }

    pub fn set_position(&self, size: f64) {
        *self.position.lock().unwrap() = size;
    }

    pub fn fail_position(&self, msg: Option<&str>) {
        self.failures.lock().unwrap().position = msg.map(str::to_string);
    }

    pub fn fail_open_orders(&self, msg: Option<&str>) {
        self.failures.lock().unwrap().open_orders = msg.map(str::to_string);
    }

    pub fn fail_cancel_all(&self, msg: Option<&str>) {
        self.failures.lock().unwrap().cancel_all = msg.map(str::to_string);
    }

    /// Reject every submission on this side.
    pub fn reject_side(&self, side: Option<Side>) {
        self.failures.lock().unwrap().reject_side = side;
    }

    pub fn submitted(&self) -> Vec<Submitted> {
        self.submitted.lock().unwrap().clone()
    }

    pub fn book(&self) -> Vec<OpenOrder> {
        self.book.lock().unwrap().clone()
    }

    pub fn with_calls<R>(&self, f: impl FnOnce(&Calls) -> R) -> R {
        f(&self.calls.lock().unwrap())
    }

    pub fn reset_calls(&self) {
        *self.calls.lock().unwrap() = Calls::default();
        self.submitted.lock().unwrap().clear();
    }
}

#[async_trait]
impl Exchange for MockExchange {
    fn name(&self) -> &str {
        "mock"
    }

    async fn get_midpoint(&self, _token_id: &str) -> ExchangeResult<f64> {
        self.calls.lock().unwrap().midpoint += 1;
        Ok(*self.midpoint.lock().unwrap())
    }

    async fn get_open_orders(&self, _token_id: &str) -> ExchangeResult<Vec<OpenOrder>> {
        self.calls.lock().unwrap().open_orders += 1;
        if let Some(msg) = self.failures.lock().unwrap().open_orders.clone() {
            return Err(ExchangeError::Network(msg));
        }
        Ok(self.book.lock().unwrap().clone())
    }

    async fn get_position(&self, _market_address: &str) -> ExchangeResult<Position> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.position += 1;
            calls.position_at.push(Instant::now());
        }
        if let Some(msg) = self.failures.lock().unwrap().position.clone() {
            return Err(ExchangeError::PositionQuery(msg));
        }
        Ok(Position {
            size: *self.position.lock().unwrap(),
        })
    }

    async fn create_and_submit_order(
        &self,
        _token_id: &str,
        price: f64,
        size: f64,
        side: Side,
        _time_in_force: TimeInForce,
    ) -> ExchangeResult<OrderId> {
        {
            let mut calls = self.calls.lock().unwrap();
            calls.submit += 1;
            calls.submit_at.push(Instant::now());
        }
        if self.failures.lock().unwrap().reject_side == Some(side) {
            return Err(ExchangeError::OrderRejected("insufficient balance".into()));
        }

        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            OrderId(format!("mock-{}", *next))
        };
        self.submitted.lock().unwrap().push(Submitted { side, price, size });
        self.book.lock().unwrap().push(OpenOrder {
            order_id: id.clone(),
            side,
            price,
            size,
        });
        Ok(id)
    }

    async fn cancel_order(&self, order_id: &OrderId) -> ExchangeResult<()> {
        self.calls.lock().unwrap().cancel += 1;
        self.book.lock().unwrap().retain(|o| &o.order_id != order_id);
        Ok(())
    }

    async fn cancel_all_orders(&self, _token_id: &str) -> ExchangeResult<()> {
        self.calls.lock().unwrap().cancel_all += 1;
        if let Some(msg) = self.failures.lock().unwrap().cancel_all.clone() {
            return Err(ExchangeError::Network(msg));
        }
        self.book.lock().unwrap().clear();
        Ok(())
    }
}
