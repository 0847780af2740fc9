//! Exchange error kinds.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExchangeError {
    /// Connectivity failure or a 5xx answer. Retried on the next tick.
    #[error("Network error: {0}")]
    Network(String),

    /// The venue refused a submission (bad price/size, insufficient balance).
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Position query failed: {0}")]
    PositionQuery(String),

    /// A response was missing a required field or had the wrong shape.
    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Auth error: {0}")]
    Auth(String),
}

impl ExchangeError {
    /// Worth retrying unchanged next tick. Rejections and signing failures repeat.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ExchangeError::OrderRejected(_) | ExchangeError::Auth(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::Network(_) => "network",
            ExchangeError::OrderRejected(_) => "order_rejected",
            ExchangeError::PositionQuery(_) => "position_query",
            ExchangeError::Malformed(_) => "malformed",
            ExchangeError::Auth(_) => "auth",
        }
    }
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ExchangeError::Malformed(e.to_string())
        } else {
            ExchangeError::Network(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(e: serde_json::Error) -> Self {
        ExchangeError::Malformed(e.to_string())
    }
}

pub type ExchangeResult<T> = Result<T, ExchangeError>;
