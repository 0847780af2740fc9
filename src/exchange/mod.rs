//! CLOB Exchange Layer
//!
//! Capability trait, wire types and the REST client for the venue.

pub mod auth;
pub mod error;
pub mod rest;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod mock;

pub use auth::ClobAuth;
pub use error::{ExchangeError, ExchangeResult};
pub use rest::ClobRestClient;
pub use traits::Exchange;
pub use types::*;
