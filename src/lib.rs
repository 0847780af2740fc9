//! Two-sided market maker for a single binary-outcome CLOB token.
//!
//! Library crate used by the binary entry point and the unit tests.

pub mod config;
pub mod exchange;
pub mod maker;
