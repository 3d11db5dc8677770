//! stratify: client for a trading-strategy design and backtesting platform.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`].

pub mod adapters;
#[cfg(feature = "http")]
pub mod cli;
pub mod domain;
pub mod logging;
pub mod ports;
