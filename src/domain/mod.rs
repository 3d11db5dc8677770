//! Core domain types and logic.

pub mod candle;
pub mod chart;
pub mod combobox;
pub mod config;
pub mod config_validation;
pub mod error;
pub mod execution;
pub mod explore;
pub mod format;
pub mod indicator;
pub mod order_condition;
pub mod polling;
pub mod routes;
pub mod session;
pub mod strategy;
pub mod timezone;
pub mod user;
pub mod wire;
pub mod workspace;
