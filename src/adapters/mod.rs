//! Concrete adapter implementations for ports.

pub mod console;
pub mod file_config_adapter;
pub mod headless_chart;
#[cfg(feature = "http")]
pub mod http_api;
pub mod trades_table;
