//! Port traits at the seams between domain and adapters.

pub mod api_port;
pub mod chart_port;
pub mod config_port;
pub mod navigation_port;
pub mod notify_port;
