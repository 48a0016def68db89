//! Metrics and Monitoring Adapters
//!
//! Prometheus metrics plus /live, /ready and /metrics endpoints served
//! by axum 0.7 on the health port.

pub mod health;
pub mod prometheus;

pub use health::{refresh_chain_health, HealthServer, HealthState};
pub use prometheus::MetricsRegistry;
