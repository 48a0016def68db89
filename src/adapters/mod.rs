//! Adapters Layer - Hexagonal Architecture Outer Ring
//!
//! Implements the port traits defined in `crate::ports` with concrete
//! external dependencies (HTTP clients, WebSockets, blockchain RPC).
//! Each sub-module groups adapters by infrastructure concern.
//!
//! Adapter categories:
//! - `chain`: EVM RPC reads via alloy-rs
//! - `discord`: Gateway intake and REST replies
//! - `metrics`: Prometheus metrics export and health checks
//! - `prices`: CoinGecko USD price index

pub mod chain;
pub mod discord;
pub mod metrics;
pub mod prices;
