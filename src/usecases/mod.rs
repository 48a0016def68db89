//! Use Cases Layer - Application Business Logic
//!
//! Orchestrates domain logic with port interfaces to implement the
//! bot's single workflow: answer a TVL command.
//!
//! Use cases:
//! - `HoldingsReader`: Vault balances and chunked event replay
//! - `PriceFetcher`: Fail-fast USD pricing with opt-in stable defaults
//! - `TvlService`: Concurrent read + price, then valuation, under a budget
//! - `TvlCommand`: Placeholder, calculation, and reply delivery

pub mod holdings_reader;
pub mod price_fetcher;
pub mod tvl_command;
pub mod tvl_service;
