//! Ports Layer - Hexagonal Architecture Boundaries
//!
//! Defines the interfaces (traits) that the use-case layer requires
//! from the outside world. Adapters implement these traits; tests
//! substitute mockall mocks or in-memory fakes.
//!
//! Port categories:
//! - `ChainReader`: Node JSON-RPC reads (balances, decimals, event logs)
//! - `PriceIndex`: Spot USD prices from a public price API
//! - `ChatResponder`: Posting and editing chat channel messages

pub mod chain_client;
pub mod price_index;
pub mod responder;
