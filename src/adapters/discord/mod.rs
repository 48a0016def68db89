//! Discord Adapters - Chat Platform Boundary
//!
//! - `gateway`: WebSocket session, heartbeats and `?tvl` intake
//! - `rest`: Message create/edit (`ChatResponder`) with rate limiting
//! - `auth`: Bot token from the environment
//! - `types`: Gateway and REST wire types

pub mod auth;
pub mod gateway;
pub mod rest;
pub mod types;

pub use auth::DiscordAuth;
pub use gateway::{CommandMatcher, DiscordGateway, InvocationHandler};
pub use rest::DiscordRest;
