//! Price Index Adapters - Spot USD Prices over HTTP
//!
//! - `coingecko`: CoinGecko simple-price API (native id + token address)

pub mod coingecko;

pub use coingecko::CoinGeckoClient;
