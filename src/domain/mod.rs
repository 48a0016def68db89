//! Domain layer - Core valuation logic and models.
//!
//! Pure logic for valuing vault holdings in USD: the asset registry,
//! portfolio definitions, deposit/withdraw ledger replay, valuation and
//! currency formatting. No I/O lives here (hexagonal inner ring).

pub mod asset;
pub mod error;
pub mod format;
pub mod ledger;
pub mod portfolio;
pub mod valuation;

// Re-export core types for convenience
pub use asset::{Asset, AssetKind, AssetRegistry};
pub use error::TvlError;
pub use format::{clip, format_abbreviated, format_usd};
pub use ledger::{DepositWithdrawLedger, VaultEvent, VaultEventKind};
pub use portfolio::{HoldingsSource, Portfolio, StartBlock, Vault};
pub use valuation::{compute_tvl, PortfolioHoldings, PriceBook, PriceQuote, TvlReport};
