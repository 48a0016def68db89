//! Holdings Reader Use Case - Balances and Event Replay
//!
//! Turns a portfolio definition into decimal quantities per asset.
//! Balance-sourced portfolios read `balanceOf` / `eth_getBalance` for
//! every vault; event-sourced portfolios replay Deposit and Withdraw
//! logs from the start block to the current head, fetched in
//! fixed-size block chunks to respect node query limits.

use std::sync::Arc;

use alloy::primitives::{Address, U256};
use futures_util::future::try_join_all;
use tracing::{debug, info, instrument};

use crate::domain::asset::{from_token_units, Asset, AssetKind, AssetRegistry, NATIVE_DECIMALS};
use crate::domain::error::TvlError;
use crate::domain::ledger::{DepositWithdrawLedger, VaultEvent};
use crate::domain::portfolio::{HoldingsSource, Portfolio, StartBlock, Vault};
use crate::domain::valuation::PortfolioHoldings;
use crate::ports::chain_client::ChainReader;

/// Default maximum block span per `eth_getLogs` request.
pub const DEFAULT_CHUNK_SIZE: u64 = 50_000;

/// Split the inclusive range `[from, to]` into inclusive chunks of at
/// most `size` blocks, in ascending order.
///
/// Returns no chunks when `from > to` or `size == 0`.
pub fn chunk_ranges(from: u64, to: u64, size: u64) -> Vec<(u64, u64)> {
  if from > to || size == 0 {
    return Vec::new();
  }

  let mut ranges = Vec::new();
  let mut start = from;
  loop {
    let end = start.saturating_add(size - 1).min(to);
    ranges.push((start, end));
    if end == to {
      break;
    }
    start = end + 1;
  }
  ranges
}

/// Reads current holdings of configured portfolios from the chain.
pub struct HoldingsReader<C: ChainReader> {
  chain: Arc<C>,
  /// Maximum blocks per log query.
  chunk_size: u64,
}

impl<C: ChainReader> HoldingsReader<C> {
  /// Create a reader with the default 50,000-block chunk size.
  pub fn new(chain: Arc<C>) -> Self {
    Self {
      chain,
      chunk_size: DEFAULT_CHUNK_SIZE,
    }
  }

  /// Create a reader with a custom chunk size (clamped to at least 1).
  pub fn with_chunk_size(chain: Arc<C>, chunk_size: u64) -> Self {
    Self {
      chain,
      chunk_size: chunk_size.max(1),
    }
  }

  /// Read one portfolio's holdings as decimal quantities.
  #[instrument(skip(self, registry), fields(portfolio = %portfolio.name))]
  pub async fn read_portfolio(
    &self,
    portfolio: &Portfolio,
    registry: &AssetRegistry,
  ) -> Result<PortfolioHoldings, TvlError> {
    let mut holdings = PortfolioHoldings::new(&portfolio.name);

    match &portfolio.source {
      HoldingsSource::Balances { vaults, assets } => {
        for symbol in assets {
          let asset = lookup(registry, symbol)?;
          let quantity = self.read_balances(asset, vaults).await?;
          holdings.add(symbol, quantity);
        }
      }
      HoldingsSource::Events { contract, asset, start } => {
        let asset = lookup(registry, asset)?;
        let quantity = self.read_net_deposits(*contract, asset, *start).await?;
        holdings.add(&asset.symbol, quantity);
      }
    }

    debug!(assets = holdings.quantities.len(), "Portfolio holdings read");
    Ok(holdings)
  }

  /// Sum one asset's balance across all vaults.
  async fn read_balances(&self, asset: &Asset, vaults: &[Vault]) -> Result<f64, TvlError> {
    let decimals = self.resolve_decimals(asset).await?;

    let raws = try_join_all(vaults.iter().map(|vault| self.raw_balance(asset, vault.address))).await?;

    let mut total = 0.0;
    for (vault, raw) in vaults.iter().zip(raws) {
      let quantity = to_quantity(asset, raw, decimals)?;
      debug!(vault = %vault.label, asset = %asset.symbol, quantity, "Vault balance");
      total += quantity;
    }
    Ok(total)
  }

  async fn raw_balance(&self, asset: &Asset, holder: Address) -> Result<U256, TvlError> {
    match asset.kind {
      AssetKind::Native => self.chain.native_balance(holder).await,
      AssetKind::Erc20(token) => self.chain.erc20_balance(token, holder).await,
    }
  }

  /// Configured decimals, else `decimals()` on-chain (18 for native).
  async fn resolve_decimals(&self, asset: &Asset) -> Result<u8, TvlError> {
    match (asset.decimals, asset.kind) {
      (Some(decimals), _) => Ok(decimals),
      (None, AssetKind::Native) => Ok(NATIVE_DECIMALS),
      (None, AssetKind::Erc20(token)) => self.chain.erc20_decimals(token).await,
    }
  }

  /// Replay Deposit/Withdraw events up to head and value the positive net.
  async fn read_net_deposits(
    &self,
    contract: Address,
    asset: &Asset,
    start: StartBlock,
  ) -> Result<f64, TvlError> {
    let head = self.chain.block_number().await?;
    let from = start.resolve(head);

    let events = self.fetch_events(contract, from, head).await?;
    let ledger = DepositWithdrawLedger::replay(&events);

    let decimals = self.resolve_decimals(asset).await?;
    let quantity = to_quantity(asset, ledger.locked_total(), decimals)?;

    info!(
      contract = %contract,
      from_block = from,
      head,
      events = ledger.events_applied(),
      users = ledger.users(),
      depositors = ledger.positive_positions().count(),
      quantity,
      "Replayed vault events"
    );

    Ok(quantity)
  }

  /// Fetch all vault events in `[from, to]`, chunked, in block order.
  #[instrument(skip(self))]
  pub async fn fetch_events(
    &self,
    contract: Address,
    from: u64,
    to: u64,
  ) -> Result<Vec<VaultEvent>, TvlError> {
    let chunks = chunk_ranges(from, to, self.chunk_size);
    let mut events = Vec::new();

    for (start, end) in &chunks {
      let batch = self.chain.vault_events(contract, *start, *end).await?;
      debug!(start, end, logs = batch.len(), "Fetched log chunk");
      events.extend(batch);
    }

    // Stable sort keeps node order for logs sharing a position.
    events.sort_by_key(|e| (e.block_number, e.log_index));

    debug!(chunks = chunks.len(), events = events.len(), "Event retrieval complete");
    Ok(events)
  }
}

fn lookup<'a>(registry: &'a AssetRegistry, symbol: &str) -> Result<&'a Asset, TvlError> {
  registry
    .get(symbol)
    .ok_or_else(|| TvlError::InvalidConfiguration(format!("unknown asset {symbol}")))
}

fn to_quantity(asset: &Asset, raw: U256, decimals: u8) -> Result<f64, TvlError> {
  from_token_units(raw, decimals).ok_or_else(|| {
    TvlError::connectivity(
      format!("decimals() for {}", asset.symbol),
      format!("unsupported precision {decimals}"),
    )
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_chunk_ranges_cover_range_without_gaps() {
    let ranges = chunk_ranges(0, 120_000, 50_000);
    assert_eq!(ranges, vec![(0, 49_999), (50_000, 99_999), (100_000, 120_000)]);
  }

  #[test]
  fn test_chunk_ranges_single_block_and_exact_fit() {
    assert_eq!(chunk_ranges(7, 7, 10), vec![(7, 7)]);
    assert_eq!(chunk_ranges(0, 9, 5), vec![(0, 4), (5, 9)]);
  }

  #[test]
  fn test_chunk_ranges_empty_cases() {
    assert!(chunk_ranges(10, 5, 100).is_empty());
    assert!(chunk_ranges(0, 5, 0).is_empty());
  }

  #[test]
  fn test_chunk_ranges_near_u64_max() {
    let ranges = chunk_ranges(u64::MAX - 5, u64::MAX, 4);
    assert_eq!(ranges, vec![(u64::MAX - 5, u64::MAX - 2), (u64::MAX - 1, u64::MAX)]);
  }
}
