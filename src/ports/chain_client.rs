//! Chain Reader Port - Read-only Node Access
//!
//! Defines the trait the holdings reader uses to query an EVM node.
//! Every method is a read; nothing here signs or submits transactions.

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::domain::error::TvlError;
use crate::domain::ledger::VaultEvent;

/// Trait for read-only EVM node access.
///
/// Implementations must be cheap to share across concurrent command
/// invocations; no method mutates shared state.
#[async_trait]
pub trait ChainReader: Send + Sync + 'static {
  /// Current chain head (`eth_blockNumber`).
  async fn block_number(&self) -> Result<u64, TvlError>;

  /// Native coin balance of `holder` in wei (`eth_getBalance`).
  async fn native_balance(&self, holder: Address) -> Result<U256, TvlError>;

  /// ERC-20 `balanceOf(holder)` in the token's smallest unit.
  async fn erc20_balance(&self, token: Address, holder: Address) -> Result<U256, TvlError>;

  /// ERC-20 `decimals()`.
  async fn erc20_decimals(&self, token: Address) -> Result<u8, TvlError>;

  /// Deposit and Withdraw events emitted by `contract` in the inclusive
  /// block range `[from_block, to_block]`.
  ///
  /// Callers are responsible for keeping the range within the node's
  /// per-query limit.
  async fn vault_events(
    &self,
    contract: Address,
    from_block: u64,
    to_block: u64,
  ) -> Result<Vec<VaultEvent>, TvlError>;

  /// Check if the node connection is healthy.
  async fn is_healthy(&self) -> bool;
}
