//! RPC Chain Reader - `ChainReader` over alloy-rs
//!
//! Encodes ERC-20 reads with `sol!` bindings and sends them as raw
//! `eth_call`s through the shared provider; decodes Deposit/Withdraw
//! logs into typed `VaultEvent`s. Every call is bounded by the
//! configured request timeout.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log, TransactionRequest};
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::domain::error::{with_timeout, TvlError};
use crate::domain::ledger::{VaultEvent, VaultEventKind};
use crate::ports::chain_client::ChainReader;

use super::provider::EvmProvider;

sol! {
    #[allow(missing_docs)]
    interface IErc20 {
        function balanceOf(address account) external view returns (uint256);
        function decimals() external view returns (uint8);
    }

    #[allow(missing_docs)]
    event Deposit(address indexed user, uint256 amount);

    #[allow(missing_docs)]
    event Withdraw(address indexed user, uint256 amount);
}

/// `ChainReader` backed by the shared EVM provider.
pub struct RpcChainReader {
    /// Shared RPC provider.
    provider: Arc<EvmProvider>,
    /// Per-call timeout.
    timeout: Duration,
}

impl RpcChainReader {
    pub fn new(provider: Arc<EvmProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Raw `eth_call` against `to` with `calldata`.
    async fn call(&self, operation: &str, to: Address, calldata: Vec<u8>) -> Result<Bytes, TvlError> {
        let inner = self.provider.inner();
        let request = TransactionRequest::default()
            .to(to)
            .input(Bytes::from(calldata).into());

        with_timeout(operation, self.timeout, async {
            inner
                .call(&request)
                .await
                .map_err(|e| TvlError::connectivity(operation, e))
        })
        .await
    }
}

/// Decode a raw log into a `VaultEvent`, or `None` for foreign topics.
pub fn decode_vault_event(log: &Log) -> Option<Result<VaultEvent, TvlError>> {
    let topic = *log.topic0()?;
    let kind = if topic == Deposit::SIGNATURE_HASH {
        VaultEventKind::Deposit
    } else if topic == Withdraw::SIGNATURE_HASH {
        VaultEventKind::Withdraw
    } else {
        return None;
    };

    let decoded = match kind {
        VaultEventKind::Deposit => log
            .log_decode::<Deposit>()
            .map(|l| (l.inner.address, l.inner.data.user, l.inner.data.amount)),
        VaultEventKind::Withdraw => log
            .log_decode::<Withdraw>()
            .map(|l| (l.inner.address, l.inner.data.user, l.inner.data.amount)),
    };

    Some(
        decoded
            .map(|(emitter, user, amount)| VaultEvent {
                emitter,
                user,
                kind,
                amount,
                block_number: log.block_number.unwrap_or_default(),
                log_index: log.log_index.unwrap_or_default(),
            })
            .map_err(|e| TvlError::connectivity("decode vault log", e)),
    )
}

#[async_trait]
impl ChainReader for RpcChainReader {
    #[instrument(skip(self))]
    async fn block_number(&self) -> Result<u64, TvlError> {
        let inner = self.provider.inner();
        with_timeout("eth_blockNumber", self.timeout, async {
            inner
                .get_block_number()
                .await
                .map_err(|e| TvlError::connectivity("eth_blockNumber", e))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn native_balance(&self, holder: Address) -> Result<U256, TvlError> {
        let inner = self.provider.inner();
        with_timeout("eth_getBalance", self.timeout, async {
            inner
                .get_balance(holder)
                .await
                .map_err(|e| TvlError::connectivity(format!("eth_getBalance {holder}"), e))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn erc20_balance(&self, token: Address, holder: Address) -> Result<U256, TvlError> {
        let calldata = IErc20::balanceOfCall { account: holder }.abi_encode();
        let raw = self.call("balanceOf", token, calldata).await?;

        IErc20::balanceOfCall::abi_decode_returns(&raw, true)
            .map(|ret| ret._0)
            .map_err(|e| TvlError::connectivity(format!("balanceOf on {token}"), e))
    }

    #[instrument(skip(self))]
    async fn erc20_decimals(&self, token: Address) -> Result<u8, TvlError> {
        let calldata = IErc20::decimalsCall {}.abi_encode();
        let raw = self.call("decimals", token, calldata).await?;

        IErc20::decimalsCall::abi_decode_returns(&raw, true)
            .map(|ret| ret._0)
            .map_err(|e| TvlError::connectivity(format!("decimals on {token}"), e))
    }

    #[instrument(skip(self))]
    async fn vault_events(
        &self,
        contract: Address,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<VaultEvent>, TvlError> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(vec![Deposit::SIGNATURE_HASH, Withdraw::SIGNATURE_HASH])
            .from_block(from_block)
            .to_block(to_block);

        let operation = format!("eth_getLogs {from_block}..={to_block}");
        let inner = self.provider.inner();
        let logs = with_timeout(&operation, self.timeout, async {
            inner
                .get_logs(&filter)
                .await
                .map_err(|e| TvlError::connectivity(operation.as_str(), e))
        })
        .await?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            match decode_vault_event(log) {
                Some(event) => events.push(event?),
                None => warn!(tx = ?log.transaction_hash, "Skipping log with unexpected topic"),
            }
        }

        debug!(logs = logs.len(), events = events.len(), "Decoded vault logs");
        Ok(events)
    }

    async fn is_healthy(&self) -> bool {
        let check = async { Ok::<_, TvlError>(self.provider.is_healthy().await) };
        with_timeout("health eth_blockNumber", self.timeout, check)
            .await
            .unwrap_or(false)
    }
}
