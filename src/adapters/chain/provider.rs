//! EVM RPC Provider - alloy-rs 0.9 Connection Management
//!
//! Manages the connection to the configured EVM node via alloy-rs.
//! Validates RPC connectivity (and optionally the chain id) at startup
//! and exposes a shared provider instance for all reads.
//!
//! The HTTP transport is boxed before it reaches the provider so the
//! result implements `Provider<BoxTransport>`, the default parameters
//! of `dyn Provider`. Adapters share it type-erased.

use std::sync::Arc;

use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::config::ChainConfig;

/// Shared EVM RPC provider backed by alloy-rs 0.9.
///
/// One instance is created at startup and shared by every command
/// invocation; reads never mutate it.
pub struct EvmProvider {
    /// The alloy HTTP provider (type-erased).
    provider: Arc<dyn Provider + Send + Sync>,
}

impl EvmProvider {
    /// Connect to the RPC endpoint and check the chain id.
    ///
    /// Fails when the URL is malformed, the node is unreachable, or
    /// `expected_chain_id` is set and does not match.
    #[instrument(skip_all)]
    pub async fn connect(config: &ChainConfig) -> Result<Self> {
        let client = RpcClient::new_http(config.rpc_url.parse().context("Invalid RPC URL")?).boxed();
        let provider = ProviderBuilder::new().on_client(client);

        let provider: Arc<dyn Provider + Send + Sync> = Arc::new(provider);

        let chain_id = provider
            .get_chain_id()
            .await
            .context("Failed to query chain ID")?;

        if let Some(expected) = config.expected_chain_id {
            anyhow::ensure!(
                chain_id == expected,
                "Expected chain_id={expected}, node reports {chain_id}"
            );
        }

        info!(chain_id, "Connected to EVM RPC");

        Ok(Self { provider })
    }

    /// Get a shared reference to the alloy provider (type-erased).
    pub fn inner(&self) -> Arc<dyn Provider + Send + Sync> {
        Arc::clone(&self.provider)
    }

    /// Check if the RPC connection is healthy via a lightweight call.
    pub async fn is_healthy(&self) -> bool {
        self.provider.get_block_number().await.is_ok()
    }
}
