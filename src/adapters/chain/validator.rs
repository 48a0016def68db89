//! Contract Validator: On-chain Verification at Startup
//!
//! Validates that configured token and vault addresses point to
//! deployed contracts. An address without code (an EOA or a typo)
//! is an invalid configuration and aborts startup instead of
//! surfacing later as a zero balance or an empty event history.

use std::sync::Arc;

use alloy::primitives::Address;
use alloy::providers::Provider;
use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::config::registry::Deployment;

/// Result of validating a single contract.
#[derive(Debug)]
pub struct ValidationResult {
    /// Asset symbol or portfolio name.
    pub name: String,
    /// Address that was validated.
    pub address: Address,
    /// Whether the contract has deployed code.
    pub has_code: bool,
}

/// Validates contract addresses against on-chain state.
pub struct ContractValidator {
    /// Alloy provider for on-chain queries.
    provider: Arc<dyn Provider + Send + Sync>,
}

impl ContractValidator {
    /// Create a new validator with the given provider.
    pub fn new(provider: Arc<dyn Provider + Send + Sync>) -> Self {
        Self { provider }
    }

    /// Validate every contract the deployment calls.
    ///
    /// Returns an error if any address has no deployed code.
    #[instrument(skip_all)]
    pub async fn validate_all(&self, deployment: &Deployment) -> Result<Vec<ValidationResult>> {
        let mut results = Vec::new();

        for (name, address) in deployment.contracts() {
            let code = self
                .provider
                .get_code_at(address)
                .await
                .with_context(|| format!("Failed to query code for {name}"))?;

            let result = ValidationResult {
                name,
                address,
                has_code: !code.is_empty(),
            };

            if result.has_code {
                info!(contract = %result.name, address = %address, "Contract validated: code exists on-chain");
            } else {
                warn!(contract = %result.name, address = %address, "Contract has no code, possible misconfiguration");
            }

            results.push(result);
        }

        if let Some(missing) = results.iter().find(|r| !r.has_code) {
            anyhow::bail!(
                "{} at {} has no deployed code, check config.toml",
                missing.name,
                missing.address
            );
        }

        info!(validated = results.len(), "All contract validations complete");
        Ok(results)
    }
}
