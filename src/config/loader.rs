//! Configuration Loader - File Loading and Validation
//!
//! Handles loading `config.toml`, applying environment overrides,
//! validating all parameters, and providing clear error messages
//! for misconfiguration. Any error here is fatal at startup.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use super::{AppConfig, PortfolioSourceConfig};

/// Overrides `chain.rpc_url`.
pub const RPC_URL_ENV: &str = "RPC_URL";
/// Fills event portfolios that omit `contract`.
pub const CONTRACT_ADDRESS_ENV: &str = "CONTRACT_ADDRESS";

/// Load, override and validate configuration from a TOML file.
///
/// # Arguments
/// * `path` - Path to the config.toml file
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: &str) -> Result<AppConfig> {
  let path = Path::new(path);

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let mut config: AppConfig = toml::from_str(&content)
    .with_context(|| "Failed to parse config.toml")?;

  apply_env_overrides(&mut config, |key| std::env::var(key).ok());
  validate_config(&config)?;

  info!(
    assets = config.assets.len(),
    portfolios = config.portfolios.len(),
    chunk_size = config.chain.log_chunk_size,
    "Configuration loaded successfully"
  );

  Ok(config)
}

/// Parse and validate configuration text without consulting the environment.
pub fn parse_config(content: &str) -> Result<AppConfig> {
  let config: AppConfig = toml::from_str(content)
    .with_context(|| "Failed to parse configuration")?;
  validate_config(&config)?;
  Ok(config)
}

/// Apply `RPC_URL` and `CONTRACT_ADDRESS` from `lookup`.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
  F: Fn(&str) -> Option<String>,
{
  if let Some(url) = lookup(RPC_URL_ENV).filter(|v| !v.is_empty()) {
    config.chain.rpc_url = url;
  }

  if let Some(address) = lookup(CONTRACT_ADDRESS_ENV).filter(|v| !v.is_empty()) {
    for portfolio in &mut config.portfolios {
      if let PortfolioSourceConfig::Events { contract, .. } = &mut portfolio.source {
        if contract.is_none() {
          *contract = Some(address.clone());
        }
      }
    }
  }
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Non-empty endpoints and command names
/// - Positive chunk size and timeouts
/// - Unique asset symbols, each identified by exactly one of native/address
/// - Portfolios referencing known assets, with a source that can be read
pub fn validate_config(config: &AppConfig) -> Result<()> {
  // Bot validation
  anyhow::ensure!(
    !config.bot.command_name.trim().is_empty(),
    "bot.command_name must not be empty"
  );
  anyhow::ensure!(
    config.bot.command_timeout_secs > 0,
    "bot.command_timeout_secs must be positive"
  );

  // Chain validation
  anyhow::ensure!(
    !config.chain.rpc_url.is_empty(),
    "chain.rpc_url must be set (or provide {RPC_URL_ENV})"
  );
  anyhow::ensure!(
    config.chain.log_chunk_size > 0,
    "chain.log_chunk_size must be positive"
  );
  anyhow::ensure!(
    config.chain.request_timeout_secs > 0,
    "chain.request_timeout_secs must be positive"
  );

  // Price / Discord validation
  anyhow::ensure!(
    !config.prices.base_url.is_empty(),
    "prices.base_url must not be empty"
  );
  anyhow::ensure!(
    config.prices.timeout_secs > 0,
    "prices.timeout_secs must be positive"
  );
  anyhow::ensure!(
    config.discord.max_requests_per_second > 0,
    "discord.max_requests_per_second must be positive"
  );

  // Asset validation
  anyhow::ensure!(
    !config.assets.is_empty(),
    "At least one asset must be configured"
  );

  let mut symbols = HashSet::new();
  for (i, asset) in config.assets.iter().enumerate() {
    anyhow::ensure!(
      !asset.symbol.is_empty(),
      "Asset {} has empty symbol",
      i
    );
    anyhow::ensure!(
      symbols.insert(asset.symbol.as_str()),
      "Asset symbol {} is configured twice",
      asset.symbol
    );
    anyhow::ensure!(
      asset.native != asset.address.is_some(),
      "Asset {} must set exactly one of native = true or address",
      asset.symbol
    );
  }

  anyhow::ensure!(
    config.assets.iter().filter(|a| a.native).count() <= 1,
    "At most one native asset may be configured"
  );

  // Portfolio validation
  anyhow::ensure!(
    !config.portfolios.is_empty(),
    "At least one portfolio must be configured"
  );

  for portfolio in &config.portfolios {
    anyhow::ensure!(
      !portfolio.name.is_empty(),
      "Portfolio name must not be empty"
    );

    match &portfolio.source {
      PortfolioSourceConfig::Balances { vaults, assets } => {
        anyhow::ensure!(
          !vaults.is_empty(),
          "Portfolio {} has no vaults",
          portfolio.name
        );
        anyhow::ensure!(
          !assets.is_empty(),
          "Portfolio {} has no assets",
          portfolio.name
        );
        for symbol in assets {
          anyhow::ensure!(
            symbols.contains(symbol.as_str()),
            "Portfolio {} references unknown asset {}",
            portfolio.name,
            symbol
          );
        }
      }
      PortfolioSourceConfig::Events {
        contract,
        asset,
        start_block,
        lookback_blocks,
      } => {
        anyhow::ensure!(
          contract.as_deref().is_some_and(|c| !c.is_empty()),
          "Portfolio {} has no contract (set it or provide {CONTRACT_ADDRESS_ENV})",
          portfolio.name
        );
        anyhow::ensure!(
          symbols.contains(asset.as_str()),
          "Portfolio {} references unknown asset {}",
          portfolio.name,
          asset
        );
        anyhow::ensure!(
          start_block.is_none() || lookback_blocks.is_none(),
          "Portfolio {} sets both start_block and lookback_blocks",
          portfolio.name
        );
      }
    }
  }

  Ok(())
}
