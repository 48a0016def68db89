//! Typed deployment built from validated configuration.
//!
//! Parses every configured address once so the pipeline only ever sees
//! `Address` values. Failures here are `InvalidConfiguration` and abort
//! startup.

use alloy::primitives::Address;

use crate::domain::asset::{Asset, AssetRegistry};
use crate::domain::error::TvlError;
use crate::domain::portfolio::{HoldingsSource, Portfolio, StartBlock, Vault};

use super::{AppConfig, AssetConfig, PortfolioConfig, PortfolioSourceConfig};

/// Static asset registry plus the portfolios to report.
#[derive(Debug, Clone)]
pub struct Deployment {
  pub assets: AssetRegistry,
  pub portfolios: Vec<Portfolio>,
}

impl Deployment {
  /// Every contract address the bot will call, with a display name.
  pub fn contracts(&self) -> Vec<(String, Address)> {
    let tokens = self
      .assets
      .iter()
      .filter_map(|asset| asset.address().map(|addr| (asset.symbol.clone(), addr)));

    let vaults = self.portfolios.iter().filter_map(|portfolio| match &portfolio.source {
      HoldingsSource::Events { contract, .. } => Some((portfolio.name.clone(), *contract)),
      HoldingsSource::Balances { .. } => None,
    });

    tokens.chain(vaults).collect()
  }
}

/// Convert validated configuration into domain values.
pub fn build(config: &AppConfig) -> Result<Deployment, TvlError> {
  let assets = AssetRegistry::new(config.assets.iter().map(build_asset).collect::<Result<Vec<_>, _>>()?)
    .map_err(|symbol| TvlError::InvalidConfiguration(format!("asset {symbol} is configured twice")))?;

  let portfolios = config
    .portfolios
    .iter()
    .map(|p| build_portfolio(p, &assets))
    .collect::<Result<Vec<_>, _>>()?;

  Ok(Deployment { assets, portfolios })
}

fn build_asset(config: &AssetConfig) -> Result<Asset, TvlError> {
  let asset = match &config.address {
    Some(raw) => {
      let mut asset = Asset::erc20(&config.symbol, parse_address(&config.symbol, raw)?, config.decimals);
      asset.stable_fallback = config.stable_fallback;
      asset
    }
    None if config.native => {
      let mut asset = Asset::native(&config.symbol);
      if let Some(decimals) = config.decimals {
        asset.decimals = Some(decimals);
      }
      asset.stable_fallback = config.stable_fallback;
      asset
    }
    None => {
      return Err(TvlError::InvalidConfiguration(format!(
        "asset {} has neither an address nor native = true",
        config.symbol
      )));
    }
  };
  Ok(asset)
}

fn build_portfolio(config: &PortfolioConfig, assets: &AssetRegistry) -> Result<Portfolio, TvlError> {
  let require_asset = |symbol: &str| {
    assets.get(symbol).map(|_| symbol.to_string()).ok_or_else(|| {
      TvlError::InvalidConfiguration(format!(
        "portfolio {} references unknown asset {symbol}",
        config.name
      ))
    })
  };

  let source = match &config.source {
    PortfolioSourceConfig::Balances { vaults, assets: symbols } => HoldingsSource::Balances {
      vaults: vaults
        .iter()
        .map(|v| {
          Ok(Vault {
            label: v.label.clone(),
            address: parse_address(&v.label, &v.address)?,
          })
        })
        .collect::<Result<Vec<_>, TvlError>>()?,
      assets: symbols
        .iter()
        .map(|s| require_asset(s))
        .collect::<Result<Vec<_>, _>>()?,
    },
    PortfolioSourceConfig::Events {
      contract,
      asset,
      start_block,
      lookback_blocks,
    } => {
      let raw = contract.as_deref().ok_or_else(|| {
        TvlError::InvalidConfiguration(format!("portfolio {} has no contract", config.name))
      })?;
      let start = match (start_block, lookback_blocks) {
        (Some(block), None) => StartBlock::Fixed(*block),
        (None, Some(blocks)) => StartBlock::Lookback(*blocks),
        (None, None) => StartBlock::Genesis,
        (Some(_), Some(_)) => {
          return Err(TvlError::InvalidConfiguration(format!(
            "portfolio {} sets both start_block and lookback_blocks",
            config.name
          )));
        }
      };
      HoldingsSource::Events {
        contract: parse_address(&config.name, raw)?,
        asset: require_asset(asset)?,
        start,
      }
    }
  };

  Ok(Portfolio {
    name: config.name.clone(),
    source,
  })
}

fn parse_address(owner: &str, raw: &str) -> Result<Address, TvlError> {
  raw.trim()
    .parse()
    .map_err(|e| TvlError::InvalidConfiguration(format!("invalid address for {owner}: {raw} ({e})")))
}
