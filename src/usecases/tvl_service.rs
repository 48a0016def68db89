//! TVL Service Use Case - The Valuation Pipeline
//!
//! Reader and price fetcher run concurrently; the calculator runs only
//! once both succeed. The whole run is bounded by a time budget so a
//! hung node or price API turns into a "timed out" reply instead of a
//! silent stall.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use tracing::{info, instrument};

use crate::config::registry::Deployment;
use crate::domain::asset::Asset;
use crate::domain::error::{with_timeout, TvlError};
use crate::domain::valuation::{compute_tvl, TvlReport};
use crate::ports::chain_client::ChainReader;
use crate::ports::price_index::PriceIndex;

use super::holdings_reader::HoldingsReader;
use super::price_fetcher::PriceFetcher;

/// Anything that can produce a fresh TVL report.
#[async_trait]
pub trait TvlCalculator: Send + Sync + 'static {
  /// Run one full valuation.
  async fn calculate(&self) -> Result<TvlReport, TvlError>;
}

/// Holdings reader + price fetcher + valuation over a fixed deployment.
pub struct TvlService<C: ChainReader, P: PriceIndex> {
  reader: HoldingsReader<C>,
  prices: PriceFetcher<P>,
  deployment: Deployment,
  /// Budget for one full run.
  budget: Duration,
}

impl<C: ChainReader, P: PriceIndex> TvlService<C, P> {
  pub fn new(
    reader: HoldingsReader<C>,
    prices: PriceFetcher<P>,
    deployment: Deployment,
    budget: Duration,
  ) -> Self {
    Self {
      reader,
      prices,
      deployment,
      budget,
    }
  }

  /// Every asset referenced by a portfolio, each once, in first-seen order.
  fn referenced_assets(&self) -> Result<Vec<&Asset>, TvlError> {
    let mut assets: Vec<&Asset> = Vec::new();
    for symbol in self.deployment.portfolios.iter().flat_map(|p| p.asset_symbols()) {
      if assets.iter().any(|a| a.symbol == symbol) {
        continue;
      }
      let asset = self
        .deployment
        .assets
        .get(symbol)
        .ok_or_else(|| TvlError::InvalidConfiguration(format!("unknown asset {symbol}")))?;
      assets.push(asset);
    }
    Ok(assets)
  }

  async fn run(&self) -> Result<TvlReport, TvlError> {
    let assets = self.referenced_assets()?;

    let holdings_fut = try_join_all(
      self
        .deployment
        .portfolios
        .iter()
        .map(|portfolio| self.reader.read_portfolio(portfolio, &self.deployment.assets)),
    );
    let prices_fut = self.prices.get_prices(&assets);

    let (holdings, prices) = tokio::try_join!(holdings_fut, prices_fut)?;

    Ok(compute_tvl(&holdings, &prices))
  }
}

#[async_trait]
impl<C: ChainReader, P: PriceIndex> TvlCalculator for TvlService<C, P> {
  #[instrument(skip(self), fields(portfolios = self.deployment.portfolios.len()))]
  async fn calculate(&self) -> Result<TvlReport, TvlError> {
    let report = with_timeout("TVL calculation", self.budget, self.run()).await?;

    info!(
      total_usd = report.total,
      subtotals = report.subtotals.len(),
      "TVL calculated"
    );
    Ok(report)
  }
}
