//! Price Fetcher Use Case - Fail-fast USD Pricing
//!
//! Prices every requested asset in one pass: the native coin by its
//! well-known id, tokens by contract address in a single batched
//! query. Either every asset gets a quote or the whole fetch fails;
//! a partially populated book never reaches the calculator.

use std::collections::HashMap;
use std::sync::Arc;

use alloy::primitives::Address;
use tracing::{debug, instrument, warn};

use crate::domain::asset::{Asset, AssetKind};
use crate::domain::error::TvlError;
use crate::domain::valuation::{PriceBook, PriceQuote};
use crate::ports::price_index::PriceIndex;

/// Fetches spot prices for registry assets.
pub struct PriceFetcher<P: PriceIndex> {
  index: Arc<P>,
  /// Well-known id of the native coin (e.g. "ethereum").
  native_asset_id: String,
}

impl<P: PriceIndex> PriceFetcher<P> {
  /// Create a fetcher pricing the native coin under `native_asset_id`.
  pub fn new(index: Arc<P>, native_asset_id: impl Into<String>) -> Self {
    Self {
      index,
      native_asset_id: native_asset_id.into(),
    }
  }

  /// Price every asset or fail.
  ///
  /// Unlisted assets fall back to 1.0 USD only when opted in via
  /// `stable_fallback`; otherwise the fetch fails with `MissingPrice`.
  #[instrument(skip_all, fields(assets = assets.len()))]
  pub async fn get_prices(&self, assets: &[&Asset]) -> Result<PriceBook, TvlError> {
    let needs_native = assets.iter().any(|a| a.kind == AssetKind::Native);

    let mut addresses: Vec<Address> = assets.iter().filter_map(|a| a.address()).collect();
    addresses.sort();
    addresses.dedup();

    let native_fut = async {
      if needs_native {
        self.index.price_by_id(&self.native_asset_id).await
      } else {
        Ok(None)
      }
    };
    let tokens_fut = async {
      if addresses.is_empty() {
        Ok(HashMap::new())
      } else {
        self.index.prices_by_address(&addresses).await
      }
    };

    let (native_price, token_prices) = tokio::try_join!(native_fut, tokens_fut)?;

    let mut book = PriceBook::new();
    for asset in assets {
      let listed = match asset.kind {
        AssetKind::Native => native_price,
        AssetKind::Erc20(address) => token_prices.get(&address).copied(),
      };

      let quote = match listed {
        Some(usd) => PriceQuote::index(&asset.symbol, usd),
        None if asset.stable_fallback => {
          warn!(asset = %asset.symbol, "No price listing, using 1.0 USD stable default");
          PriceQuote::stable_default(&asset.symbol)
        }
        None => {
          return Err(TvlError::MissingPrice {
            symbol: asset.symbol.clone(),
          });
        }
      };

      debug!(asset = %asset.symbol, usd = quote.usd, "Priced asset");
      book.insert(quote);
    }

    Ok(book)
  }
}
