//! Price Index Port - Spot USD Prices
//!
//! Two query shapes: by well-known asset id (the native coin) and by
//! token contract address. A missing key means "no price", never zero.

use std::collections::HashMap;

use alloy::primitives::Address;
use async_trait::async_trait;

use crate::domain::error::TvlError;

/// Trait for public price APIs.
#[async_trait]
pub trait PriceIndex: Send + Sync + 'static {
  /// USD price for a well-known asset id (e.g. `ethereum`).
  ///
  /// `Ok(None)` when the index returned no listing for the id.
  async fn price_by_id(&self, asset_id: &str) -> Result<Option<f64>, TvlError>;

  /// USD prices for token contracts, in one request.
  ///
  /// Addresses without a listing are absent from the returned map.
  async fn prices_by_address(
    &self,
    addresses: &[Address],
  ) -> Result<HashMap<Address, f64>, TvlError>;
}
