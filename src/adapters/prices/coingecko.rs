//! CoinGecko Price Index - `PriceIndex` over the public REST API
//!
//! Two endpoints: `/simple/price` for the native coin by id and
//! `/simple/token_price/{platform}` for token contracts. Any non-2xx
//! status, transport error or malformed body fails the request as a
//! unit; absent keys are reported as "no price".

use std::collections::HashMap;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::PriceConfig;
use crate::domain::error::TvlError;
use crate::domain::format::clip;
use crate::ports::price_index::PriceIndex;

/// Optional API key sent as `x-cg-demo-api-key`.
pub const API_KEY_ENV: &str = "COINGECKO_API_KEY";

/// Bytes of an error response body kept in the error detail.
const MAX_ERROR_BODY: usize = 300;

/// `{ "usd": 1.0 }` entry of a simple-price response.
#[derive(Debug, Deserialize)]
struct UsdQuote {
    usd: Option<f64>,
}

/// Parse a `/simple/price` body and extract the USD price for `id`.
pub fn parse_id_price(body: &str, id: &str) -> Result<Option<f64>, TvlError> {
    let quotes: HashMap<String, UsdQuote> = serde_json::from_str(body)
        .map_err(|e| TvlError::connectivity("price index: malformed response body", e))?;
    Ok(quotes.get(id).and_then(|q| q.usd))
}

/// Parse a `/simple/token_price` body into prices keyed by address.
///
/// Keys are matched case-insensitively; unparseable keys are skipped.
pub fn parse_token_prices(body: &str) -> Result<HashMap<Address, f64>, TvlError> {
    let quotes: HashMap<String, UsdQuote> = serde_json::from_str(body)
        .map_err(|e| TvlError::connectivity("price index: malformed response body", e))?;

    let mut prices = HashMap::with_capacity(quotes.len());
    for (key, quote) in quotes {
        match (key.to_ascii_lowercase().parse::<Address>(), quote.usd) {
            (Ok(address), Some(usd)) => {
                prices.insert(address, usd);
            }
            (Err(_), _) => warn!(key = %key, "Ignoring non-address key in token price response"),
            (Ok(_), None) => {}
        }
    }
    Ok(prices)
}

/// HTTP client for CoinGecko's simple-price API.
pub struct CoinGeckoClient {
    /// Underlying HTTP client (carries the request timeout).
    http: Client,
    /// API base URL, no trailing slash.
    base_url: String,
    /// Platform id for token lookups (e.g. "ethereum").
    platform: String,
    /// Optional demo/pro API key.
    api_key: Option<String>,
    /// Request timeout, reported in timeout errors.
    timeout: Duration,
}

impl CoinGeckoClient {
    /// Create a client from config, reading the API key from the environment.
    pub fn new(config: &PriceConfig) -> anyhow::Result<Self> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let http = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(5)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            platform: config.platform.clone(),
            api_key: std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()),
            timeout,
        })
    }

    /// GET `path` with `query` and return the body of a 2xx response.
    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<String, TvlError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.get(&url).query(query);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TvlError::timeout(format!("price index GET {path}"), self.timeout)
            } else {
                TvlError::connectivity(format!("price index GET {path}"), e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TvlError::connectivity(
                format!("price index GET {path}"),
                format!("HTTP {status}: {}", clip(body.trim(), MAX_ERROR_BODY)),
            ));
        }

        response
            .text()
            .await
            .map_err(|e| TvlError::connectivity(format!("price index GET {path}"), e))
    }
}

#[async_trait]
impl PriceIndex for CoinGeckoClient {
    #[instrument(skip(self))]
    async fn price_by_id(&self, asset_id: &str) -> Result<Option<f64>, TvlError> {
        let body = self
            .get("/simple/price", &[("ids", asset_id), ("vs_currencies", "usd")])
            .await?;
        let price = parse_id_price(&body, asset_id)?;
        debug!(asset_id, ?price, "Fetched price by id");
        Ok(price)
    }

    #[instrument(skip(self), fields(count = addresses.len()))]
    async fn prices_by_address(
        &self,
        addresses: &[Address],
    ) -> Result<HashMap<Address, f64>, TvlError> {
        let joined = addresses
            .iter()
            .map(|a| format!("{a:#x}"))
            .collect::<Vec<_>>()
            .join(",");
        let path = format!("/simple/token_price/{}", self.platform);

        let body = self
            .get(&path, &[("contract_addresses", joined.as_str()), ("vs_currencies", "usd")])
            .await?;
        let prices = parse_token_prices(&body)?;
        debug!(listed = prices.len(), "Fetched token prices");
        Ok(prices)
    }
}
