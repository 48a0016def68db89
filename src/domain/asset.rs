//! Asset registry: the fixed set of tokens a deployment values.

use std::collections::BTreeMap;

use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, U256};

/// Decimals assumed for the chain's native coin.
pub const NATIVE_DECIMALS: u8 = 18;

/// Where an asset lives on-chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// The chain's base coin, read with `eth_getBalance`.
    Native,
    /// An ERC-20 token contract.
    Erc20(Address),
}

/// A fungible asset the bot knows how to value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Human-readable symbol, unique within the registry.
    pub symbol: String,
    /// Native coin or token contract.
    pub kind: AssetKind,
    /// Decimal precision. `None` means read `decimals()` on-chain.
    pub decimals: Option<u8>,
    /// Price at 1.0 USD when the index has no listing.
    pub stable_fallback: bool,
}

impl Asset {
    /// Native coin with the standard 18 decimals.
    pub fn native(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: AssetKind::Native,
            decimals: Some(NATIVE_DECIMALS),
            stable_fallback: false,
        }
    }

    /// ERC-20 token with optional fixed decimals.
    pub fn erc20(symbol: impl Into<String>, address: Address, decimals: Option<u8>) -> Self {
        Self {
            symbol: symbol.into(),
            kind: AssetKind::Erc20(address),
            decimals,
            stable_fallback: false,
        }
    }

    /// Opt this asset into the 1.0 USD default.
    #[must_use]
    pub const fn with_stable_fallback(mut self) -> Self {
        self.stable_fallback = true;
        self
    }

    /// Token contract address, if any.
    pub const fn address(&self) -> Option<Address> {
        match self.kind {
            AssetKind::Native => None,
            AssetKind::Erc20(address) => Some(address),
        }
    }
}

/// Symbol-keyed lookup of every configured asset.
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    assets: BTreeMap<String, Asset>,
}

impl AssetRegistry {
    /// Build a registry. Returns the duplicated symbol on conflict.
    pub fn new(assets: impl IntoIterator<Item = Asset>) -> Result<Self, String> {
        let mut map = BTreeMap::new();
        for asset in assets {
            if map.contains_key(&asset.symbol) {
                return Err(asset.symbol);
            }
            map.insert(asset.symbol.clone(), asset);
        }
        Ok(Self { assets: map })
    }

    /// Look up an asset by symbol.
    pub fn get(&self, symbol: &str) -> Option<&Asset> {
        self.assets.get(symbol)
    }

    /// Iterate over all assets in symbol order.
    pub fn iter(&self) -> impl Iterator<Item = &Asset> {
        self.assets.values()
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Convert a raw integer amount into a decimal quantity.
///
/// Goes through the exact decimal string so amounts wider than `u128`
/// never truncate. Returns `None` for precisions alloy cannot scale.
pub fn from_token_units(raw: U256, decimals: u8) -> Option<f64> {
    format_units(raw, decimals).ok()?.parse().ok()
}
