//! Vaults and the named sub-portfolios a TVL report is broken into.

use alloy::primitives::Address;

/// An address holding one or more assets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vault {
    /// Display label used in logs.
    pub label: String,
    /// On-chain address whose balances are read.
    pub address: Address,
}

/// First block replayed for event-sourced portfolios.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartBlock {
    /// Block 0.
    Genesis,
    /// A fixed block, typically the contract's deploy block.
    Fixed(u64),
    /// Current head minus N blocks.
    Lookback(u64),
}

impl StartBlock {
    /// Resolve against the current chain head.
    pub const fn resolve(self, head: u64) -> u64 {
        match self {
            Self::Genesis => 0,
            Self::Fixed(block) => block,
            Self::Lookback(blocks) => head.saturating_sub(blocks),
        }
    }
}

/// How a portfolio's holdings are discovered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HoldingsSource {
    /// Current balances of `assets` held by each vault.
    Balances {
        vaults: Vec<Vault>,
        /// Asset symbols looked up in the registry.
        assets: Vec<String>,
    },
    /// Net Deposit/Withdraw events replayed from `start` to head.
    Events {
        contract: Address,
        /// Symbol of the deposited asset.
        asset: String,
        start: StartBlock,
    },
}

/// A named grouping whose USD value is reported as one subtotal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Portfolio {
    pub name: String,
    pub source: HoldingsSource,
}

impl Portfolio {
    /// Asset symbols this portfolio needs priced.
    pub fn asset_symbols(&self) -> Vec<&str> {
        match &self.source {
            HoldingsSource::Balances { assets, .. } => assets.iter().map(String::as_str).collect(),
            HoldingsSource::Events { asset, .. } => vec![asset.as_str()],
        }
    }

    /// Whether holdings come from replayed events.
    pub const fn is_event_sourced(&self) -> bool {
        matches!(self.source, HoldingsSource::Events { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookback_saturates_at_genesis() {
        assert_eq!(StartBlock::Lookback(500).resolve(100), 0);
        assert_eq!(StartBlock::Lookback(50).resolve(100), 50);
        assert_eq!(StartBlock::Fixed(42).resolve(100), 42);
        assert_eq!(StartBlock::Genesis.resolve(100), 0);
    }

    #[test]
    fn test_asset_symbols_per_source() {
        let balances = Portfolio {
            name: "Treasury".into(),
            source: HoldingsSource::Balances {
                vaults: vec![],
                assets: vec!["ETH".into(), "USDC".into()],
            },
        };
        assert_eq!(balances.asset_symbols(), vec!["ETH", "USDC"]);
        assert!(!balances.is_event_sourced());

        let events = Portfolio {
            name: "Vault".into(),
            source: HoldingsSource::Events {
                contract: Address::ZERO,
                asset: "ETH".into(),
                start: StartBlock::Genesis,
            },
        };
        assert_eq!(events.asset_symbols(), vec!["ETH"]);
        assert!(events.is_event_sourced());
    }
}
