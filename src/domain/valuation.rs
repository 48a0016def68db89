//! USD valuation of portfolio holdings.
//!
//! Quantities and prices are `f64`: this is a reporting tool, not a
//! settlement system, and double precision keeps totals in the billions
//! accurate to the cent.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};

/// Where a price came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceOrigin {
    /// Listed by the price index.
    Index,
    /// Unlisted asset opted into the 1.0 USD default.
    StableDefault,
}

/// Spot USD price of one asset at fetch time.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceQuote {
    pub symbol: String,
    pub usd: f64,
    pub origin: PriceOrigin,
}

impl PriceQuote {
    pub fn index(symbol: impl Into<String>, usd: f64) -> Self {
        Self {
            symbol: symbol.into(),
            usd,
            origin: PriceOrigin::Index,
        }
    }

    pub fn stable_default(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            usd: 1.0,
            origin: PriceOrigin::StableDefault,
        }
    }
}

/// Prices keyed by asset symbol.
#[derive(Debug, Clone, Default)]
pub struct PriceBook {
    quotes: HashMap<String, PriceQuote>,
}

impl PriceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, quote: PriceQuote) {
        self.quotes.insert(quote.symbol.clone(), quote);
    }

    pub fn get(&self, symbol: &str) -> Option<&PriceQuote> {
        self.quotes.get(symbol)
    }

    pub fn len(&self) -> usize {
        self.quotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quotes.is_empty()
    }
}

impl FromIterator<PriceQuote> for PriceBook {
    fn from_iter<I: IntoIterator<Item = PriceQuote>>(iter: I) -> Self {
        let mut book = Self::new();
        for quote in iter {
            book.insert(quote);
        }
        book
    }
}

/// Decimal quantities held by one portfolio, keyed by asset symbol.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PortfolioHoldings {
    pub portfolio: String,
    pub quantities: BTreeMap<String, f64>,
}

impl PortfolioHoldings {
    pub fn new(portfolio: impl Into<String>) -> Self {
        Self {
            portfolio: portfolio.into(),
            quantities: BTreeMap::new(),
        }
    }

    /// Add `quantity` of `symbol`, accumulating across vaults.
    pub fn add(&mut self, symbol: &str, quantity: f64) {
        *self.quantities.entry(symbol.to_string()).or_insert(0.0) += quantity;
    }

    #[must_use]
    pub fn with(mut self, symbol: &str, quantity: f64) -> Self {
        self.add(symbol, quantity);
        self
    }
}

/// USD value of one asset position inside a subtotal.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetValue {
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub usd: f64,
}

/// USD value of one named portfolio.
#[derive(Debug, Clone, PartialEq)]
pub struct Subtotal {
    pub name: String,
    pub usd: f64,
    pub breakdown: Vec<AssetValue>,
}

/// Result of one TVL computation.
#[derive(Debug, Clone, PartialEq)]
pub struct TvlReport {
    pub subtotals: Vec<Subtotal>,
    pub total: f64,
    pub computed_at: DateTime<Utc>,
}

/// Value every portfolio and sum the subtotals.
///
/// The price fetcher guarantees a quote for every symbol it was asked
/// for, so a symbol absent from `prices` can only come from a caller
/// that skipped it; such positions are valued at zero.
pub fn compute_tvl(holdings: &[PortfolioHoldings], prices: &PriceBook) -> TvlReport {
    let subtotals: Vec<Subtotal> = holdings
        .iter()
        .map(|portfolio| {
            let breakdown: Vec<AssetValue> = portfolio
                .quantities
                .iter()
                .map(|(symbol, &quantity)| {
                    let price = prices.get(symbol).map_or(0.0, |q| q.usd);
                    AssetValue {
                        symbol: symbol.clone(),
                        quantity,
                        price,
                        usd: quantity * price,
                    }
                })
                .collect();

            Subtotal {
                name: portfolio.portfolio.clone(),
                usd: breakdown.iter().map(|v| v.usd).sum(),
                breakdown,
            }
        })
        .collect();

    let total = subtotals.iter().map(|s| s.usd).sum();

    TvlReport {
        subtotals,
        total,
        computed_at: Utc::now(),
    }
}
