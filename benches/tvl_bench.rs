//! TVL Pipeline Benchmarks: Per-command CPU Cost
//!
//! Benchmarks the pure parts of a `?tvl` run: event replay over a
//! long history, valuation, and currency rendering.
//!
//! Run with: cargo bench --bench tvl_bench

use alloy::primitives::{Address, U256};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

use vault_tvl_bot::domain::{
    compute_tvl, format_abbreviated, format_usd, DepositWithdrawLedger, PortfolioHoldings, PriceBook, PriceQuote,
    VaultEvent, VaultEventKind,
};
use vault_tvl_bot::usecases::holdings_reader::chunk_ranges;

/// 100k events over 1,000 depositors, one withdrawal in four.
fn history() -> Vec<VaultEvent> {
    (0..100_000u64)
        .map(|i| {
            let mut user = [0u8; 20];
            user[18..].copy_from_slice(&((i % 1_000) as u16).to_be_bytes());
            VaultEvent {
                emitter: Address::ZERO,
                user: Address::from(user),
                kind: if i % 4 == 3 {
                    VaultEventKind::Withdraw
                } else {
                    VaultEventKind::Deposit
                },
                amount: U256::from(1_000_000_000_000_000_000u64),
                block_number: i,
                log_index: 0,
            }
        })
        .collect()
}

fn bench_replay(c: &mut Criterion) {
    let events = history();

    c.bench_function("ledger_replay_100k", |b| {
        b.iter(|| DepositWithdrawLedger::replay(black_box(&events)).locked_total());
    });
}

fn bench_chunking(c: &mut Criterion) {
    c.bench_function("chunk_ranges_20m_blocks", |b| {
        b.iter(|| chunk_ranges(black_box(0), black_box(20_000_000), black_box(50_000)));
    });
}

fn bench_valuation(c: &mut Criterion) {
    let holdings: Vec<PortfolioHoldings> = (0..8)
        .map(|i| {
            PortfolioHoldings::new(format!("portfolio-{i}"))
                .with("ETH", 1_234.5)
                .with("USDC", 2_000_000.0)
                .with("WBTC", 12.25)
        })
        .collect();
    let prices: PriceBook = [
        PriceQuote::index("ETH", 3_100.0),
        PriceQuote::index("USDC", 1.0),
        PriceQuote::index("WBTC", 64_000.0),
    ]
    .into_iter()
    .collect();

    c.bench_function("compute_tvl_8_portfolios", |b| {
        b.iter(|| compute_tvl(black_box(&holdings), black_box(&prices)));
    });
}

fn bench_format(c: &mut Criterion) {
    c.bench_function("format_usd_and_abbreviated", |b| {
        b.iter(|| {
            let v = black_box(2_340_567.891);
            (format_usd(v), format_abbreviated(v))
        });
    });
}

criterion_group!(benches, bench_replay, bench_chunking, bench_valuation, bench_format);
criterion_main!(benches);
