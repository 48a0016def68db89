//! Integration Tests - End-to-end TVL Command Testing
//!
//! Tests the interaction between usecases, ports, and mock adapters.
//! Uses mockall for trait mocking and tokio::test for async tests.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{address, Address, U256};
use async_trait::async_trait;
use mockall::mock;
use mockall::predicate::*;

use vault_tvl_bot::config::registry::Deployment;
use vault_tvl_bot::domain::{
    Asset, AssetRegistry, HoldingsSource, Portfolio, StartBlock, TvlError, TvlReport, Vault, VaultEvent,
    VaultEventKind,
};
use vault_tvl_bot::ports::chain_client::ChainReader;
use vault_tvl_bot::ports::price_index::PriceIndex;
use vault_tvl_bot::ports::responder::{ChatResponder, MessageId, Reply};
use vault_tvl_bot::usecases::holdings_reader::HoldingsReader;
use vault_tvl_bot::usecases::price_fetcher::PriceFetcher;
use vault_tvl_bot::usecases::tvl_command::{CommandInvocation, CommandOutcome, Presentation, TvlCommand};
use vault_tvl_bot::usecases::tvl_service::{TvlCalculator, TvlService};

// ---- Mock Definitions ----

mock! {
    pub Chain {}

    #[async_trait]
    impl ChainReader for Chain {
        async fn block_number(&self) -> Result<u64, TvlError>;
        async fn native_balance(&self, holder: Address) -> Result<U256, TvlError>;
        async fn erc20_balance(&self, token: Address, holder: Address) -> Result<U256, TvlError>;
        async fn erc20_decimals(&self, token: Address) -> Result<u8, TvlError>;
        async fn vault_events(
            &self,
            contract: Address,
            from_block: u64,
            to_block: u64,
        ) -> Result<Vec<VaultEvent>, TvlError>;
        async fn is_healthy(&self) -> bool;
    }
}

mock! {
    pub Index {}

    #[async_trait]
    impl PriceIndex for Index {
        async fn price_by_id(&self, asset_id: &str) -> Result<Option<f64>, TvlError>;
        async fn prices_by_address(&self, addresses: &[Address]) -> Result<HashMap<Address, f64>, TvlError>;
    }
}

mock! {
    pub Responder {}

    #[async_trait]
    impl ChatResponder for Responder {
        async fn send(&self, channel: &str, reply: &Reply) -> anyhow::Result<MessageId>;
        async fn edit(&self, channel: &str, message: &str, reply: &Reply) -> anyhow::Result<()>;
    }
}

mock! {
    pub Calculator {}

    #[async_trait]
    impl TvlCalculator for Calculator {
        async fn calculate(&self) -> Result<TvlReport, TvlError>;
    }
}

// ---- In-memory chain with range-aware log queries ----

struct EventChain {
    head: u64,
    events: Vec<VaultEvent>,
    queries: AtomicUsize,
    delay: Duration,
}

impl EventChain {
    fn new(head: u64, events: Vec<VaultEvent>) -> Self {
        Self {
            head,
            events,
            queries: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }
}

#[async_trait]
impl ChainReader for EventChain {
    async fn block_number(&self) -> Result<u64, TvlError> {
        tokio::time::sleep(self.delay).await;
        Ok(self.head)
    }

    async fn native_balance(&self, _holder: Address) -> Result<U256, TvlError> {
        Ok(U256::ZERO)
    }

    async fn erc20_balance(&self, _token: Address, _holder: Address) -> Result<U256, TvlError> {
        Ok(U256::ZERO)
    }

    async fn erc20_decimals(&self, _token: Address) -> Result<u8, TvlError> {
        Ok(18)
    }

    async fn vault_events(&self, contract: Address, from_block: u64, to_block: u64) -> Result<Vec<VaultEvent>, TvlError> {
        self.queries.fetch_add(1, Ordering::Relaxed);
        Ok(self
            .events
            .iter()
            .filter(|e| e.emitter == contract && (from_block..=to_block).contains(&e.block_number))
            .cloned()
            .collect())
    }

    async fn is_healthy(&self) -> bool {
        true
    }
}

// ---- Fixtures ----

const WETH: Address = address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2");
const USDC: Address = address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48");
const VAULT_A: Address = address!("1111111111111111111111111111111111111111");
const VAULT_B: Address = address!("2222222222222222222222222222222222222222");
const STAKING: Address = address!("8bc93498b861fd98277c3b51d240e7e56e48f23c");
const ALICE: Address = address!("00000000000000000000000000000000000000a1");
const BOB: Address = address!("00000000000000000000000000000000000000b0");
const CAROL: Address = address!("00000000000000000000000000000000000000c0");

fn ether(amount: u64) -> U256 {
    U256::from(amount) * U256::from(10u64).pow(U256::from(18))
}

fn event(user: Address, kind: VaultEventKind, amount: u64, block_number: u64) -> VaultEvent {
    VaultEvent {
        emitter: STAKING,
        user,
        kind,
        amount: ether(amount),
        block_number,
        log_index: 0,
    }
}

/// A:+100 -40, B:+10, C:+5 -20. Net positive = 60 + 10.
fn staking_history() -> Vec<VaultEvent> {
    vec![
        event(ALICE, VaultEventKind::Deposit, 100, 12),
        event(BOB, VaultEventKind::Deposit, 10, 30),
        event(CAROL, VaultEventKind::Deposit, 5, 31),
        event(ALICE, VaultEventKind::Withdraw, 40, 55),
        event(CAROL, VaultEventKind::Withdraw, 20, 90),
    ]
}

fn registry(usdc_fallback: bool) -> AssetRegistry {
    let mut usdc = Asset::erc20("USDC", USDC, Some(6));
    if usdc_fallback {
        usdc = usdc.with_stable_fallback();
    }
    AssetRegistry::new([Asset::native("ETH"), Asset::erc20("WETH", WETH, Some(18)), usdc]).unwrap()
}

fn balances_deployment(usdc_fallback: bool) -> Deployment {
    Deployment {
        assets: registry(usdc_fallback),
        portfolios: vec![Portfolio {
            name: "Treasury".into(),
            source: HoldingsSource::Balances {
                vaults: vec![
                    Vault {
                        label: "a".into(),
                        address: VAULT_A,
                    },
                    Vault {
                        label: "b".into(),
                        address: VAULT_B,
                    },
                ],
                assets: vec!["ETH".into(), "USDC".into()],
            },
        }],
    }
}

fn events_deployment(start: StartBlock) -> Deployment {
    Deployment {
        assets: registry(false),
        portfolios: vec![Portfolio {
            name: "Staking".into(),
            source: HoldingsSource::Events {
                contract: STAKING,
                asset: "WETH".into(),
                start,
            },
        }],
    }
}

fn priced_index(eth: f64, tokens: Vec<(Address, f64)>) -> MockIndex {
    let mut index = MockIndex::new();
    index
        .expect_price_by_id()
        .with(eq("ethereum"))
        .returning(move |_| Ok(Some(eth)));
    let map: HashMap<Address, f64> = tokens.into_iter().collect();
    index
        .expect_prices_by_address()
        .returning(move |_| Ok(map.clone()));
    index
}

fn service<C: ChainReader, P: PriceIndex>(
    chain: Arc<C>,
    index: P,
    deployment: Deployment,
    chunk_size: u64,
) -> TvlService<C, P> {
    TvlService::new(
        HoldingsReader::with_chunk_size(chain, chunk_size),
        PriceFetcher::new(Arc::new(index), "ethereum"),
        deployment,
        Duration::from_secs(5),
    )
}

fn presentation(expose: bool) -> Presentation {
    Presentation {
        title: "Vault TVL".into(),
        footer: "Calculated from vault balances".into(),
        expose_error_detail: expose,
    }
}

// ---- Pipeline ----

#[tokio::test]
async fn test_balances_summed_across_vaults() {
    let mut chain = MockChain::new();
    chain
        .expect_native_balance()
        .with(eq(VAULT_A))
        .returning(|_| Ok(ether(2)));
    chain
        .expect_native_balance()
        .with(eq(VAULT_B))
        .returning(|_| Ok(ether(1)));
    chain
        .expect_erc20_balance()
        .returning(|_, _| Ok(U256::from(1_000_000_000u64))); // 1,000 USDC per vault

    let svc = service(
        Arc::new(chain),
        priced_index(2000.0, vec![(USDC, 1.0)]),
        balances_deployment(false),
        1_000,
    );

    let report = svc.calculate().await.unwrap();
    assert_eq!(report.subtotals.len(), 1);
    assert!((report.total - 8_000.0).abs() < 1e-6);
}

#[tokio::test]
async fn test_unconfigured_decimals_read_on_chain() {
    let token = address!("6b175474e89094c44da98b954eedeac495271d0f");

    let mut chain = MockChain::new();
    chain
        .expect_erc20_decimals()
        .with(eq(token))
        .times(1)
        .returning(|_| Ok(8));
    chain
        .expect_erc20_balance()
        .with(eq(token), eq(VAULT_A))
        .times(1)
        .returning(|_, _| Ok(U256::from(150_000_000u64))); // 1.5 at 8 decimals

    let deployment = Deployment {
        assets: AssetRegistry::new([Asset::erc20("WBTC", token, None)]).unwrap(),
        portfolios: vec![Portfolio {
            name: "Reserve".into(),
            source: HoldingsSource::Balances {
                vaults: vec![Vault {
                    label: "a".into(),
                    address: VAULT_A,
                }],
                assets: vec!["WBTC".into()],
            },
        }],
    };

    let svc = service(Arc::new(chain), priced_index(0.0, vec![(token, 2.0)]), deployment, 1_000);

    let report = svc.calculate().await.unwrap();
    assert!((report.total - 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_zero_balances_report_zero() {
    let mut chain = MockChain::new();
    chain.expect_native_balance().returning(|_| Ok(U256::ZERO));
    chain.expect_erc20_balance().returning(|_, _| Ok(U256::ZERO));

    let svc = service(
        Arc::new(chain),
        priced_index(2000.0, vec![(USDC, 1.0)]),
        balances_deployment(false),
        1_000,
    );

    let report = svc.calculate().await.unwrap();
    assert_eq!(report.total, 0.0);
}

#[tokio::test]
async fn test_stable_fallback_prices_unlisted_token_at_one_dollar() {
    let mut chain = MockChain::new();
    chain.expect_native_balance().returning(|_| Ok(U256::ZERO));
    chain
        .expect_erc20_balance()
        .returning(|_, _| Ok(U256::from(250_000_000u64)));

    let svc = service(
        Arc::new(chain),
        priced_index(2000.0, vec![]),
        balances_deployment(true),
        1_000,
    );

    let report = svc.calculate().await.unwrap();
    assert!((report.total - 500.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_unlisted_token_without_fallback_fails() {
    let mut chain = MockChain::new();
    chain.expect_native_balance().returning(|_| Ok(U256::ZERO));
    chain.expect_erc20_balance().returning(|_, _| Ok(U256::ZERO));

    let svc = service(
        Arc::new(chain),
        priced_index(2000.0, vec![]),
        balances_deployment(false),
        1_000,
    );

    assert_eq!(
        svc.calculate().await,
        Err(TvlError::MissingPrice { symbol: "USDC".into() })
    );
}

#[tokio::test]
async fn test_event_replay_counts_only_positive_nets() {
    let chain = Arc::new(EventChain::new(100, staking_history()));
    let svc = service(
        Arc::clone(&chain),
        priced_index(0.0, vec![(WETH, 2000.0)]),
        events_deployment(StartBlock::Genesis),
        50_000,
    );

    let report = svc.calculate().await.unwrap();
    assert!((report.total - 70.0 * 2000.0).abs() < 1e-6);
    assert_eq!(chain.queries.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_chunked_retrieval_matches_single_query() {
    let single = Arc::new(EventChain::new(100, staking_history()));
    let chunked = Arc::new(EventChain::new(100, staking_history()));

    let whole = service(
        Arc::clone(&single),
        priced_index(0.0, vec![(WETH, 2000.0)]),
        events_deployment(StartBlock::Genesis),
        50_000,
    )
    .calculate()
    .await
    .unwrap();
    let pieces = service(
        Arc::clone(&chunked),
        priced_index(0.0, vec![(WETH, 2000.0)]),
        events_deployment(StartBlock::Genesis),
        7,
    )
    .calculate()
    .await
    .unwrap();

    assert_eq!(whole.total, pieces.total);
    // 101 blocks in chunks of 7.
    assert_eq!(chunked.queries.load(Ordering::Relaxed), 15);
}

#[tokio::test]
async fn test_lookback_skips_older_events() {
    // From block 50 only Alice's withdrawal and Carol's withdrawal remain.
    let chain = Arc::new(EventChain::new(100, staking_history()));
    let report = service(
        chain,
        priced_index(0.0, vec![(WETH, 2000.0)]),
        events_deployment(StartBlock::Lookback(50)),
        50_000,
    )
    .calculate()
    .await
    .unwrap();

    assert_eq!(report.total, 0.0);
}

#[tokio::test]
async fn test_pipeline_timeout() {
    let mut chain = EventChain::new(100, staking_history());
    chain.delay = Duration::from_millis(500);

    let svc = TvlService::new(
        HoldingsReader::new(Arc::new(chain)),
        PriceFetcher::new(Arc::new(priced_index(0.0, vec![(WETH, 2000.0)])), "ethereum"),
        events_deployment(StartBlock::Genesis),
        Duration::from_millis(20),
    );

    match svc.calculate().await {
        Err(TvlError::Timeout { after, .. }) => assert_eq!(after, Duration::from_millis(20)),
        other => panic!("expected timeout, got {other:?}"),
    }
}

// ---- Command handling ----

fn is_text(reply: &Reply, prefix: &str) -> bool {
    matches!(reply, Reply::Text(text) if text.starts_with(prefix))
}

#[tokio::test]
async fn test_price_failure_edits_placeholder_with_failure_text() {
    let mut chain = MockChain::new();
    chain.expect_native_balance().returning(|_| Ok(U256::ZERO));
    chain.expect_erc20_balance().returning(|_, _| Ok(U256::ZERO));

    let mut index = MockIndex::new();
    index
        .expect_price_by_id()
        .returning(|_| Err(TvlError::connectivity("GET /simple/price", "HTTP 503")));
    index.expect_prices_by_address().returning(|_| Ok(HashMap::new()));

    let mut responder = MockResponder::new();
    responder
        .expect_send()
        .withf(|channel, reply| channel == "42" && is_text(reply, "Calculating TVL"))
        .times(1)
        .returning(|_, _| Ok("m1".to_string()));
    responder
        .expect_edit()
        .withf(|channel, message, reply| {
            channel == "42"
                && message == "m1"
                && *reply == Reply::text("Unable to calculate TVL at the moment: GET /simple/price: HTTP 503")
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let svc = service(Arc::new(chain), index, balances_deployment(false), 1_000);
    let command = TvlCommand::new(Arc::new(svc), Arc::new(responder), presentation(true));

    let outcome = command.handle(&CommandInvocation::new("42", "alice")).await;
    assert!(matches!(outcome, CommandOutcome::Failed(TvlError::Connectivity { .. })));
}

#[tokio::test]
async fn test_success_replaces_placeholder_with_embed() {
    let mut calculator = MockCalculator::new();
    calculator.expect_calculate().times(1).returning(|| {
        let report = vault_tvl_bot::domain::compute_tvl(
            &[vault_tvl_bot::domain::PortfolioHoldings::new("Vault").with("ETH", 1.0)],
            &[vault_tvl_bot::domain::PriceQuote::index("ETH", 2_340_000.0)].into_iter().collect(),
        );
        Ok(report)
    });

    let mut responder = MockResponder::new();
    responder.expect_send().times(1).returning(|_, _| Ok("m1".to_string()));
    responder
        .expect_edit()
        .withf(|_, _, reply| match reply {
            Reply::Embed(embed) => embed.fields.len() == 1 && embed.fields[0].value == "$2,340,000.00 ($2.3M)",
            Reply::Text(_) => false,
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let command = TvlCommand::new(Arc::new(calculator), Arc::new(responder), presentation(true));
    let outcome = command.handle(&CommandInvocation::new("42", "alice")).await;

    match outcome {
        CommandOutcome::Reported(report) => assert_eq!(report.total, 2_340_000.0),
        CommandOutcome::Failed(e) => panic!("unexpected failure: {e}"),
    }
}

#[tokio::test]
async fn test_placeholder_failure_falls_back_to_new_message() {
    let mut calculator = MockCalculator::new();
    calculator
        .expect_calculate()
        .returning(|| Err(TvlError::timeout("TVL calculation", Duration::from_secs(60))));

    let mut responder = MockResponder::new();
    let mut seq = mockall::Sequence::new();
    responder
        .expect_send()
        .withf(|_, reply| is_text(reply, "Calculating TVL"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Err(anyhow::anyhow!("missing permissions")));
    responder
        .expect_send()
        .withf(|_, reply| *reply == Reply::text("Unable to calculate TVL at the moment."))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok("m2".to_string()));
    responder.expect_edit().times(0);

    let command = TvlCommand::new(Arc::new(calculator), Arc::new(responder), presentation(false));
    let outcome = command.handle(&CommandInvocation::new("42", "alice")).await;

    assert!(matches!(outcome, CommandOutcome::Failed(TvlError::Timeout { .. })));
}

#[tokio::test]
async fn test_failed_edit_sends_new_message() {
    let mut calculator = MockCalculator::new();
    calculator
        .expect_calculate()
        .returning(|| Err(TvlError::MissingPrice { symbol: "WETH".into() }));

    let mut responder = MockResponder::new();
    let mut seq = mockall::Sequence::new();
    responder
        .expect_send()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok("m1".to_string()));
    responder
        .expect_edit()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _, _| Err(anyhow::anyhow!("message deleted")));
    responder
        .expect_send()
        .withf(|_, reply| *reply == Reply::text("Unable to calculate TVL at the moment: no USD price listed for WETH"))
        .times(1)
        .in_sequence(&mut seq)
        .returning(|_, _| Ok("m2".to_string()));

    let command = TvlCommand::new(Arc::new(calculator), Arc::new(responder), presentation(true));
    command.handle(&CommandInvocation::new("42", "alice")).await;
}

#[test]
fn test_config_to_deployment() {
    let toml = r#"
[bot]
name = "tvl-bot"

[chain]
rpc_url = "http://localhost:8545"

[[assets]]
symbol = "ETH"
native = true

[[assets]]
symbol = "WETH"
address = "0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2"
decimals = 18

[[portfolios]]
name = "Staking"
source = "events"
contract = "0x8bc93498b861fd98277c3b51d240e7e56e48f23c"
asset = "WETH"
start_block = 100
"#;
    let config = vault_tvl_bot::config::loader::parse_config(toml).unwrap();
    let deployment = vault_tvl_bot::config::registry::build(&config).unwrap();

    assert_eq!(deployment.assets.len(), 2);
    assert_eq!(
        deployment.portfolios[0].source,
        HoldingsSource::Events {
            contract: Address::from_str("0x8bc93498b861fd98277c3b51d240e7e56e48f23c").unwrap(),
            asset: "WETH".into(),
            start: StartBlock::Fixed(100),
        }
    );
    assert_eq!(deployment.contracts().len(), 2);
}
