//! Vault TVL Bot: Entry Point
//!
//! Initializes configuration, logging, chain and price clients, and
//! the Discord gateway. Runs until SIGINT.
//!
//! Wiring sequence:
//! 1. Load config.toml (path from `TVL_BOT_CONFIG`) + env overrides + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Build the asset/portfolio deployment from config
//! 4. Connect the EVM provider and check deployed contracts
//! 5. Create CoinGecko client, holdings reader, price fetcher, TVL service
//! 6. Load Discord token (DISCORD_TOKEN) and create the REST responder
//! 7. Spawn health/metrics server (/live, /ready, /metrics)
//! 8. Spawn chain health probe
//! 9. Spawn Discord gateway (auto-reconnect WebSocket)
//! 10. Wait for SIGINT → graceful shutdown

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn, Instrument};

use vault_tvl_bot::adapters::chain::{ContractValidator, EvmProvider, RpcChainReader};
use vault_tvl_bot::adapters::discord::{CommandMatcher, DiscordAuth, DiscordGateway, DiscordRest, InvocationHandler};
use vault_tvl_bot::adapters::metrics::{refresh_chain_health, HealthServer, HealthState, MetricsRegistry};
use vault_tvl_bot::adapters::prices::CoinGeckoClient;
use vault_tvl_bot::config::{self, registry};
use vault_tvl_bot::ports::chain_client::ChainReader;
use vault_tvl_bot::usecases::holdings_reader::HoldingsReader;
use vault_tvl_bot::usecases::price_fetcher::PriceFetcher;
use vault_tvl_bot::usecases::tvl_command::{CommandInvocation, Presentation, TvlCommand};
use vault_tvl_bot::usecases::tvl_service::TvlService;

/// Environment variable naming the config file.
const CONFIG_PATH_ENV: &str = "TVL_BOT_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config.toml";
/// Interval between chain readiness probes.
const CHAIN_PROBE_INTERVAL: Duration = Duration::from_secs(30);

type Command = TvlCommand<TvlService<RpcChainReader, CoinGeckoClient>, DiscordRest>;

/// Gateway sink: runs the command and records its outcome.
struct MeteredCommand {
    command: Command,
    metrics: Arc<MetricsRegistry>,
}

#[async_trait]
impl InvocationHandler for MeteredCommand {
    async fn on_command(&self, invocation: CommandInvocation) {
        let span = tracing::info_span!("tvl_command", id = %invocation.id, channel = %invocation.channel_id);
        let started = Instant::now();
        let outcome = self.command.handle(&invocation).instrument(span).await;
        self.metrics.observe(&outcome, started.elapsed().as_secs_f64());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ────────────────────────────────
    let config_path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = config::loader::load_config(&config_path).context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.bot.log_level)),
        )
        .json()
        .init();

    info!(
        name = %config.bot.name,
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path,
        portfolios = config.portfolios.len(),
        "Starting Vault TVL Bot"
    );

    // ── 3. Build deployment (assets + portfolios) ───────────
    let deployment = registry::build(&config).context("Invalid deployment configuration")?;

    // ── 4. Connect to the chain and check contracts ─────────
    let provider = Arc::new(EvmProvider::connect(&config.chain).await?);

    if config.chain.validate_contracts {
        let validator = ContractValidator::new(provider.inner());
        validator
            .validate_all(&deployment)
            .await
            .context("Contract validation failed")?;
    } else {
        warn!("Contract validation disabled");
    }

    // ── 5. Wire the TVL pipeline ────────────────────────────
    let chain = Arc::new(RpcChainReader::new(
        Arc::clone(&provider),
        Duration::from_secs(config.chain.request_timeout_secs),
    ));
    let index = Arc::new(CoinGeckoClient::new(&config.prices).context("Failed to create CoinGecko client")?);

    let reader = HoldingsReader::with_chunk_size(Arc::clone(&chain), config.chain.log_chunk_size);
    let prices = PriceFetcher::new(index, config.prices.native_asset_id.clone());
    let presentation = Presentation::for_deployment(
        config.bot.embed_title.clone(),
        &deployment,
        config.bot.expose_error_detail,
    );
    let service = Arc::new(TvlService::new(
        reader,
        prices,
        deployment,
        Duration::from_secs(config.bot.command_timeout_secs),
    ));

    // ── 6. Discord credentials + REST responder ─────────────
    let auth = Arc::new(DiscordAuth::from_env().context("Failed to load Discord token from env")?);
    let rest = Arc::new(DiscordRest::new(Arc::clone(&auth), &config.discord).context("Failed to create Discord client")?);

    let metrics = Arc::new(MetricsRegistry::new().context("Failed to register metrics")?);
    let handler = Arc::new(MeteredCommand {
        command: TvlCommand::new(service, rest, presentation),
        metrics: Arc::clone(&metrics),
    });

    // ── Shutdown signal channel ─────────────────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(1);
    let health = Arc::new(HealthState::new());

    // ── 7. Health + metrics server ──────────────────────────
    let health_handle = if config.health.enabled {
        let server = HealthServer::new(Arc::clone(&health), Arc::clone(&metrics), config.health.port);
        let health_shutdown = shutdown_tx.subscribe();
        Some(tokio::spawn(async move {
            if let Err(e) = server.run(health_shutdown).await {
                error!(error = %e, "Health server failed");
            }
        }))
    } else {
        None
    };

    // ── 8. Chain readiness probe ────────────────────────────
    let probe_shutdown = shutdown_tx.subscribe();
    let probe_budget = Duration::from_secs(config.chain.request_timeout_secs);
    let probe_handle = tokio::spawn(probe_chain(Arc::clone(&chain), Arc::clone(&health), probe_budget, probe_shutdown));

    // ── 9. Discord gateway ──────────────────────────────────
    let gateway = DiscordGateway::new(
        config.discord.gateway_url.clone(),
        auth,
        CommandMatcher::new(&config.bot.command_prefix, &config.bot.command_name),
        handler,
        Arc::clone(&health.gateway_connected),
    );
    let gateway_shutdown = shutdown_tx.subscribe();
    let gateway_handle = tokio::spawn(async move {
        if let Err(e) = gateway.run(gateway_shutdown).await {
            error!(error = %e, "Discord gateway task failed");
        }
    });

    info!("All tasks spawned, bot is running");

    // ── 10. Wait for SIGINT ─────────────────────────────────
    signal::ctrl_c().await.context("Failed to listen for SIGINT")?;
    info!("SIGINT received, initiating graceful shutdown");

    let _ = shutdown_tx.send(());
    health.gateway_connected.store(false, Ordering::Relaxed);

    let _ = tokio::time::timeout(Duration::from_secs(5), gateway_handle).await;
    let _ = tokio::time::timeout(Duration::from_secs(1), probe_handle).await;
    if let Some(handle) = health_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Poll the RPC node and mirror its health into the readiness state.
async fn probe_chain<C: ChainReader>(
    chain: Arc<C>,
    health: Arc<HealthState>,
    budget: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(CHAIN_PROBE_INTERVAL);
    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                refresh_chain_health(chain.as_ref(), &health, budget).await;
            }
        }
    }
}
