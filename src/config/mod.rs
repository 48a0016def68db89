//! Configuration Module - TOML-based Bot Configuration
//!
//! Loads and validates configuration from `config.toml` with
//! environment variable overrides for secrets and endpoints.
//! All vault, token and contract addresses are externalized here;
//! `registry` turns them into typed domain values.

pub mod loader;
pub mod registry;

use serde::Deserialize;

/// Top-level bot configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before the bot connects to anything.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Bot identity and command behavior.
  pub bot: BotConfig,
  /// EVM node access.
  pub chain: ChainConfig,
  /// Price index endpoints.
  #[serde(default)]
  pub prices: PriceConfig,
  /// Discord gateway and REST endpoints.
  #[serde(default)]
  pub discord: DiscordConfig,
  /// Health and metrics server.
  #[serde(default)]
  pub health: HealthConfig,
  /// Asset registry.
  pub assets: Vec<AssetConfig>,
  /// Named sub-portfolios reported as subtotals.
  pub portfolios: Vec<PortfolioConfig>,
}

/// Bot identity configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
  /// Human-readable bot name.
  pub name: String,
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Prefix that marks a message as a command.
  #[serde(default = "default_command_prefix")]
  pub command_prefix: String,
  /// Command name following the prefix.
  #[serde(default = "default_command_name")]
  pub command_name: String,
  /// Title of the TVL embed.
  #[serde(default = "default_embed_title")]
  pub embed_title: String,
  /// Budget for one full TVL computation (seconds).
  #[serde(default = "default_command_timeout")]
  pub command_timeout_secs: u64,
  /// Append the failure cause to the user-facing error message.
  #[serde(default = "default_true")]
  pub expose_error_detail: bool,
}

/// EVM node configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
  /// JSON-RPC endpoint (overridden by `RPC_URL`).
  #[serde(default)]
  pub rpc_url: String,
  /// Refuse to start when the node reports another chain id.
  pub expected_chain_id: Option<u64>,
  /// Maximum blocks per `eth_getLogs` request.
  #[serde(default = "default_log_chunk_size")]
  pub log_chunk_size: u64,
  /// Timeout for each RPC call (seconds).
  #[serde(default = "default_request_timeout")]
  pub request_timeout_secs: u64,
  /// Check that every configured contract has deployed code.
  #[serde(default = "default_true")]
  pub validate_contracts: bool,
}

/// Price index configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
  /// API base URL.
  #[serde(default = "default_price_base_url")]
  pub base_url: String,
  /// Platform id used for token-by-address lookups.
  #[serde(default = "default_price_platform")]
  pub platform: String,
  /// Well-known id of the chain's native coin.
  #[serde(default = "default_native_asset_id")]
  pub native_asset_id: String,
  /// Request timeout (seconds).
  #[serde(default = "default_request_timeout")]
  pub timeout_secs: u64,
}

/// Discord endpoint configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
  /// Gateway WebSocket URL.
  #[serde(default = "default_gateway_url")]
  pub gateway_url: String,
  /// REST API base URL.
  #[serde(default = "default_api_base_url")]
  pub api_base_url: String,
  /// Outbound REST requests allowed per second.
  #[serde(default = "default_max_requests_per_second")]
  pub max_requests_per_second: u32,
  /// REST request timeout (seconds).
  #[serde(default = "default_request_timeout")]
  pub timeout_secs: u64,
}

/// Health and metrics server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HealthConfig {
  /// Serve /live, /ready and /metrics.
  #[serde(default = "default_true")]
  pub enabled: bool,
  /// Listen port.
  #[serde(default = "default_health_port")]
  pub port: u16,
}

/// One registry asset.
///
/// Exactly one of `native = true` or `address` identifies the asset.
#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
  /// Unique symbol (e.g. "USDC").
  pub symbol: String,
  /// The chain's native coin.
  #[serde(default)]
  pub native: bool,
  /// ERC-20 contract address.
  pub address: Option<String>,
  /// Fixed decimals; read from `decimals()` when omitted.
  pub decimals: Option<u8>,
  /// Price at 1.0 USD when the index has no listing.
  #[serde(default)]
  pub stable_fallback: bool,
}

/// One named portfolio.
#[derive(Debug, Clone, Deserialize)]
pub struct PortfolioConfig {
  /// Display name, used as the embed field name.
  pub name: String,
  /// Where holdings come from.
  #[serde(flatten)]
  pub source: PortfolioSourceConfig,
}

/// Holdings source, selected by the `source` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum PortfolioSourceConfig {
  /// Current balances of `assets` across `vaults`.
  Balances {
    vaults: Vec<VaultConfig>,
    assets: Vec<String>,
  },
  /// Replay Deposit/Withdraw events of `contract`.
  Events {
    /// Vault contract; `CONTRACT_ADDRESS` fills it when omitted.
    contract: Option<String>,
    /// Symbol of the deposited asset.
    asset: String,
    /// First block to replay (deploy block).
    start_block: Option<u64>,
    /// Replay only the last N blocks.
    lookback_blocks: Option<u64>,
  },
}

/// A vault address with a display label.
#[derive(Debug, Clone, Deserialize)]
pub struct VaultConfig {
  pub label: String,
  pub address: String,
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_true() -> bool {
  true
}

fn default_command_prefix() -> String {
  "?".to_string()
}

fn default_command_name() -> String {
  "tvl".to_string()
}

fn default_embed_title() -> String {
  "Vault TVL".to_string()
}

fn default_command_timeout() -> u64 {
  60
}

fn default_log_chunk_size() -> u64 {
  50_000
}

fn default_request_timeout() -> u64 {
  15
}

fn default_price_base_url() -> String {
  "https://api.coingecko.com/api/v3".to_string()
}

fn default_price_platform() -> String {
  "ethereum".to_string()
}

fn default_native_asset_id() -> String {
  "ethereum".to_string()
}

fn default_gateway_url() -> String {
  "wss://gateway.discord.gg/?v=10&encoding=json".to_string()
}

fn default_api_base_url() -> String {
  "https://discord.com/api/v10".to_string()
}

fn default_max_requests_per_second() -> u32 {
  5
}

fn default_health_port() -> u16 {
  8080
}

impl Default for PriceConfig {
  fn default() -> Self {
    Self {
      base_url: default_price_base_url(),
      platform: default_price_platform(),
      native_asset_id: default_native_asset_id(),
      timeout_secs: default_request_timeout(),
    }
  }
}

impl Default for DiscordConfig {
  fn default() -> Self {
    Self {
      gateway_url: default_gateway_url(),
      api_base_url: default_api_base_url(),
      max_requests_per_second: default_max_requests_per_second(),
      timeout_secs: default_request_timeout(),
    }
  }
}

impl Default for HealthConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      port: default_health_port(),
    }
  }
}
