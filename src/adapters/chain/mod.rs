//! Chain Adapters - EVM Node Interaction Layer
//!
//! Provides read-only on-chain access via alloy-rs 0.9 for:
//! - RPC provider management with chain id check
//! - ERC-20 / native balances and Deposit/Withdraw logs (`ChainReader`)
//! - Startup validation that configured contracts exist

pub mod provider;
pub mod reader;
pub mod validator;

pub use provider::EvmProvider;
pub use reader::RpcChainReader;
pub use validator::ContractValidator;
