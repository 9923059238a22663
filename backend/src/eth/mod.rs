//! # Ethereum Client Module
//!
//! Everything the backend needs to talk to an EVM chain. Types and ABI come
//! from `alloy-primitives` / `alloy-sol-types`; transport is plain JSON-RPC
//! over the shared `reqwest` client.
//!
//! ## Submodules
//!
//! | Module | Contents |
//! |--------|----------|
//! | `primitives` | alloy re-exports, hex/quantity normalization |
//! | `abi` | `sol!` interfaces, call builders and return decoders |
//! | `units` | decimal amount <-> raw units |
//! | `user_operation` | ERC-4337 v0.6 `UserOperation` and its hash |
//! | `rpc` | JSON-RPC 2.0 transport |
//! | `constants` | Base mainnet addresses |
//!
//! ## Request Flow
//!
//! ```text
//! 1. Service calls ChainApi (e.g. get_balance)
//!              ↓
//! 2. EthClient builds the JSON-RPC request
//!              ↓
//! 3. JsonRpcClient POSTs it to RPC_URL
//!              ↓
//! 4. Hex result decoded into U256 / bytes
//! ```

pub mod abi;
pub mod constants;
pub mod primitives;
pub mod rpc;
pub mod units;
pub mod user_operation;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

pub use primitives::{Address, AddressExt, HexError, U256};
pub use rpc::{JsonRpcClient, JsonRpcError, JsonRpcRequest, RpcError};
pub use user_operation::UserOperation;

use primitives::{hex_decode, hex_encode, parse_quantity};

/// Read access to the chain the Vaults live on.
///
/// Implemented by [`EthClient`]; mocked in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChainApi: Send + Sync {
    /// `eth_chainId`.
    async fn chain_id(&self) -> Result<u64, RpcError>;

    /// `eth_getBalance` at `latest`, in wei.
    async fn get_balance(&self, address: &Address) -> Result<U256, RpcError>;

    /// `eth_getCode` at `latest`; empty for undeployed accounts.
    async fn get_code(&self, address: &Address) -> Result<Vec<u8>, RpcError>;

    /// Read-only `eth_call` at `latest`, returning raw return data.
    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, RpcError>;
}

/// JSON-RPC client for the chain node.
///
/// ## Usage
///
/// ```rust,ignore
/// let client = EthClient::new(http, &config.rpc_url, timeout);
/// let wei = client.get_balance(&vault).await?;
/// ```
#[derive(Clone)]
pub struct EthClient {
    rpc: JsonRpcClient,
}

impl EthClient {
    pub fn new(http: reqwest::Client, rpc_url: &str, timeout: Duration) -> Self {
        Self {
            rpc: JsonRpcClient::new(http, rpc_url, timeout),
        }
    }
}

fn expect_str(value: &Value, what: &str) -> Result<String, RpcError> {
    value
        .as_str()
        .map(String::from)
        .ok_or_else(|| RpcError::InvalidResponse(format!("{}: expected string, got {}", what, value)))
}

#[async_trait]
impl ChainApi for EthClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let result = self.rpc.call("eth_chainId", json!([])).await?;
        let id = parse_quantity(&result).map_err(|e| RpcError::InvalidResponse(e.to_string()))?;
        u64::try_from(id).map_err(|_| RpcError::InvalidResponse(format!("chain id out of range: {}", id)))
    }

    async fn get_balance(&self, address: &Address) -> Result<U256, RpcError> {
        debug!("eth_getBalance {}", address);
        let result = self
            .rpc
            .call("eth_getBalance", json!([address.to_lower_hex(), "latest"]))
            .await?;
        parse_quantity(&result).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    async fn get_code(&self, address: &Address) -> Result<Vec<u8>, RpcError> {
        let result = self
            .rpc
            .call("eth_getCode", json!([address.to_lower_hex(), "latest"]))
            .await?;
        let code = expect_str(&result, "eth_getCode")?;
        hex_decode(&code).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }

    async fn call(&self, to: &Address, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        let result = self
            .rpc
            .call(
                "eth_call",
                json!([{ "to": to.to_lower_hex(), "data": hex_encode(data) }, "latest"]),
            )
            .await?;
        let raw = expect_str(&result, "eth_call")?;
        hex_decode(&raw).map_err(|e| RpcError::InvalidResponse(e.to_string()))
    }
}
