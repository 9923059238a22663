//! # Bundler Service
//!
//! Talks to the ERC-4337 bundler (Pimlico) over JSON-RPC.
//!
//! ## Methods Used
//!
//! | Method | Purpose |
//! |--------|---------|
//! | `pimlico_getUserOperationGasPrice` | Fee suggestion (`fast` tier) |
//! | `eth_estimateUserOperationGas` | Gas limits for a stubbed operation |
//! | `eth_sendUserOperation` | Hand a signed operation to the bundler |
//! | `eth_getUserOperationReceipt` | Inclusion status |
//!
//! The same endpoint serves the paymaster methods (see `paymaster.rs`) and
//! the raw relay behind `POST /api/webhook/paymaster`.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::eth::primitives::serde_quantity;
use crate::eth::{Address, AddressExt, JsonRpcClient, JsonRpcRequest, RpcError, U256, UserOperation};

/// Errors from the bundler or paymaster.
#[derive(Debug, thiserror::Error)]
pub enum BundlerError {
    /// Transport or JSON-RPC level failure.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// The call succeeded but the result is not what the method promises.
    #[error("Unexpected {method} result: {reason}")]
    UnexpectedResult { method: &'static str, reason: String },
}

impl BundlerError {
    fn unexpected(method: &'static str, reason: impl ToString) -> Self {
        Self::UnexpectedResult {
            method,
            reason: reason.to_string(),
        }
    }
}

/// EIP-1559 fee pair for a UserOperation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasPrice {
    #[serde(with = "serde_quantity")]
    pub max_fee_per_gas: U256,

    #[serde(with = "serde_quantity")]
    pub max_priority_fee_per_gas: U256,
}

/// v0.6 gas limits returned by `eth_estimateUserOperationGas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GasEstimate {
    #[serde(with = "serde_quantity")]
    pub pre_verification_gas: U256,

    #[serde(with = "serde_quantity")]
    pub verification_gas_limit: U256,

    #[serde(with = "serde_quantity")]
    pub call_gas_limit: U256,
}

impl GasEstimate {
    /// Copy the limits onto `op`.
    pub fn apply(&self, op: &mut UserOperation) {
        op.pre_verification_gas = self.pre_verification_gas;
        op.verification_gas_limit = self.verification_gas_limit;
        op.call_gas_limit = self.call_gas_limit;
    }
}

/// Bundler operations used by the session manager and the relay route.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BundlerApi: Send + Sync {
    /// Forward a client-built JSON-RPC request and return its `result`.
    async fn relay(&self, request: JsonRpcRequest) -> Result<Value, BundlerError>;

    /// Current `fast` fee suggestion.
    async fn gas_price(&self) -> Result<GasPrice, BundlerError>;

    /// Gas limits for `op` (which must carry a dummy signature).
    async fn estimate_gas(&self, op: &UserOperation) -> Result<GasEstimate, BundlerError>;

    /// Submit a signed operation; returns the `userOpHash` the bundler reports.
    async fn send_user_operation(&self, op: &UserOperation) -> Result<String, BundlerError>;

    /// Receipt for `hash`, or `None` while the operation is not yet included.
    async fn user_operation_receipt(&self, hash: &str) -> Result<Option<Value>, BundlerError>;
}

/// Pimlico bundler client.
///
/// Without an API key every call fails with `RpcError::NotConfigured`
/// instead of reaching the network.
#[derive(Clone)]
pub struct PimlicoBundler {
    rpc: Option<JsonRpcClient>,
    entry_point: Address,
}

impl PimlicoBundler {
    pub fn new(
        http: reqwest::Client,
        bundler_url: Option<String>,
        entry_point: Address,
        timeout: Duration,
    ) -> Self {
        Self {
            rpc: bundler_url.map(|url| JsonRpcClient::new(http, url, timeout)),
            entry_point,
        }
    }

    fn rpc(&self) -> Result<&JsonRpcClient, BundlerError> {
        self.rpc
            .as_ref()
            .ok_or(BundlerError::Rpc(RpcError::NotConfigured("bundler")))
    }

    async fn call(&self, method: &'static str, params: Value) -> Result<Value, BundlerError> {
        Ok(self.rpc()?.call(method, params).await?)
    }
}

/// Pick the `fast` tier out of `pimlico_getUserOperationGasPrice`.
pub fn parse_gas_price(result: &Value) -> Result<GasPrice, BundlerError> {
    const METHOD: &str = "pimlico_getUserOperationGasPrice";
    let fast = result
        .get("fast")
        .ok_or_else(|| BundlerError::unexpected(METHOD, "missing fast tier"))?;
    serde_json::from_value(fast.clone()).map_err(|e| BundlerError::unexpected(METHOD, e))
}

pub fn parse_gas_estimate(result: &Value) -> Result<GasEstimate, BundlerError> {
    serde_json::from_value(result.clone())
        .map_err(|e| BundlerError::unexpected("eth_estimateUserOperationGas", e))
}

#[async_trait]
impl BundlerApi for PimlicoBundler {
    async fn relay(&self, request: JsonRpcRequest) -> Result<Value, BundlerError> {
        debug!("Relaying {} to bundler", request.method);
        Ok(self.rpc()?.send(&request).await?.into_result()?)
    }

    async fn gas_price(&self) -> Result<GasPrice, BundlerError> {
        let result = self.call("pimlico_getUserOperationGasPrice", json!([])).await?;
        parse_gas_price(&result)
    }

    async fn estimate_gas(&self, op: &UserOperation) -> Result<GasEstimate, BundlerError> {
        let result = self
            .call(
                "eth_estimateUserOperationGas",
                json!([op.to_rpc_json(), self.entry_point.to_lower_hex()]),
            )
            .await?;
        parse_gas_estimate(&result)
    }

    async fn send_user_operation(&self, op: &UserOperation) -> Result<String, BundlerError> {
        let result = self
            .call(
                "eth_sendUserOperation",
                json!([op.to_rpc_json(), self.entry_point.to_lower_hex()]),
            )
            .await?;
        let hash = result
            .as_str()
            .map(String::from)
            .ok_or_else(|| BundlerError::unexpected("eth_sendUserOperation", "expected a hash string"))?;
        info!("📨 UserOperation submitted: {}", hash);
        Ok(hash)
    }

    async fn user_operation_receipt(&self, hash: &str) -> Result<Option<Value>, BundlerError> {
        let result = self.call("eth_getUserOperationReceipt", json!([hash])).await?;
        Ok(if result.is_null() { None } else { Some(result) })
    }
}
