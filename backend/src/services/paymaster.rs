//! # Paymaster Service
//!
//! Gas sponsorship through the ERC-7677 paymaster methods.
//!
//! ## Request Shape
//!
//! ```text
//! {
//!   "jsonrpc": "2.0", "id": 1,
//!   "method": "pm_getPaymasterData",
//!   "params": [ <userOp: 11 v0.6 fields, hex>, <entryPoint>, <chainIdHex>, {} ]
//! }
//! ```
//!
//! Whatever the caller hands in is reduced to the eleven v0.6 fields and
//! every number is re-encoded as a hex quantity before it leaves the
//! process. An error envelope from the paymaster is returned as an error.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::eth::primitives::{quantity_hex, serde_bytes_hex, serde_quantity_opt, HexError};
use crate::eth::{Address, AddressExt, JsonRpcClient, JsonRpcRequest, RpcError, U256, UserOperation};

use super::bundler::BundlerError;

/// Sponsorship data returned by the paymaster.
///
/// Gas fields are present only when the paymaster wants to override the
/// bundler's estimate.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymasterFields {
    #[serde(with = "serde_bytes_hex", default)]
    pub paymaster_and_data: Vec<u8>,

    #[serde(with = "serde_quantity_opt", default)]
    pub call_gas_limit: Option<U256>,

    #[serde(with = "serde_quantity_opt", default)]
    pub verification_gas_limit: Option<U256>,

    #[serde(with = "serde_quantity_opt", default)]
    pub pre_verification_gas: Option<U256>,
}

impl PaymasterFields {
    /// Write the sponsorship onto `op`; returned gas fields win.
    pub fn apply(&self, op: &mut UserOperation) {
        op.paymaster_and_data = self.paymaster_and_data.clone();
        if let Some(gas) = self.call_gas_limit {
            op.call_gas_limit = gas;
        }
        if let Some(gas) = self.verification_gas_limit {
            op.verification_gas_limit = gas;
        }
        if let Some(gas) = self.pre_verification_gas {
            op.pre_verification_gas = gas;
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymasterApi: Send + Sync {
    /// Placeholder sponsorship used while estimating gas.
    async fn get_paymaster_stub_data(&self, op: &UserOperation) -> Result<PaymasterFields, BundlerError>;

    /// Final sponsorship for a fully estimated operation.
    async fn get_paymaster_data(&self, op: &UserOperation) -> Result<PaymasterFields, BundlerError>;
}

/// Reduce a loosely-typed operation to the canonical eleven fields.
pub fn normalize_user_operation(op: &Value) -> Result<Value, HexError> {
    UserOperation::from_loose_json(op).map(|op| op.to_rpc_json())
}

/// Normalize the operation in a relayed `pm_*` call's first parameter.
///
/// Other methods and parameter shapes pass through untouched.
pub fn normalize_relay_params(method: &str, params: Value) -> Result<Value, HexError> {
    if !method.starts_with("pm_") {
        return Ok(params);
    }
    match params {
        Value::Array(mut items) if items.first().map_or(false, Value::is_object) => {
            items[0] = normalize_user_operation(&items[0])?;
            Ok(Value::Array(items))
        }
        other => Ok(other),
    }
}

/// Build a paymaster request for `op`.
pub fn paymaster_request(
    method: &str,
    op: &UserOperation,
    entry_point: &Address,
    chain_id: u64,
) -> JsonRpcRequest {
    JsonRpcRequest::new(
        method,
        json!([
            op.to_rpc_json(),
            entry_point.to_lower_hex(),
            quantity_hex(&U256::from(chain_id)),
            {}
        ]),
    )
}

pub fn parse_paymaster_fields(method: &'static str, result: &Value) -> Result<PaymasterFields, BundlerError> {
    serde_json::from_value(result.clone()).map_err(|e| BundlerError::UnexpectedResult {
        method,
        reason: e.to_string(),
    })
}

/// Pimlico paymaster client (same endpoint as the bundler).
#[derive(Clone)]
pub struct PimlicoPaymaster {
    rpc: Option<JsonRpcClient>,
    entry_point: Address,
    chain_id: u64,
}

impl PimlicoPaymaster {
    pub fn new(
        http: reqwest::Client,
        paymaster_url: Option<String>,
        entry_point: Address,
        chain_id: u64,
        timeout: Duration,
    ) -> Self {
        Self {
            rpc: paymaster_url.map(|url| JsonRpcClient::new(http, url, timeout)),
            entry_point,
            chain_id,
        }
    }

    async fn request(&self, method: &'static str, op: &UserOperation) -> Result<PaymasterFields, BundlerError> {
        let rpc = self
            .rpc
            .as_ref()
            .ok_or(BundlerError::Rpc(RpcError::NotConfigured("paymaster")))?;

        debug!("{} for {}", method, op.sender);
        let request = paymaster_request(method, op, &self.entry_point, self.chain_id);
        let result = rpc.send(&request).await?.into_result()?;
        parse_paymaster_fields(method, &result)
    }
}

#[async_trait]
impl PaymasterApi for PimlicoPaymaster {
    async fn get_paymaster_stub_data(&self, op: &UserOperation) -> Result<PaymasterFields, BundlerError> {
        self.request("pm_getPaymasterStubData", op).await
    }

    async fn get_paymaster_data(&self, op: &UserOperation) -> Result<PaymasterFields, BundlerError> {
        self.request("pm_getPaymasterData", op).await
    }
}
