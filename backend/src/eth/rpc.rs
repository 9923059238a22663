//! # JSON-RPC Transport
//!
//! A small JSON-RPC 2.0 client over `reqwest`, shared by the chain node
//! client and the bundler/paymaster clients.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

/// Errors from a JSON-RPC round trip.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The endpoint was never configured (usually a missing API key).
    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    /// Network failure, timeout or non-JSON body.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a JSON-RPC error object.
    #[error("RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    /// The response did not have the expected shape.
    #[error("Invalid RPC response: {0}")]
    InvalidResponse(String),
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,

    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Outgoing JSON-RPC request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    /// A `jsonrpc: "2.0"` request with id 1.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: json!(1),
            method: method.into(),
            params,
        }
    }

    /// Override the request id.
    pub fn with_id(mut self, id: Value) -> Self {
        self.id = id;
        self
    }
}

/// Incoming JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,

    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Collapse into the result or the error object.
    ///
    /// A response with neither field is treated as a `null` result
    /// (`eth_getUserOperationReceipt` legitimately returns `null`).
    pub fn into_result(self) -> Result<Value, RpcError> {
        match (self.error, self.result) {
            (Some(error), _) => Err(RpcError::Rpc(error)),
            (None, Some(result)) => Ok(result),
            (None, None) => Ok(Value::Null),
        }
    }
}

/// JSON-RPC client bound to one endpoint.
#[derive(Clone)]
pub struct JsonRpcClient {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl JsonRpcClient {
    pub fn new(client: reqwest::Client, url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            url: url.into(),
            timeout,
        }
    }

    /// Send a prepared request and decode the envelope.
    pub async fn send(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, RpcError> {
        debug!("JSON-RPC {} ->", request.method);
        trace!(params = %request.params, "request");

        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        trace!(%status, body = %body, "response");

        serde_json::from_value(body).map_err(|e| {
            RpcError::InvalidResponse(format!("status {}: {}", status, e))
        })
    }

    /// Call `method` and return its `result`.
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        self.send(&JsonRpcRequest::new(method, params)).await?.into_result()
    }
}
