//! # API Response Models
//!
//! Structures for outgoing API response bodies.
//! All non-proxy responses are wrapped in a standard format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::eth::Address;
use crate::services::token_scanner::Token;
use crate::services::transaction_builder::UnsignedTransaction;
use crate::services::vault_session::PendingOperation;

/// Standard API response wrapper.
///
/// All API responses follow this format:
///
/// ## Success Response
///
/// ```json
/// {
///     "success": true,
///     "data": { ... },
///     "error": null
/// }
/// ```
///
/// ## Error Response
///
/// ```json
/// {
///     "success": false,
///     "data": null,
///     "error": {
///         "code": "EMPTY_VAULT",
///         "message": "Vault balance is empty"
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,

    /// Response data (null on error).
    pub data: Option<T>,

    /// Error information (null on success).
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// API error information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error code (e.g., "WRONG_CHAIN").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

/// Tokens found in a wallet.
///
/// Returned by `GET /scan/:address`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResponse {
    pub address: Address,
    pub count: usize,
    pub swappable_only: bool,
    pub tokens: Vec<Token>,
}

/// Vault balance response.
///
/// Returned by `GET /vault/balance/:owner`
///
/// ## Example Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "owner": "0x4fba...5524",
///         "vaultAddress": "0x9b1c...",
///         "ethBalance": "1500000000000000",
///         "formattedEth": "0.0015 ETH",
///         "tokens": [ ... ]
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultBalanceResponse {
    pub owner: Address,
    pub vault_address: Address,

    /// Wei, as a decimal string.
    pub eth_balance: String,

    /// Human-readable balance (e.g., "0.0015 ETH").
    pub formatted_eth: String,

    /// ERC-20 tokens held by the Vault.
    pub tokens: Vec<Token>,
}

/// Unsigned main-wallet transaction for a quarantine.
///
/// Returned by `POST /vault/quarantine`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineResponse {
    pub vault_address: Address,
    pub transaction: UnsignedTransaction,
    pub message: String,
}

/// A prepared Vault operation awaiting the owner's signature.
///
/// Returned by swap, withdraw and send.
///
/// ## Flow
///
/// ```text
/// 1. Client receives operation.userOpHash
/// 2. Owner signs it (personal_sign)
/// 3. Client calls POST /vault/operations/{id}/submit
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResponse {
    pub operation: PendingOperation,

    /// Amount moved, human-readable, when the action has one.
    pub amount: Option<String>,

    pub message: String,
}

/// Result of submitting a signed operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub operation_id: Uuid,
    pub user_op_hash: String,
}

/// Inclusion status of a submitted operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptResponse {
    pub user_op_hash: String,

    /// `false` while the bundler has not included the operation.
    pub included: bool,

    /// Raw bundler receipt.
    pub receipt: Option<Value>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status: "healthy" or "unhealthy".
    pub status: String,

    /// Chain RPC reachable and on the configured chain.
    pub chain_rpc: bool,

    /// Configured chain id.
    pub chain_id: u64,

    /// Connected Vault sessions.
    pub sessions: usize,

    /// Operations awaiting a signature.
    pub pending_operations: usize,

    /// Service version.
    pub version: String,

    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
}
