//! # API Request Handlers
//!
//! This module contains the handler functions for each API endpoint.
//!
//! ## Handler Pattern
//!
//! Each handler follows this pattern:
//!
//! 1. Extract request data (JSON body, path params, query params)
//! 2. Validate input
//! 3. Call the appropriate service
//! 4. Return formatted response
//!
//! ## Error Handling
//!
//! Envelope endpoints map service errors to HTTP status codes:
//! - 400 Bad Request: Invalid input, empty Vault, wrong chain
//! - 404 Not Found: No session or pending operation
//! - 410 Gone: Pending operation expired
//! - 500 Internal Server Error: Operation expiry out of range
//! - 502 Bad Gateway: Upstream (chain, bundler, indexer, aggregator) failure
//!
//! Bodies or query strings that fail to deserialize are answered with
//! 400 `INVALID_REQUEST` in the same envelope.
//!
//! The `/api/webhook/*` proxies keep the raw `{result}` / `{error}` bodies.

use std::sync::Arc;

use actix_web::error::{InternalError, JsonPayloadError, QueryPayloadError};
use actix_web::{http::StatusCode, web, HttpRequest, HttpResponse};
use serde_json::{json, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::eth::{AddressExt, JsonRpcRequest, RpcError};
use crate::models::{
    ApiResponse, ConnectRequest, EthPriceQuery, HealthResponse, QuarantineRequest, ReceiptResponse, ScanQuery,
    ScanResponse, SendRequest, SubmitOperationRequest, SubmitResponse, SwapQuoteQuery, SwapRequest, WithdrawRequest,
};
use crate::services::paymaster::normalize_relay_params;
use crate::services::vault_manager::parse_address;
use crate::services::vault_monitor::probe_chain;
use crate::services::{ActionError, BundlerError, QuoteRequest, SessionError};
use crate::utils::{format_usd, short_hex};
use crate::AppState;

// ==========================================
// ERROR MAPPING
// ==========================================

/// HTTP status for an action error.
fn action_status(e: &ActionError) -> StatusCode {
    if let ActionError::QuoteRejected { status, .. } = e {
        return StatusCode::from_u16(*status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::BAD_GATEWAY);
    }
    match e.code() {
        "NOT_CONNECTED" | "OPERATION_NOT_FOUND" => StatusCode::NOT_FOUND,
        "OPERATION_EXPIRED" => StatusCode::GONE,
        "UPSTREAM_ERROR" => StatusCode::BAD_GATEWAY,
        "INTERNAL_ERROR" => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn action_error_response(e: &ActionError) -> HttpResponse {
    let status = action_status(e);
    if status.is_server_error() {
        error!("Vault action failed: {}", e);
    } else {
        warn!("Vault action rejected: {}", e);
    }
    HttpResponse::build(status).json(ApiResponse::<()>::error(e.code(), &e.to_string()))
}

fn invalid_request<E>(err: E) -> actix_web::Error
where
    E: std::fmt::Debug + std::fmt::Display + 'static,
{
    let message = err.to_string();
    warn!("Rejected malformed request: {}", message);
    let response = HttpResponse::BadRequest().json(ApiResponse::<()>::error("INVALID_REQUEST", &message));
    InternalError::from_response(err, response).into()
}

/// `JsonConfig` error handler: malformed bodies get the API envelope.
pub fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    invalid_request(err)
}

/// `QueryConfig` error handler: malformed query strings get the API envelope.
pub fn query_error_handler(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    invalid_request(err)
}

// ==========================================
// ROOT ENDPOINTS
// ==========================================

/// API information endpoint.
///
/// ## Endpoint
///
/// `GET /`
pub async fn api_info() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "name": "Dust Vault API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Quarantine, swap and withdraw dust tokens through an ERC-4337 Vault on Base",
        "endpoints": {
            "health": "GET /health",
            "scan": "GET /scan/:address?swappable=true",
            "paymaster": "POST /api/webhook/paymaster",
            "swap_quote": "GET /api/webhook/swap?sellToken=&sellAmount=&taker=",
            "connect": "POST /vault/connect",
            "disconnect": "POST /vault/disconnect",
            "balance": "GET /vault/balance/:owner",
            "eth_price": "GET /vault/eth-price",
            "quarantine": "POST /vault/quarantine",
            "swap": "POST /vault/swap",
            "withdraw": "POST /vault/withdraw",
            "send": "POST /vault/send",
            "operation": "GET /vault/operations/:id",
            "submit": "POST /vault/operations/:id/submit",
            "receipt": "GET /vault/operations/receipt/:hash"
        }
    }))
}

/// Health check endpoint.
///
/// Returns 503 when the chain RPC is unreachable or on another chain.
///
/// ## Endpoint
///
/// `GET /health`
///
/// ## Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "status": "healthy",
///         "chainRpc": true,
///         "chainId": 8453,
///         "sessions": 3,
///         "pendingOperations": 1,
///         "version": "0.1.0",
///         "timestamp": "2024-01-15T10:30:00Z"
///     }
/// }
/// ```
pub async fn health_check(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let chain_rpc = probe_chain(state.chain.as_ref(), state.config.chain_id)
        .await
        .is_healthy();

    let response = HealthResponse {
        status: if chain_rpc { "healthy" } else { "unhealthy" }.to_string(),
        chain_rpc,
        chain_id: state.config.chain_id,
        sessions: state.sessions.session_count().await,
        pending_operations: state.sessions.pending_count().await,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    };

    if chain_rpc {
        HttpResponse::Ok().json(ApiResponse::success(response))
    } else {
        HttpResponse::ServiceUnavailable().json(ApiResponse::success(response))
    }
}

// ==========================================
// PROXY ENDPOINTS
// ==========================================

/// Relay a JSON-RPC call to the paymaster/bundler.
///
/// ## Endpoint
///
/// `POST /api/webhook/paymaster`
///
/// ## Request Body
///
/// Either `{method, params}` or a full JSON-RPC envelope:
///
/// ```json
/// {
///     "jsonrpc": "2.0",
///     "id": 4,
///     "method": "pm_getPaymasterStubData",
///     "params": [{ ... }, "0x5FF1...2789", "0x2105", {}]
/// }
/// ```
///
/// The operation in a `pm_*` call is hex-normalized before forwarding.
///
/// ## Response
///
/// `200 {"result": ...}` with the upstream result verbatim, or
/// `500 {"error": ...}`.
pub async fn paymaster_relay(state: web::Data<Arc<AppState>>, body: web::Bytes) -> HttpResponse {
    let body: Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            warn!("Paymaster relay: unreadable body: {}", e);
            return HttpResponse::BadRequest().json(json!({ "error": "Request body must be JSON" }));
        }
    };

    let method = match body.get("method").and_then(Value::as_str).map(str::trim) {
        Some(method) if !method.is_empty() => method.to_string(),
        _ => return HttpResponse::BadRequest().json(json!({ "error": "Missing JSON-RPC method" })),
    };
    let params = match normalize_relay_params(&method, body.get("params").cloned().unwrap_or_else(|| json!([]))) {
        Ok(params) => params,
        Err(e) => {
            warn!("Paymaster relay {}: bad user operation: {}", method, e);
            return HttpResponse::BadRequest().json(json!({ "error": format!("Invalid user operation: {}", e) }));
        }
    };
    let id = body
        .get("id")
        .filter(|id| !id.is_null())
        .cloned()
        .unwrap_or_else(|| json!(1));

    info!("📨 Paymaster relay: {}", method);

    match state.bundler.relay(JsonRpcRequest::new(method.as_str(), params).with_id(id)).await {
        Ok(result) => HttpResponse::Ok().json(json!({ "result": result })),
        Err(BundlerError::Rpc(RpcError::Rpc(upstream))) => {
            warn!("Paymaster relay {} rejected: {} {}", method, upstream.code, upstream.message);
            HttpResponse::InternalServerError().json(json!({ "error": upstream }))
        }
        Err(BundlerError::Rpc(RpcError::NotConfigured(_))) => {
            error!("Paymaster relay called without PIMLICO_API_KEY");
            HttpResponse::InternalServerError().json(json!({ "error": { "message": "paymaster is not configured" } }))
        }
        Err(e) => {
            error!("Paymaster relay {} failed: {}", method, e);
            HttpResponse::InternalServerError().json(json!({ "error": { "message": e.to_string() } }))
        }
    }
}

/// Relay a swap quote request to the aggregator.
///
/// ## Endpoint
///
/// `GET /api/webhook/swap?sellToken=0x...&sellAmount=1000&taker=0x...`
///
/// `takerAddress` is accepted in place of `taker`. `buyToken` defaults to
/// WETH.
///
/// ## Response
///
/// The upstream quote body with the upstream status.
pub async fn swap_quote_relay(state: web::Data<Arc<AppState>>, query: web::Query<SwapQuoteQuery>) -> HttpResponse {
    let query = query.into_inner();
    let present = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);

    let (sell_token, sell_amount, taker) = match (
        present(&query.sell_token),
        present(&query.sell_amount),
        query.effective_taker().map(|t| t.trim().to_string()),
    ) {
        (Some(sell_token), Some(sell_amount), Some(taker)) => (sell_token, sell_amount, taker),
        _ => return HttpResponse::BadRequest().json(json!({ "error": "Missing parameters" })),
    };
    let buy_token = present(&query.buy_token).unwrap_or_else(|| state.config.weth.to_lower_hex());

    let request = QuoteRequest {
        sell_token,
        buy_token,
        sell_amount,
        taker,
    };

    match state.quotes.quote(&request).await {
        Ok(response) => {
            if !response.is_success() {
                warn!("Swap quote relay: upstream status {}", response.status);
            }
            let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
            HttpResponse::build(status).json(response.body)
        }
        Err(e) => {
            error!("Swap quote relay failed: {}", e);
            HttpResponse::InternalServerError().json(json!({ "error": "Failed to fetch quote" }))
        }
    }
}

// ==========================================
// SCANNER
// ==========================================

/// List a wallet's tokens with DEX liquidity.
///
/// ## Endpoint
///
/// `GET /scan/{address}?swappable=true`
///
/// ## Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "address": "0x4fba...5524",
///         "count": 1,
///         "swappableOnly": true,
///         "tokens": [{
///             "address": "0x...",
///             "symbol": "DUST",
///             "balance": "1000000000000000000",
///             "liquidityUsd": 1520.4,
///             "priceUsd": "0.0012",
///             "network": "base-mainnet"
///         }]
///     }
/// }
/// ```
pub async fn scan_tokens(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<ScanQuery>,
) -> HttpResponse {
    let raw = path.into_inner();
    let address = match parse_address("address", &raw) {
        Ok(address) => address,
        Err(e) => return action_error_response(&e),
    };
    let swappable_only = query.swappable.unwrap_or(false);

    let result = if swappable_only {
        state
            .scanner
            .scan_swappable(&address, state.config.min_swap_liquidity_usd)
            .await
    } else {
        state.scanner.scan(&address).await
    };

    match result {
        Ok(tokens) => {
            info!("🔎 Scan {}: {} tokens", short_hex(&raw), tokens.len());
            HttpResponse::Ok().json(ApiResponse::success(ScanResponse {
                address,
                count: tokens.len(),
                swappable_only,
                tokens,
            }))
        }
        Err(e) => action_error_response(&ActionError::Scan(e)),
    }
}

// ==========================================
// SESSIONS
// ==========================================

/// Connect an owner and derive their Vault.
///
/// ## Endpoint
///
/// `POST /vault/connect`
///
/// ## Request Body
///
/// ```json
/// { "owner": "0x4fba...5524" }
/// ```
pub async fn connect_vault(state: web::Data<Arc<AppState>>, body: web::Json<ConnectRequest>) -> HttpResponse {
    let owner = match parse_address("owner", &body.owner) {
        Ok(owner) => owner,
        Err(e) => return action_error_response(&e),
    };

    match state.sessions.connect(&owner).await {
        Ok(session) => HttpResponse::Ok().json(ApiResponse::success(session)),
        Err(e) => action_error_response(&ActionError::Session(e)),
    }
}

/// Forget an owner's session and pending operations.
///
/// ## Endpoint
///
/// `POST /vault/disconnect`
pub async fn disconnect_vault(state: web::Data<Arc<AppState>>, body: web::Json<ConnectRequest>) -> HttpResponse {
    let owner = match parse_address("owner", &body.owner) {
        Ok(owner) => owner,
        Err(e) => return action_error_response(&e),
    };

    let disconnected = state.sessions.disconnect(&owner).await;
    HttpResponse::Ok().json(ApiResponse::success(json!({ "disconnected": disconnected })))
}

// ==========================================
// QUERIES
// ==========================================

/// Get the Vault's ETH balance and tokens.
///
/// ## Endpoint
///
/// `GET /vault/balance/{owner}`
pub async fn get_balance(state: web::Data<Arc<AppState>>, path: web::Path<String>) -> HttpResponse {
    match state.vault_manager.get_vault_balance(&path.into_inner()).await {
        Ok(balance) => HttpResponse::Ok().json(ApiResponse::success(balance)),
        Err(e) => action_error_response(&e),
    }
}

/// Current ETH price in USD.
///
/// ## Endpoint
///
/// `GET /vault/eth-price?taker=0x...`
///
/// ## Response
///
/// ```json
/// { "success": true, "data": { "usd": 3187.42, "fallback": false } }
/// ```
pub async fn get_eth_price(state: web::Data<Arc<AppState>>, query: web::Query<EthPriceQuery>) -> HttpResponse {
    match state.vault_manager.eth_price(query.taker.as_deref()).await {
        Ok(price) => {
            if price.fallback {
                warn!("ETH price quote unavailable, serving fallback {}", format_usd(price.usd));
            }
            HttpResponse::Ok().json(ApiResponse::success(price))
        }
        Err(e) => action_error_response(&e),
    }
}

// ==========================================
// ACTIONS
// ==========================================

/// Build the wallet transfer that moves a token into the Vault.
///
/// ## Endpoint
///
/// `POST /vault/quarantine`
///
/// ## Request Body
///
/// ```json
/// {
///     "owner": "0x4fba...5524",
///     "token": "0x...",
///     "balance": "1000000000000000000",
///     "chainId": 8453
/// }
/// ```
///
/// ## Response
///
/// An unsigned `transfer(vault, balance)` for the owner's wallet to send.
pub async fn quarantine(state: web::Data<Arc<AppState>>, body: web::Json<QuarantineRequest>) -> HttpResponse {
    info!("🧹 Quarantine request from {}", short_hex(&body.owner));

    match state.vault_manager.quarantine(body.into_inner()).await {
        Ok(response) => HttpResponse::Ok().json(ApiResponse::success(response)),
        Err(e) => action_error_response(&e),
    }
}

/// Prepare a swap of a Vault token.
///
/// ## Endpoint
///
/// `POST /vault/swap`
///
/// ## Request Body
///
/// ```json
/// {
///     "owner": "0x4fba...5524",
///     "sellToken": "0x...",
///     "sellAmount": "1000000000000000000",
///     "buyToken": "0x4200000000000000000000000000000000000006"
/// }
/// ```
pub async fn swap(state: web::Data<Arc<AppState>>, body: web::Json<SwapRequest>) -> HttpResponse {
    info!("🔄 Swap request from {}: {} of {}", short_hex(&body.owner), body.sell_amount, short_hex(&body.sell_token));

    match state.vault_manager.swap(body.into_inner()).await {
        Ok(response) => HttpResponse::Ok().json(ApiResponse::success(response)),
        Err(e) => action_error_response(&e),
    }
}

/// Prepare a withdrawal of Vault ETH to the owner.
///
/// ## Endpoint
///
/// `POST /vault/withdraw`
///
/// ## Request Body
///
/// ```json
/// { "owner": "0x4fba...5524", "percentage": 100 }
/// ```
///
/// ## Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "operation": { "id": "...", "userOpHash": "0x...", ... },
///         "amount": "0.00984375",
///         "message": "Sign to withdraw 0.00984375 ETH"
///     }
/// }
/// ```
pub async fn withdraw(state: web::Data<Arc<AppState>>, body: web::Json<WithdrawRequest>) -> HttpResponse {
    info!("💸 Withdraw request from {}: {}%", short_hex(&body.owner), body.percentage);

    match state.vault_manager.withdraw(body.into_inner()).await {
        Ok(response) => HttpResponse::Ok().json(ApiResponse::success(response)),
        Err(e) => action_error_response(&e),
    }
}

/// Prepare an ETH or USDC transfer out of the Vault.
///
/// ## Endpoint
///
/// `POST /vault/send`
///
/// ## Request Body
///
/// ```json
/// { "owner": "0x...", "recipient": "0x...", "amount": "2.5", "asset": "usdc" }
/// ```
pub async fn send(state: web::Data<Arc<AppState>>, body: web::Json<SendRequest>) -> HttpResponse {
    info!("📤 Send request from {} to {}", short_hex(&body.owner), short_hex(&body.recipient));

    match state.vault_manager.send(body.into_inner()).await {
        Ok(response) => HttpResponse::Ok().json(ApiResponse::success(response)),
        Err(e) => action_error_response(&e),
    }
}

// ==========================================
// PENDING OPERATIONS
// ==========================================

fn parse_operation_id(raw: &str) -> Result<Uuid, HttpResponse> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        HttpResponse::BadRequest().json(ApiResponse::<()>::error(
            "INVALID_OPERATION_ID",
            &format!("Invalid operation id: {}", raw),
        ))
    })
}

/// Get a pending operation.
///
/// ## Endpoint
///
/// `GET /vault/operations/{id}`
pub async fn get_operation(state: web::Data<Arc<AppState>>, path: web::Path<String>) -> HttpResponse {
    let id = match parse_operation_id(&path) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.sessions.pending_operation(&id).await {
        Some(operation) => HttpResponse::Ok().json(ApiResponse::success(operation)),
        None => action_error_response(&ActionError::Session(SessionError::OperationNotFound(id))),
    }
}

/// Submit a pending operation with the owner's signature.
///
/// ## Endpoint
///
/// `POST /vault/operations/{id}/submit`
///
/// ## Request Body
///
/// ```json
/// { "signature": "0x...65 bytes..." }
/// ```
pub async fn submit_operation(
    state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    body: web::Json<SubmitOperationRequest>,
) -> HttpResponse {
    let id = match parse_operation_id(&path) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.sessions.submit(&id, &body.signature).await {
        Ok(user_op_hash) => HttpResponse::Ok().json(ApiResponse::success(SubmitResponse {
            operation_id: id,
            user_op_hash,
        })),
        Err(e) => action_error_response(&ActionError::Session(e)),
    }
}

/// Inclusion receipt for a submitted operation.
///
/// ## Endpoint
///
/// `GET /vault/operations/receipt/{hash}`
pub async fn get_receipt(state: web::Data<Arc<AppState>>, path: web::Path<String>) -> HttpResponse {
    let user_op_hash = path.into_inner();

    match state.sessions.receipt(&user_op_hash).await {
        Ok(receipt) => HttpResponse::Ok().json(ApiResponse::success(ReceiptResponse {
            included: receipt.is_some(),
            user_op_hash,
            receipt,
        })),
        Err(e) => action_error_response(&ActionError::Session(e)),
    }
}
