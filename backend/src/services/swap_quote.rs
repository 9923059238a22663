//! # Swap Quote Service
//!
//! Client for the 0x v2 allowance-holder quote API.
//!
//! ## Request
//!
//! ```text
//! GET {ZERO_EX_BASE_URL}/swap/allowance-holder/quote
//!     ?chainId=8453&sellToken=..&buyToken=..&sellAmount=..&taker=..
//!     &swapFeeRecipient=..&swapFeeBps=500&swapFeeToken=<buyToken>
//! 0x-api-key: <key>
//! 0x-version: v2
//! ```
//!
//! The raw body and status are kept so the relay route can pass them
//! through untouched; [`SwapQuote`] is the typed view the swap action reads.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::eth::constants::{NATIVE_TOKEN, USDC_DECIMALS};
use crate::eth::primitives::{serde_bytes_hex, serde_quantity, serde_quantity_opt};
use crate::eth::units::{format_units, parse_ether};
use crate::eth::{Address, AddressExt, U256};

/// Errors from the quote API.
#[derive(Debug, thiserror::Error)]
pub enum QuoteError {
    #[error("swap quotes are not configured")]
    NotConfigured,

    #[error("Failed to fetch quote: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid quote response: {0}")]
    InvalidResponse(String),
}

/// Query parameters for one quote.
///
/// Fields stay as strings so the relay route forwards exactly what the
/// client sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteRequest {
    pub sell_token: String,
    pub buy_token: String,
    pub sell_amount: String,
    pub taker: String,
}

impl QuoteRequest {
    pub fn new(sell_token: &Address, buy_token: &Address, sell_amount: U256, taker: &Address) -> Self {
        Self {
            sell_token: sell_token.to_lower_hex(),
            buy_token: buy_token.to_lower_hex(),
            sell_amount: sell_amount.to_string(),
            taker: taker.to_lower_hex(),
        }
    }
}

/// Upstream status plus body.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteResponse {
    pub status: u16,
    pub body: Value,
}

impl QuoteResponse {
    /// Wrap a raw upstream answer. A body that is not JSON (an HTML error
    /// page from a proxy, say) is kept as `{"error": <text>}` so the status
    /// still reaches the caller.
    pub fn from_raw(status: u16, body: &[u8]) -> Self {
        let body = serde_json::from_slice(body)
            .unwrap_or_else(|_| json!({ "error": String::from_utf8_lossy(body).trim() }));
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Typed view of a successful body.
    pub fn quote(&self) -> Result<SwapQuote, QuoteError> {
        serde_json::from_value(self.body.clone()).map_err(|e| QuoteError::InvalidResponse(e.to_string()))
    }

    /// The aggregator's failure reason, if it gave one.
    pub fn reason(&self) -> Option<String> {
        ["reason", "message", "name"]
            .iter()
            .find_map(|key| self.body.get(*key).and_then(Value::as_str))
            .map(String::from)
    }
}

/// Call to execute for a swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteTransaction {
    pub to: Address,

    #[serde(with = "serde_bytes_hex", default)]
    pub data: Vec<u8>,

    #[serde(with = "serde_quantity", default)]
    pub value: U256,

    #[serde(with = "serde_quantity_opt", default)]
    pub gas: Option<U256>,
}

/// Outstanding allowance the taker must grant first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowanceIssue {
    pub spender: Address,

    #[serde(with = "serde_quantity_opt", default)]
    pub actual: Option<U256>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteIssues {
    #[serde(default)]
    pub allowance: Option<AllowanceIssue>,
}

/// Typed view over an aggregator quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuote {
    #[serde(default)]
    pub transaction: Option<QuoteTransaction>,

    #[serde(default)]
    pub issues: QuoteIssues,

    #[serde(with = "serde_quantity_opt", default)]
    pub buy_amount: Option<U256>,

    #[serde(default)]
    pub liquidity_available: Option<bool>,
}

/// ETH price lookup result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EthPrice {
    pub usd: f64,
    pub fallback: bool,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait QuoteApi: Send + Sync {
    /// Fetch a quote; non-2xx answers are returned, not raised.
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError>;
}

/// 0x API client.
#[derive(Clone)]
pub struct ZeroExClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    chain_id: u64,
    fee_recipient: Address,
    fee_bps: u32,
    timeout: Duration,
}

impl ZeroExClient {
    pub fn new(
        http: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        chain_id: u64,
        fee_recipient: Address,
        fee_bps: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            chain_id,
            fee_recipient,
            fee_bps,
            timeout,
        }
    }

    /// Query string for `request`, fee parameters included.
    pub fn query_params(&self, request: &QuoteRequest) -> Vec<(&'static str, String)> {
        vec![
            ("chainId", self.chain_id.to_string()),
            ("sellToken", request.sell_token.clone()),
            ("buyToken", request.buy_token.clone()),
            ("sellAmount", request.sell_amount.clone()),
            ("taker", request.taker.clone()),
            ("swapFeeRecipient", self.fee_recipient.to_lower_hex()),
            ("swapFeeBps", self.fee_bps.to_string()),
            ("swapFeeToken", request.buy_token.clone()),
        ]
    }
}

#[async_trait]
impl QuoteApi for ZeroExClient {
    async fn quote(&self, request: &QuoteRequest) -> Result<QuoteResponse, QuoteError> {
        let api_key = self.api_key.as_ref().ok_or(QuoteError::NotConfigured)?;

        debug!(
            "Quote {} {} -> {} for {}",
            request.sell_amount, request.sell_token, request.buy_token, request.taker
        );

        let response = self
            .http
            .get(format!("{}/swap/allowance-holder/quote", self.base_url))
            .query(&self.query_params(request))
            .header("0x-api-key", api_key)
            .header("0x-version", "v2")
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok(QuoteResponse::from_raw(status, &body))
    }
}

/// Price of one ETH in USDC, via a 1 ETH -> USDC quote.
///
/// Any failure (transport, non-2xx, missing `buyAmount`) yields `fallback`.
pub async fn eth_price_usd(
    quotes: &dyn QuoteApi,
    usdc: &Address,
    taker: &Address,
    fallback: f64,
) -> EthPrice {
    let one_ether = parse_ether("1").unwrap_or_default();
    let request = QuoteRequest::new(&NATIVE_TOKEN, usdc, one_ether, taker);

    let price = match quotes.quote(&request).await {
        Ok(response) if response.is_success() => response
            .quote()
            .ok()
            .and_then(|q| q.buy_amount)
            .and_then(|amount| format_units(amount, USDC_DECIMALS).parse::<f64>().ok())
            .filter(|p| p.is_finite() && *p > 0.0),
        Ok(response) => {
            warn!("ETH price quote returned {}", response.status);
            None
        }
        Err(e) => {
            warn!("ETH price quote failed: {}", e);
            None
        }
    };

    match price {
        Some(usd) => EthPrice { usd, fallback: false },
        None => EthPrice { usd: fallback, fallback: true },
    }
}
