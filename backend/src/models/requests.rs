//! # API Request Models
//!
//! Structures for incoming API request bodies and query strings.
//! Addresses and amounts arrive as strings and are validated by the
//! service that consumes them.

use serde::{Deserialize, Serialize};

/// Request to connect (or disconnect) an owner's Vault.
///
/// ## Example JSON
///
/// ```json
/// {
///     "owner": "0x4fba95e4772be6d37a0c931D00570Fe2c9675524"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectRequest {
    /// The owner's main wallet address.
    pub owner: String,
}

/// Request to move a token from the main wallet into the Vault.
///
/// ## Example JSON
///
/// ```json
/// {
///     "owner": "0x4fba...5524",
///     "token": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913",
///     "balance": "1500000",
///     "chainId": 8453
/// }
/// ```
///
/// ## Notes
///
/// - `balance` is in raw units; when omitted the owner's full on-chain
///   balance of `token` is used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuarantineRequest {
    pub owner: String,

    /// ERC-20 token contract.
    pub token: String,

    /// Raw amount to move (decimal or 0x string).
    pub balance: Option<String>,

    /// Chain the client wallet is on.
    pub chain_id: Option<u64>,
}

/// Request to swap a token held by the Vault.
///
/// ## Example JSON
///
/// ```json
/// {
///     "owner": "0x4fba...5524",
///     "sellToken": "0xabc...",
///     "sellAmount": "1000000000000000000",
///     "buyToken": "0x4200000000000000000000000000000000000006"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest {
    pub owner: String,

    pub sell_token: String,

    /// Raw amount of `sell_token`.
    pub sell_amount: String,

    /// Defaults to WETH.
    pub buy_token: Option<String>,

    pub chain_id: Option<u64>,
}

/// Request to withdraw ETH from the Vault to the owner.
///
/// ## Example JSON
///
/// ```json
/// {
///     "owner": "0x4fba...5524",
///     "percentage": 100
/// }
/// ```
///
/// ## Notes
///
/// - `percentage` must be 1..=100.
/// - At 100% a small gas reserve stays in the Vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawRequest {
    pub owner: String,

    pub percentage: u32,

    pub chain_id: Option<u64>,
}

/// Asset sent by [`SendRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendAsset {
    Eth,
    Usdc,
}

/// Request to send ETH or USDC from the Vault.
///
/// ## Example JSON
///
/// ```json
/// {
///     "owner": "0x4fba...5524",
///     "recipient": "0x1234...",
///     "amount": "0.01",
///     "asset": "eth"
/// }
/// ```
///
/// `amount` is human-readable (`"0.01"` ETH, `"2.5"` USDC).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub owner: String,
    pub recipient: String,
    pub amount: String,
    pub asset: SendAsset,
    pub chain_id: Option<u64>,
}

/// Owner's signature over a pending operation's `userOpHash`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOperationRequest {
    /// 65-byte hex signature.
    pub signature: String,
}

/// Query string of `GET /scan/{address}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanQuery {
    /// Keep only tokens with enough liquidity to swap.
    #[serde(default)]
    pub swappable: Option<bool>,
}

/// Query string of `GET /api/webhook/swap`.
///
/// Every field is optional here so the handler can answer a missing one
/// with its own error body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapQuoteQuery {
    pub sell_token: Option<String>,
    pub sell_amount: Option<String>,
    pub taker: Option<String>,
    pub taker_address: Option<String>,
    pub buy_token: Option<String>,
}

impl SwapQuoteQuery {
    /// `taker`, falling back to `takerAddress`.
    pub fn effective_taker(&self) -> Option<&str> {
        let present = |t: &&str| !t.trim().is_empty();
        self.taker
            .as_deref()
            .filter(present)
            .or_else(|| self.taker_address.as_deref().filter(present))
    }
}

/// Query string of `GET /vault/eth-price`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EthPriceQuery {
    /// Address used as the quote taker; defaults to the fee recipient.
    pub taker: Option<String>,
}
