//! # Vault Manager Service
//!
//! The VaultManager is the central service for Vault actions.
//! It coordinates between the chain node, the swap aggregator, the token
//! scanner and the session manager.
//!
//! ## Responsibilities
//!
//! - Connect owners to their Vault
//! - Build quarantine transfers (main wallet → Vault)
//! - Prepare swaps, withdrawals and sends as sponsored UserOperations
//! - Query Vault balances
//!
//! ## Flow Example: Withdraw
//!
//! ```text
//! 1. User requests withdraw via API
//!                ↓
//! 2. VaultManager.withdraw() called
//!                ↓
//! 3. Vault ETH balance read from chain
//!                ↓
//! 4. 100%? → ETH price quote → gas buffer kept back
//!                ↓
//! 5. execute(owner, amount, 0x) prepared as UserOperation
//!                ↓
//! 6. Return userOpHash for the owner to sign
//! ```

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::eth::abi::{decode_balance_of, encode_balance_of};
use crate::eth::constants::USDC_DECIMALS;
use crate::eth::primitives::{self, parse_quantity_str};
use crate::eth::units::{format_ether, format_units, parse_ether, parse_units};
use crate::eth::{Address, ChainApi, RpcError, U256};
use crate::models::{
    OperationResponse, QuarantineRequest, QuarantineResponse, SendAsset, SendRequest, SwapRequest,
    VaultBalanceResponse, WithdrawRequest,
};

use super::swap_quote::{eth_price_usd, EthPrice, QuoteApi, QuoteError, QuoteRequest};
use super::token_scanner::{ScanError, TokenScanner};
use super::transaction_builder::{
    eth_transfer_call, gas_buffer_wei, quarantine_transaction, swap_calls, token_transfer_call,
    withdrawal_amount, BuildError,
};
use super::vault_session::{SessionError, VaultSession, VaultSessionManager};

/// Aggregator reason for a token nobody will buy.
const INSUFFICIENT_ASSET_LIQUIDITY: &str = "INSUFFICIENT_ASSET_LIQUIDITY";

/// Errors that can occur in Vault actions.
#[derive(Debug, thiserror::Error)]
pub enum ActionError {
    /// Address failed to parse.
    #[error("Invalid address for {field}: {value}")]
    InvalidAddress { field: &'static str, value: String },

    /// Amount failed to parse or is zero.
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// The client wallet is on another chain.
    #[error("Wrong chain: expected {expected}, got {actual}")]
    WrongChain { expected: u64, actual: u64 },

    /// The aggregator refused to quote.
    #[error("{message}")]
    QuoteRejected { status: u16, message: String },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Chain RPC failed: {0}")]
    Chain(#[from] RpcError),

    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error(transparent)]
    Scan(#[from] ScanError),
}

impl ActionError {
    /// Error code for the API envelope.
    pub fn code(&self) -> &'static str {
        match self {
            ActionError::InvalidAddress { .. } => "INVALID_ADDRESS",
            ActionError::InvalidAmount(_) => "INVALID_AMOUNT",
            ActionError::WrongChain { .. } => "WRONG_CHAIN",
            ActionError::QuoteRejected { .. } => "QUOTE_REJECTED",
            ActionError::Build(e) => match e {
                BuildError::EmptyVault => "EMPTY_VAULT",
                BuildError::InvalidPercentage(_) => "INVALID_PERCENTAGE",
                BuildError::InsufficientForGas { .. } => "INSUFFICIENT_FOR_GAS",
                BuildError::ZeroAmount | BuildError::Overflow => "INVALID_AMOUNT",
                BuildError::MissingTransaction => "INVALID_QUOTE",
                BuildError::NoCalls | BuildError::BatchWithValue => "INVALID_CALLS",
                BuildError::InvalidPrice(_) => "INVALID_PRICE",
            },
            ActionError::Session(e) => match e {
                SessionError::NotConnected(_) => "NOT_CONNECTED",
                SessionError::OperationNotFound(_) => "OPERATION_NOT_FOUND",
                SessionError::OperationExpired(_) => "OPERATION_EXPIRED",
                SessionError::InvalidSignature(_) => "INVALID_SIGNATURE",
                SessionError::Build(_) => "INVALID_CALLS",
                SessionError::ExpiryOutOfRange => "INTERNAL_ERROR",
                _ => "UPSTREAM_ERROR",
            },
            ActionError::Chain(_) | ActionError::Quote(_) | ActionError::Scan(_) => "UPSTREAM_ERROR",
        }
    }
}

/// Parse a user-supplied address, tagging failures with the field name.
pub fn parse_address(field: &'static str, value: &str) -> Result<Address, ActionError> {
    primitives::parse_address(value).map_err(|_| ActionError::InvalidAddress {
        field,
        value: value.to_string(),
    })
}

/// User-facing text for an aggregator failure.
pub fn quote_failure_message(reason: Option<&str>) -> String {
    match reason {
        Some(INSUFFICIENT_ASSET_LIQUIDITY) => "Insufficient liquidity for this token".to_string(),
        Some(reason) => reason.to_string(),
        None => "Failed to fetch swap route".to_string(),
    }
}

/// The main service for Vault actions.
///
/// ## Usage
///
/// ```rust,ignore
/// let manager = VaultManager::new(config, chain, quotes, scanner, sessions);
///
/// // Prepare a full withdrawal
/// let op = manager.withdraw(request).await?;
/// ```
pub struct VaultManager {
    config: AppConfig,
    chain: Arc<dyn ChainApi>,
    quotes: Arc<dyn QuoteApi>,
    scanner: Arc<TokenScanner>,
    sessions: Arc<VaultSessionManager>,
}

impl VaultManager {
    pub fn new(
        config: AppConfig,
        chain: Arc<dyn ChainApi>,
        quotes: Arc<dyn QuoteApi>,
        scanner: Arc<TokenScanner>,
        sessions: Arc<VaultSessionManager>,
    ) -> Self {
        Self {
            config,
            chain,
            quotes,
            scanner,
            sessions,
        }
    }

    fn check_chain(&self, chain_id: Option<u64>) -> Result<(), ActionError> {
        match chain_id {
            Some(actual) if actual != self.config.chain_id => Err(ActionError::WrongChain {
                expected: self.config.chain_id,
                actual,
            }),
            _ => Ok(()),
        }
    }

    /// Connect the owner and return the session (created on demand).
    async fn vault_for(&self, owner: &Address) -> Result<VaultSession, ActionError> {
        Ok(self.sessions.connect(owner).await?)
    }

    // ==========================================
    // VAULT QUERIES
    // ==========================================

    /// ETH balance and tokens held by the owner's Vault.
    pub async fn get_vault_balance(&self, owner: &str) -> Result<VaultBalanceResponse, ActionError> {
        let owner = parse_address("owner", owner)?;
        let session = self.vault_for(&owner).await?;
        let wei = self.chain.get_balance(&session.vault_address).await?;
        let tokens = self.scanner.scan(&session.vault_address).await?;

        debug!("Vault {} holds {} wei and {} tokens", session.vault_address, wei, tokens.len());
        Ok(VaultBalanceResponse {
            owner,
            vault_address: session.vault_address,
            eth_balance: wei.to_string(),
            formatted_eth: format!("{} ETH", format_ether(wei)),
            tokens,
        })
    }

    /// Current ETH price, quoted as 1 ETH → USDC.
    pub async fn eth_price(&self, taker: Option<&str>) -> Result<EthPrice, ActionError> {
        let taker = match taker {
            Some(t) => parse_address("taker", t)?,
            None => self.config.fee_recipient,
        };
        Ok(self.price_for(&taker).await)
    }

    async fn price_for(&self, taker: &Address) -> EthPrice {
        eth_price_usd(
            self.quotes.as_ref(),
            &self.config.usdc,
            taker,
            self.config.fallback_eth_price_usd,
        )
        .await
    }

    // ==========================================
    // VAULT OPERATIONS
    // ==========================================

    /// Build the main-wallet transfer that moves a token into the Vault.
    ///
    /// Without an explicit balance the owner's whole balance is moved.
    pub async fn quarantine(&self, request: QuarantineRequest) -> Result<QuarantineResponse, ActionError> {
        self.check_chain(request.chain_id)?;
        let owner = parse_address("owner", &request.owner)?;
        let token = parse_address("token", &request.token)?;
        let session = self.vault_for(&owner).await?;

        let balance = match request.balance.as_deref() {
            Some(raw) => parse_quantity_str(raw).map_err(|e| ActionError::InvalidAmount(e.to_string()))?,
            None => self.token_balance(&token, &owner).await?,
        };

        let transaction = quarantine_transaction(&token, &session.vault_address, balance, self.config.chain_id)?;
        info!("🧹 Quarantine {} of {} → vault {}", balance, token, session.vault_address);

        Ok(QuarantineResponse {
            vault_address: session.vault_address,
            transaction,
            message: "Sign and send this transaction from your wallet".to_string(),
        })
    }

    async fn token_balance(&self, token: &Address, holder: &Address) -> Result<U256, ActionError> {
        let ret = self.chain.call(token, &encode_balance_of(holder)).await?;
        decode_balance_of(&ret).map_err(|e| ActionError::Chain(RpcError::InvalidResponse(e.to_string())))
    }

    /// Quote a swap for the Vault and prepare the batched operation.
    pub async fn swap(&self, request: SwapRequest) -> Result<OperationResponse, ActionError> {
        self.check_chain(request.chain_id)?;
        let owner = parse_address("owner", &request.owner)?;
        let sell_token = parse_address("sellToken", &request.sell_token)?;
        let buy_token = match request.buy_token.as_deref() {
            Some(b) => parse_address("buyToken", b)?,
            None => self.config.weth,
        };
        let sell_amount = parse_quantity_str(&request.sell_amount)
            .map_err(|e| ActionError::InvalidAmount(e.to_string()))?;
        if sell_amount.is_zero() {
            return Err(ActionError::InvalidAmount("sell amount must be greater than zero".to_string()));
        }

        let session = self.vault_for(&owner).await?;
        let response = self
            .quotes
            .quote(&QuoteRequest::new(&sell_token, &buy_token, sell_amount, &session.vault_address))
            .await?;

        if !response.is_success() {
            let reason = response.reason();
            warn!("Swap quote rejected ({}): {:?}", response.status, reason);
            return Err(ActionError::QuoteRejected {
                status: response.status,
                message: quote_failure_message(reason.as_deref()),
            });
        }

        let quote = response.quote()?;
        let calls = swap_calls(&quote, &sell_token, sell_amount)?;
        let operation = self.sessions.prepare(&owner, &calls, "swap").await?;

        Ok(OperationResponse {
            amount: quote.buy_amount.map(|a| a.to_string()),
            operation,
            message: format!("Sign to swap {} via the Vault", sell_token),
        })
    }

    /// Prepare a percentage withdrawal of the Vault's ETH to the owner.
    pub async fn withdraw(&self, request: WithdrawRequest) -> Result<OperationResponse, ActionError> {
        self.check_chain(request.chain_id)?;
        let owner = parse_address("owner", &request.owner)?;
        let session = self.vault_for(&owner).await?;

        let balance = self.chain.get_balance(&session.vault_address).await?;
        if balance.is_zero() {
            return Err(BuildError::EmptyVault.into());
        }
        if !(1..=100).contains(&request.percentage) {
            return Err(BuildError::InvalidPercentage(request.percentage).into());
        }

        let buffer = if request.percentage == 100 {
            let price = self.price_for(&session.vault_address).await;
            if price.fallback {
                warn!("Using fallback ETH price ${}", price.usd);
            }
            gas_buffer_wei(self.config.gas_buffer_usd, price.usd)?
        } else {
            U256::ZERO
        };

        let amount = withdrawal_amount(balance, request.percentage, buffer, self.config.gas_buffer_usd)?;
        let call = eth_transfer_call(&owner, amount)?;
        let operation = self.sessions.prepare(&owner, &[call], "withdraw").await?;

        let formatted = format_ether(amount);
        info!("💸 Withdraw {}% = {} ETH from vault {}", request.percentage, formatted, session.vault_address);
        Ok(OperationResponse {
            operation,
            message: format!("Sign to withdraw {} ETH", formatted),
            amount: Some(formatted),
        })
    }

    /// Prepare an ETH or USDC transfer out of the Vault.
    pub async fn send(&self, request: SendRequest) -> Result<OperationResponse, ActionError> {
        self.check_chain(request.chain_id)?;
        let owner = parse_address("owner", &request.owner)?;
        let recipient = parse_address("recipient", &request.recipient)?;
        self.vault_for(&owner).await?;

        let (call, display) = match request.asset {
            SendAsset::Eth => {
                let wei = parse_ether(&request.amount).map_err(|e| ActionError::InvalidAmount(e.to_string()))?;
                (eth_transfer_call(&recipient, wei)?, format!("{} ETH", format_ether(wei)))
            }
            SendAsset::Usdc => {
                let units = parse_units(&request.amount, USDC_DECIMALS)
                    .map_err(|e| ActionError::InvalidAmount(e.to_string()))?;
                (
                    token_transfer_call(&self.config.usdc, &recipient, units)?,
                    format!("{} USDC", format_units(units, USDC_DECIMALS)),
                )
            }
        };

        let operation = self.sessions.prepare(&owner, &[call], "send").await?;
        Ok(OperationResponse {
            operation,
            message: format!("Sign to send {} to {}", display, recipient),
            amount: Some(display),
        })
    }
}
