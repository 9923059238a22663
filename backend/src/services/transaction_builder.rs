//! # Transaction Builder Service
//!
//! Turns user actions into call descriptors and calldata.
//!
//! ## Two Kinds of Output
//!
//! ```text
//! Quarantine (main wallet pays)       Swap / Withdraw / Send (Vault pays)
//! ─────────────────────────────       ───────────────────────────────────
//! UnsignedTransaction                 CallDescriptor[]
//!   to:    token                        ↓
//!   data:  transfer(vault, bal)       SimpleAccount.execute / executeBatch
//!   value: 0                            ↓
//!        ↓                            UserOperation.callData
//! wallet signs and sends
//! ```
//!
//! Nothing here touches the network; everything is deterministic and
//! unit-tested.

use serde::{Deserialize, Serialize};

use crate::eth::abi::{encode_approve, encode_execute, encode_execute_batch, encode_transfer};
use crate::eth::primitives::{serde_bytes_hex, serde_quantity};
use crate::eth::units::{format_ether, parse_ether};
use crate::eth::{Address, U256};

use super::swap_quote::SwapQuote;

/// Errors that can occur when building calls.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BuildError {
    /// Nothing to do.
    #[error("No calls to execute")]
    NoCalls,

    /// `executeBatch` on a v0.6 SimpleAccount cannot forward ETH.
    #[error("Batched calls cannot carry ETH value")]
    BatchWithValue,

    /// The amount to move is zero.
    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Vault balance is empty")]
    EmptyVault,

    #[error("Percentage must be between 1 and 100, got {0}")]
    InvalidPercentage(u32),

    /// A 100% withdrawal would not leave enough for gas.
    #[error("ETH balance ({amount}) is not enough to cover gas (~${buffer_usd})")]
    InsufficientForGas { amount: String, buffer_usd: f64 },

    /// The quote has no executable transaction.
    #[error("Quote contains no transaction")]
    MissingTransaction,

    #[error("Invalid ETH price: {0}")]
    InvalidPrice(f64),

    /// The arithmetic left 256 bits.
    #[error("Amount too large")]
    Overflow,
}

/// One call inside a transaction or UserOperation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallDescriptor {
    pub to: Address,

    #[serde(with = "serde_quantity")]
    pub value: U256,

    #[serde(with = "serde_bytes_hex")]
    pub data: Vec<u8>,
}

impl CallDescriptor {
    pub fn new(to: Address, value: U256, data: Vec<u8>) -> Self {
        Self { to, value, data }
    }
}

/// A plain transaction for the owner's wallet to sign and send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnsignedTransaction {
    pub to: Address,

    #[serde(with = "serde_bytes_hex")]
    pub data: Vec<u8>,

    #[serde(with = "serde_quantity")]
    pub value: U256,

    pub chain_id: u64,
}

/// `token.transfer(vault, balance)` from the owner's wallet.
pub fn quarantine_transaction(
    token: &Address,
    vault: &Address,
    balance: U256,
    chain_id: u64,
) -> Result<UnsignedTransaction, BuildError> {
    if balance.is_zero() {
        return Err(BuildError::ZeroAmount);
    }
    Ok(UnsignedTransaction {
        to: *token,
        data: encode_transfer(vault, balance),
        value: U256::ZERO,
        chain_id,
    })
}

/// Calls for a swap: optional `approve`, then the quoted transaction.
pub fn swap_calls(
    quote: &SwapQuote,
    sell_token: &Address,
    sell_amount: U256,
) -> Result<Vec<CallDescriptor>, BuildError> {
    let tx = quote.transaction.as_ref().ok_or(BuildError::MissingTransaction)?;

    let mut calls = Vec::with_capacity(2);
    if let Some(allowance) = &quote.issues.allowance {
        calls.push(CallDescriptor::new(
            *sell_token,
            U256::ZERO,
            encode_approve(&allowance.spender, sell_amount),
        ));
    }
    calls.push(CallDescriptor::new(tx.to, tx.value, tx.data.clone()));
    Ok(calls)
}

/// Plain ETH transfer out of the Vault.
pub fn eth_transfer_call(recipient: &Address, amount: U256) -> Result<CallDescriptor, BuildError> {
    if amount.is_zero() {
        return Err(BuildError::ZeroAmount);
    }
    Ok(CallDescriptor::new(*recipient, amount, Vec::new()))
}

/// ERC-20 transfer out of the Vault.
pub fn token_transfer_call(token: &Address, recipient: &Address, amount: U256) -> Result<CallDescriptor, BuildError> {
    if amount.is_zero() {
        return Err(BuildError::ZeroAmount);
    }
    Ok(CallDescriptor::new(*token, U256::ZERO, encode_transfer(recipient, amount)))
}

/// SimpleAccount calldata for `calls`.
///
/// One call uses `execute(dest, value, func)`; several use
/// `executeBatch(dest[], func[])`, which has no value parameter.
pub fn encode_account_call_data(calls: &[CallDescriptor]) -> Result<Vec<u8>, BuildError> {
    match calls {
        [] => Err(BuildError::NoCalls),
        [single] => Ok(encode_execute(&single.to, single.value, &single.data)),
        many => {
            if many.iter().any(|c| !c.value.is_zero()) {
                return Err(BuildError::BatchWithValue);
            }
            let dests: Vec<Address> = many.iter().map(|c| c.to).collect();
            let funcs: Vec<Vec<u8>> = many.iter().map(|c| c.data.clone()).collect();
            Ok(encode_execute_batch(&dests, &funcs))
        }
    }
}

/// `buffer_usd` worth of ETH in wei at `eth_price_usd`.
pub fn gas_buffer_wei(buffer_usd: f64, eth_price_usd: f64) -> Result<U256, BuildError> {
    if !(eth_price_usd.is_finite() && eth_price_usd > 0.0) {
        return Err(BuildError::InvalidPrice(eth_price_usd));
    }
    let ether = buffer_usd / eth_price_usd;
    parse_ether(&format!("{:.18}", ether)).map_err(|_| BuildError::InvalidPrice(eth_price_usd))
}

/// Amount for a percentage withdrawal of `balance`.
///
/// At 100% the gas buffer stays behind; if the balance does not exceed
/// the buffer the withdrawal is refused.
pub fn withdrawal_amount(
    balance: U256,
    percentage: u32,
    buffer_wei: U256,
    buffer_usd: f64,
) -> Result<U256, BuildError> {
    if balance.is_zero() {
        return Err(BuildError::EmptyVault);
    }
    if !(1..=100).contains(&percentage) {
        return Err(BuildError::InvalidPercentage(percentage));
    }

    let mut amount = balance
        .checked_mul(U256::from(percentage))
        .ok_or(BuildError::Overflow)?
        / U256::from(100u64);

    if percentage == 100 {
        if amount > buffer_wei {
            amount -= buffer_wei;
        } else {
            return Err(BuildError::InsufficientForGas {
                amount: format_ether(amount),
                buffer_usd,
            });
        }
    }

    if amount.is_zero() {
        return Err(BuildError::ZeroAmount);
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eth::abi::{ISimpleAccount, IERC20};
    use crate::eth::constants::WETH;
    use alloy_sol_types::SolCall;
    use crate::services::swap_quote::{AllowanceIssue, QuoteIssues, QuoteTransaction};

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    fn ether(n: &str) -> U256 {
        parse_ether(n).unwrap()
    }

    #[test]
    fn quarantine_is_a_token_transfer() {
        let tx = quarantine_transaction(&addr(1), &addr(2), U256::from(500u64), 8453).unwrap();
        assert_eq!(tx.to, addr(1));
        assert_eq!(tx.value, U256::ZERO);
        assert_eq!(&tx.data[..4], &IERC20::transferCall::SELECTOR);

        let json = serde_json::to_value(&tx).unwrap();
        assert_eq!(json["chainId"], 8453);
        assert_eq!(json["value"], "0x0");
    }

    #[test]
    fn quarantine_rejects_zero_balance() {
        assert_eq!(
            quarantine_transaction(&addr(1), &addr(2), U256::ZERO, 8453),
            Err(BuildError::ZeroAmount)
        );
    }

    #[test]
    fn swap_prepends_approve_when_allowance_missing() {
        let quote = SwapQuote {
            transaction: Some(QuoteTransaction {
                to: addr(9),
                data: vec![1, 2, 3],
                value: U256::ZERO,
                gas: None,
            }),
            issues: QuoteIssues {
                allowance: Some(AllowanceIssue { spender: addr(9), actual: None }),
            },
            buy_amount: None,
            liquidity_available: Some(true),
        };

        let calls = swap_calls(&quote, &addr(5), U256::from(77u64)).unwrap();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].to, addr(5));
        assert_eq!(&calls[0].data[..4], &IERC20::approveCall::SELECTOR);
        assert_eq!(calls[1].data, vec![1, 2, 3]);
    }

    #[test]
    fn swap_without_transaction_fails() {
        let quote = SwapQuote {
            transaction: None,
            issues: QuoteIssues::default(),
            buy_amount: None,
            liquidity_available: Some(false),
        };
        assert_eq!(swap_calls(&quote, &WETH, U256::from(1u64)), Err(BuildError::MissingTransaction));
    }

    #[test]
    fn account_call_data_picks_execute_or_batch() {
        let single = encode_account_call_data(&[CallDescriptor::new(addr(1), U256::from(5u64), vec![])]).unwrap();
        assert_eq!(&single[..4], &ISimpleAccount::executeCall::SELECTOR);

        let calls = vec![
            CallDescriptor::new(addr(1), U256::ZERO, vec![0xaa]),
            CallDescriptor::new(addr(2), U256::ZERO, vec![0xbb]),
        ];
        let batch = encode_account_call_data(&calls).unwrap();
        assert_eq!(&batch[..4], &ISimpleAccount::executeBatchCall::SELECTOR);

        assert_eq!(encode_account_call_data(&[]), Err(BuildError::NoCalls));
    }

    #[test]
    fn batch_with_value_is_rejected() {
        let calls = vec![
            CallDescriptor::new(addr(1), U256::ZERO, vec![0xaa]),
            CallDescriptor::new(addr(2), U256::from(1u64), vec![]),
        ];
        assert_eq!(encode_account_call_data(&calls), Err(BuildError::BatchWithValue));
    }

    #[test]
    fn gas_buffer_at_fallback_price() {
        // $0.5 at $3200/ETH = 0.00015625 ETH
        assert_eq!(gas_buffer_wei(0.5, 3200.0).unwrap(), ether("0.00015625"));
        assert!(gas_buffer_wei(0.5, 0.0).is_err());
        assert!(gas_buffer_wei(0.5, f64::NAN).is_err());
    }

    #[test]
    fn full_withdrawal_leaves_gas_buffer() {
        let balance = ether("0.01");
        let buffer = gas_buffer_wei(0.5, 3200.0).unwrap();
        let amount = withdrawal_amount(balance, 100, buffer, 0.5).unwrap();
        assert!(amount < balance);
        assert_eq!(amount, balance - buffer);
    }

    #[test]
    fn partial_withdrawal_ignores_buffer() {
        let amount = withdrawal_amount(ether("1"), 25, ether("0.5"), 0.5).unwrap();
        assert_eq!(amount, ether("0.25"));
    }

    #[test]
    fn withdrawal_edge_cases() {
        let buffer = ether("0.001");
        assert_eq!(withdrawal_amount(U256::ZERO, 100, buffer, 0.5), Err(BuildError::EmptyVault));
        assert_eq!(withdrawal_amount(ether("1"), 0, buffer, 0.5), Err(BuildError::InvalidPercentage(0)));
        assert_eq!(withdrawal_amount(ether("1"), 101, buffer, 0.5), Err(BuildError::InvalidPercentage(101)));
        assert_eq!(
            withdrawal_amount(ether("0.001"), 100, buffer, 0.5),
            Err(BuildError::InsufficientForGas { amount: "0.001".to_string(), buffer_usd: 0.5 })
        );
        // 1 wei at 50% rounds down to nothing
        assert_eq!(withdrawal_amount(U256::from(1u64), 50, buffer, 0.5), Err(BuildError::ZeroAmount));
    }

    #[test]
    fn withdrawal_of_huge_balance_reports_overflow() {
        assert_eq!(withdrawal_amount(U256::MAX, 50, U256::ZERO, 0.5), Err(BuildError::Overflow));
        // a 1% share of the same balance still fits
        assert_eq!(withdrawal_amount(U256::MAX, 1, U256::ZERO, 0.5), Ok(U256::MAX / U256::from(100u64)));
    }

    #[test]
    fn send_calls() {
        let eth = eth_transfer_call(&addr(3), ether("0.1")).unwrap();
        assert!(eth.data.is_empty());
        assert_eq!(eth.value, ether("0.1"));

        let usdc = token_transfer_call(&addr(4), &addr(3), U256::from(1_000_000u64)).unwrap();
        assert_eq!(usdc.to, addr(4));
        assert_eq!(usdc.value, U256::ZERO);
        assert!(eth_transfer_call(&addr(3), U256::ZERO).is_err());
    }
}
