//! # ABI Encoding
//!
//! The contract calls this service makes, declared with `sol!`:
//! ERC-20 `transfer`/`approve`/`balanceOf`, SimpleAccount
//! `execute`/`executeBatch`, factory `getAddress`/`createAccount` and
//! EntryPoint `getNonce`.
//!
//! The builders return raw calldata; the decoders turn `eth_call` return
//! data back into typed values.

use alloy_primitives::aliases::U192;
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::{sol, SolCall};

use super::primitives::HexError;

sol! {
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function balanceOf(address owner) external view returns (uint256);
    }

    interface ISimpleAccount {
        function execute(address dest, uint256 value, bytes calldata func) external;
        function executeBatch(address[] calldata dest, bytes[] calldata func) external;
    }

    interface ISimpleAccountFactory {
        function getAddress(address owner, uint256 salt) external view returns (address);
        function createAccount(address owner, uint256 salt) external returns (address);
    }

    interface IEntryPoint {
        function getNonce(address sender, uint192 key) external view returns (uint256);
    }
}

fn decode_error(e: alloy_sol_types::Error) -> HexError {
    HexError::InvalidHex(format!("unexpected return data: {}", e))
}

// ==========================================
// CALL BUILDERS
// ==========================================

/// ERC-20 `transfer(address,uint256)`.
pub fn encode_transfer(to: &Address, amount: U256) -> Vec<u8> {
    IERC20::transferCall { to: *to, amount }.abi_encode()
}

/// ERC-20 `balanceOf(address)`.
pub fn encode_balance_of(holder: &Address) -> Vec<u8> {
    IERC20::balanceOfCall { owner: *holder }.abi_encode()
}

/// ERC-20 `approve(address,uint256)`.
pub fn encode_approve(spender: &Address, amount: U256) -> Vec<u8> {
    IERC20::approveCall { spender: *spender, amount }.abi_encode()
}

/// SimpleAccount `execute(address,uint256,bytes)`.
pub fn encode_execute(dest: &Address, value: U256, func: &[u8]) -> Vec<u8> {
    ISimpleAccount::executeCall {
        dest: *dest,
        value,
        func: Bytes::copy_from_slice(func),
    }
    .abi_encode()
}

/// SimpleAccount v0.6 `executeBatch(address[],bytes[])`.
pub fn encode_execute_batch(dests: &[Address], funcs: &[Vec<u8>]) -> Vec<u8> {
    ISimpleAccount::executeBatchCall {
        dest: dests.to_vec(),
        func: funcs.iter().map(|f| Bytes::copy_from_slice(f)).collect(),
    }
    .abi_encode()
}

/// SimpleAccountFactory `getAddress(address,uint256)`.
pub fn encode_get_address(owner: &Address, salt: U256) -> Vec<u8> {
    ISimpleAccountFactory::getAddressCall { owner: *owner, salt }.abi_encode()
}

/// SimpleAccountFactory `createAccount(address,uint256)`.
pub fn encode_create_account(owner: &Address, salt: U256) -> Vec<u8> {
    ISimpleAccountFactory::createAccountCall { owner: *owner, salt }.abi_encode()
}

/// EntryPoint `getNonce(address,uint192)`.
pub fn encode_get_nonce(sender: &Address, key: U192) -> Vec<u8> {
    IEntryPoint::getNonceCall { sender: *sender, key }.abi_encode()
}

// ==========================================
// RETURN DECODERS
// ==========================================

/// Return value of `balanceOf`.
pub fn decode_balance_of(data: &[u8]) -> Result<U256, HexError> {
    IERC20::balanceOfCall::abi_decode_returns(data, true)
        .map(|r| r._0)
        .map_err(decode_error)
}

/// Return value of the factory's `getAddress`.
pub fn decode_get_address(data: &[u8]) -> Result<Address, HexError> {
    ISimpleAccountFactory::getAddressCall::abi_decode_returns(data, true)
        .map(|r| r._0)
        .map_err(decode_error)
}

/// Return value of the EntryPoint's `getNonce`.
pub fn decode_get_nonce(data: &[u8]) -> Result<U256, HexError> {
    IEntryPoint::getNonceCall::abi_decode_returns(data, true)
        .map(|r| r._0)
        .map_err(decode_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eth::primitives::hex_encode;
    use alloy_sol_types::SolValue;

    fn addr(last: u8) -> Address {
        let mut bytes = [0u8; 20];
        bytes[19] = last;
        Address::new(bytes)
    }

    fn word(data: &[u8], index: usize) -> U256 {
        U256::from_be_slice(&data[index * 32..index * 32 + 32])
    }

    #[test]
    fn erc20_selectors() {
        assert_eq!(hex_encode(IERC20::transferCall::SELECTOR), "0xa9059cbb");
        assert_eq!(hex_encode(IERC20::approveCall::SELECTOR), "0x095ea7b3");
        assert_eq!(hex_encode(IERC20::balanceOfCall::SELECTOR), "0x70a08231");
    }

    #[test]
    fn account_selectors() {
        assert_eq!(hex_encode(ISimpleAccount::executeCall::SELECTOR), "0xb61d27f6");
        assert_eq!(hex_encode(ISimpleAccount::executeBatchCall::SELECTOR), "0x18dfb3c7");
        assert_eq!(hex_encode(IEntryPoint::getNonceCall::SELECTOR), "0x35567e1a");
        assert_eq!(hex_encode(ISimpleAccountFactory::createAccountCall::SELECTOR), "0x5fbfb9cf");
    }

    #[test]
    fn transfer_layout() {
        let data = encode_transfer(&addr(0xaa), U256::from(1000u64));
        assert_eq!(data.len(), 4 + 64);
        assert_eq!(data[4 + 31], 0xaa);
        assert_eq!(&data[4..4 + 12], &[0u8; 12]);
        assert_eq!(word(&data[4..], 1), U256::from(1000u64));
    }

    #[test]
    fn execute_pads_dynamic_bytes() {
        let data = encode_execute(&addr(1), U256::from(5u64), &[0xde, 0xad, 0xbe, 0xef]);
        // selector + dest + value + offset + length + one padded word
        assert_eq!(data.len(), 4 + 32 * 5);
        assert_eq!(word(&data[4..], 2), U256::from(96u64));
        assert_eq!(word(&data[4..], 3), U256::from(4u64));
        assert_eq!(&data[4 + 128..4 + 132], &[0xde, 0xad, 0xbe, 0xef]);
        assert!(data[4 + 132..].iter().all(|b| *b == 0));
    }

    #[test]
    fn execute_with_empty_bytes() {
        let data = encode_execute(&addr(1), U256::from(1u64), &[]);
        assert_eq!(data.len(), 4 + 32 * 4);
        assert_eq!(word(&data[4..], 3), U256::ZERO);
    }

    #[test]
    fn execute_batch_layout() {
        let data = encode_execute_batch(&[addr(1), addr(2)], &[vec![0x11], vec![0x22, 0x33]]);
        let body = &data[4..];

        // heads: offset of address[] then offset of bytes[]
        assert_eq!(word(body, 0), U256::from(64u64));
        assert_eq!(word(body, 1), U256::from(160u64));
        // address[]: length word + 2 words
        assert_eq!(word(body, 2), U256::from(2u64));
        assert_eq!(&body[3 * 32 + 12..4 * 32], addr(1).as_slice());
        assert_eq!(&body[4 * 32 + 12..5 * 32], addr(2).as_slice());

        // bytes[]: length, then two offsets relative to the element area
        assert_eq!(word(body, 5), U256::from(2u64));
        assert_eq!(word(body, 6), U256::from(64u64));
        assert_eq!(word(body, 7), U256::from(128u64));
        assert_eq!(word(body, 8), U256::from(1u64));
        assert_eq!(body[9 * 32], 0x11);
        assert_eq!(word(body, 10), U256::from(2u64));
        assert_eq!(&body[11 * 32..11 * 32 + 2], &[0x22, 0x33]);
        assert_eq!(body.len(), 12 * 32);
    }

    #[test]
    fn decodes_return_words() {
        assert_eq!(decode_balance_of(&U256::from(4242u64).abi_encode()).unwrap(), U256::from(4242u64));
        assert_eq!(decode_get_address(&addr(7).abi_encode()).unwrap(), addr(7));
        assert_eq!(decode_get_nonce(&U256::from(3u64).abi_encode()).unwrap(), U256::from(3u64));
    }

    #[test]
    fn decode_rejects_short_data() {
        assert!(decode_balance_of(&[0u8; 16]).is_err());
        assert!(decode_get_address(&[]).is_err());
    }
}
