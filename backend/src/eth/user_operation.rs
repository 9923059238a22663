//! # ERC-4337 UserOperation (EntryPoint v0.6)
//!
//! The pseudo-transaction a Vault executes. The struct mirrors the eleven
//! fields of the v0.6 `UserOperation` and serializes to the JSON-RPC shape
//! bundlers and paymasters expect: numbers as hex quantities, byte strings
//! as `0x` data.
//!
//! ## Hash
//!
//! ```text
//! packed  = abi.encode(sender, nonce, keccak(initCode), keccak(callData),
//!                      callGasLimit, verificationGasLimit, preVerificationGas,
//!                      maxFeePerGas, maxPriorityFeePerGas, keccak(paymasterAndData))
//! opHash  = keccak(abi.encode(keccak(packed), entryPoint, chainId))
//! ```
//!
//! The signature is not part of the hash; SimpleAccount owners sign
//! `opHash` as an EIP-191 personal message.

use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::primitives::{keccak256, serde_bytes_hex, serde_quantity, Address, HexError, B256, U256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    pub sender: Address,

    #[serde(with = "serde_quantity", default)]
    pub nonce: U256,

    #[serde(with = "serde_bytes_hex", default)]
    pub init_code: Vec<u8>,

    #[serde(with = "serde_bytes_hex", default)]
    pub call_data: Vec<u8>,

    #[serde(with = "serde_quantity", default)]
    pub call_gas_limit: U256,

    #[serde(with = "serde_quantity", default)]
    pub verification_gas_limit: U256,

    #[serde(with = "serde_quantity", default)]
    pub pre_verification_gas: U256,

    #[serde(with = "serde_quantity", default)]
    pub max_fee_per_gas: U256,

    #[serde(with = "serde_quantity", default)]
    pub max_priority_fee_per_gas: U256,

    #[serde(with = "serde_bytes_hex", default)]
    pub paymaster_and_data: Vec<u8>,

    #[serde(with = "serde_bytes_hex", default)]
    pub signature: Vec<u8>,
}

impl UserOperation {
    /// A fresh operation for `sender` with every other field empty.
    pub fn new(sender: Address) -> Self {
        Self {
            sender,
            nonce: U256::ZERO,
            init_code: Vec::new(),
            call_data: Vec::new(),
            call_gas_limit: U256::ZERO,
            verification_gas_limit: U256::ZERO,
            pre_verification_gas: U256::ZERO,
            max_fee_per_gas: U256::ZERO,
            max_priority_fee_per_gas: U256::ZERO,
            paymaster_and_data: Vec::new(),
            signature: Vec::new(),
        }
    }

    /// Build from whatever a client sent: extra fields are dropped, missing
    /// fields default to zero/empty, and numbers in any encoding are
    /// accepted.
    pub fn from_loose_json(value: &Value) -> Result<Self, HexError> {
        serde_json::from_value(value.clone()).map_err(|e| HexError::InvalidHex(e.to_string()))
    }

    /// The canonical JSON-RPC form (exactly the eleven v0.6 fields).
    pub fn to_rpc_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// ABI-encoded body hashed by the EntryPoint.
    pub fn pack(&self) -> Vec<u8> {
        (
            self.sender,
            self.nonce,
            keccak256(&self.init_code),
            keccak256(&self.call_data),
            self.call_gas_limit,
            self.verification_gas_limit,
            self.pre_verification_gas,
            self.max_fee_per_gas,
            self.max_priority_fee_per_gas,
            keccak256(&self.paymaster_and_data),
        )
            .abi_encode()
    }

    /// The `userOpHash` for this operation on `entry_point` / `chain_id`.
    pub fn hash(&self, entry_point: &Address, chain_id: u64) -> B256 {
        let inner = keccak256(self.pack());
        keccak256((inner, *entry_point, U256::from(chain_id)).abi_encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eth::constants::{BASE_CHAIN_ID, ENTRY_POINT_V06};
    use crate::eth::primitives::hex_encode;
    use serde_json::json;

    fn sample() -> UserOperation {
        let mut op = UserOperation::new("0x1111111111111111111111111111111111111111".parse().unwrap());
        op.nonce = U256::from(3u64);
        op.call_data = vec![0xb6, 0x1d, 0x27, 0xf6];
        op.call_gas_limit = U256::from(100_000u64);
        op.verification_gas_limit = U256::from(150_000u64);
        op.pre_verification_gas = U256::from(50_000u64);
        op.max_fee_per_gas = U256::from(1_000_000_000u64);
        op.max_priority_fee_per_gas = U256::from(100_000_000u64);
        op
    }

    #[test]
    fn serializes_as_rpc_shape() {
        let value = sample().to_rpc_json();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 11);
        assert_eq!(value["nonce"], "0x3");
        assert_eq!(value["callGasLimit"], "0x186a0");
        assert_eq!(value["initCode"], "0x");
        assert_eq!(value["callData"], "0xb61d27f6");
        assert_eq!(value["sender"], "0x1111111111111111111111111111111111111111");
    }

    #[test]
    fn loose_json_is_cleaned_and_normalized() {
        let raw = json!({
            "sender": "0x1111111111111111111111111111111111111111",
            "nonce": "3",
            "callData": "0xB61D27F6",
            "callGasLimit": 100000,
            "verificationGasLimit": "0x0249f0",
            "preVerificationGas": "50000",
            "maxFeePerGas": "0x3b9aca00",
            "maxPriorityFeePerGas": 100000000,
            "paymasterAndData": null,
            "factory": "0x9999999999999999999999999999999999999999",
            "account": { "type": "simple" }
        });
        let op = UserOperation::from_loose_json(&raw).unwrap();
        assert_eq!(op, sample());
        assert_eq!(op.to_rpc_json().as_object().unwrap().len(), 11);
    }

    #[test]
    fn loose_json_requires_sender() {
        assert!(UserOperation::from_loose_json(&json!({ "nonce": "0x1" })).is_err());
    }

    #[test]
    fn round_trip_is_stable() {
        let op = sample();
        let again = UserOperation::from_loose_json(&op.to_rpc_json()).unwrap();
        assert_eq!(op, again);
    }

    #[test]
    fn hash_ignores_signature_but_binds_chain() {
        let op = sample();
        let mut signed = op.clone();
        signed.signature = vec![1; 65];

        let h1 = op.hash(&ENTRY_POINT_V06, BASE_CHAIN_ID);
        assert_eq!(h1, signed.hash(&ENTRY_POINT_V06, BASE_CHAIN_ID));
        assert_ne!(h1, op.hash(&ENTRY_POINT_V06, 1));

        let mut sponsored = op.clone();
        sponsored.paymaster_and_data = vec![0xab; 20];
        assert_ne!(h1, sponsored.hash(&ENTRY_POINT_V06, BASE_CHAIN_ID));
    }

    #[test]
    fn packed_body_is_ten_words() {
        assert_eq!(sample().pack().len(), 10 * 32);
    }

    #[test]
    fn hash_matches_entry_point_v06_vector() {
        // Expected value computed outside this crate from EntryPoint v0.6
        // getUserOpHash for the sample operation on Base.
        let op = sample();
        assert_eq!(
            hex_encode(keccak256(op.pack())),
            "0xde52eb28042f1cf13b20c22cd9d1ff67c52bf40398fe9f3e98421caed163d0f2"
        );
        assert_eq!(
            hex_encode(op.hash(&ENTRY_POINT_V06, BASE_CHAIN_ID)),
            "0x1baa808e5307bd7c34d6a6948103fa467cdfbddd219f25b5f4e8e7200880e15a"
        );
    }
}
