//! # Ethereum Primitives
//!
//! `Address`, `U256` and Keccak-256 come from `alloy-primitives`; this
//! module adds the lenient hex encodings that appear on the JSON-RPC wire.
//!
//! ## Quantities vs. Data
//!
//! JSON-RPC distinguishes two hex encodings:
//!
//! | Kind | Example | Rule |
//! |------|---------|------|
//! | Quantity | `0x1a3` | no leading zeros, zero is `0x0` |
//! | Data | `0x00ff` | even length, empty is `0x` |
//!
//! Browser clients hand us numbers in every shape imaginable (JSON numbers,
//! decimal strings, hex strings, `null`). [`to_hex_quantity`] and
//! [`to_hex_bytes`] fold all of them into the canonical form, and running
//! them again on their own output is a no-op.

use alloy_primitives::hex;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;

pub use alloy_primitives::{keccak256, Address, B256, U256};

/// Errors produced while parsing hex, addresses and integers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HexError {
    /// Not valid hex data.
    #[error("Invalid hex string: {0}")]
    InvalidHex(String),

    /// Not a 20-byte, 0x-prefixed address.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Negative, fractional or non-numeric input.
    #[error("Not a non-negative integer: {0}")]
    NotAnInteger(String),

    /// Larger than 2^256 - 1.
    #[error("Value does not fit in 256 bits: {0}")]
    Overflow(String),
}

/// Hex-encode bytes with a `0x` prefix.
pub fn hex_encode(data: impl AsRef<[u8]>) -> String {
    hex::encode_prefixed(data)
}

/// Decode `0x`-prefixed (or bare) hex into bytes.
///
/// Empty input (`0x`) decodes to an empty vector. Odd-length input is
/// rejected: byte strings always have an even number of digits.
pub fn hex_decode(s: &str) -> Result<Vec<u8>, HexError> {
    let raw = strip_hex_prefix(s.trim());
    hex::decode(raw).map_err(|_| HexError::InvalidHex(s.to_string()))
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// Parse a user-supplied address.
///
/// Any letter case is accepted, but the `0x` prefix is required.
pub fn parse_address(s: &str) -> Result<Address, HexError> {
    let trimmed = s.trim();
    if !(trimmed.starts_with("0x") || trimmed.starts_with("0X")) {
        return Err(HexError::InvalidAddress(s.to_string()));
    }
    strip_hex_prefix(trimmed)
        .parse()
        .map_err(|_| HexError::InvalidAddress(s.to_string()))
}

/// Wire helpers for [`Address`].
pub trait AddressExt {
    /// Lowercase `0x` hex without checksum casing.
    fn to_lower_hex(&self) -> String;

    /// Read an address out of a 32-byte ABI word (the last 20 bytes).
    fn from_word_slice(word: &[u8]) -> Result<Address, HexError>;
}

impl AddressExt for Address {
    fn to_lower_hex(&self) -> String {
        hex::encode_prefixed(self.as_slice())
    }

    fn from_word_slice(word: &[u8]) -> Result<Address, HexError> {
        let word: [u8; 32] = word
            .try_into()
            .map_err(|_| HexError::InvalidAddress(hex_encode(word)))?;
        Ok(Address::from_word(B256::from(word)))
    }
}

// ==========================================
// QUANTITY NORMALIZATION
// ==========================================

/// Interpret a loosely-typed JSON value as a 256-bit unsigned integer.
///
/// | Input | Result |
/// |-------|--------|
/// | `null`, `""`, `"0x"` | `0` |
/// | `42` | `42` |
/// | `"42"` | `42` |
/// | `"0x2a"` / `"0x002A"` | `42` |
pub fn parse_quantity(value: &Value) -> Result<U256, HexError> {
    match value {
        Value::Null => Ok(U256::ZERO),
        Value::Number(n) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| HexError::NotAnInteger(n.to_string())),
        Value::String(s) => parse_quantity_str(s),
        other => Err(HexError::NotAnInteger(other.to_string())),
    }
}

/// String form of [`parse_quantity`].
pub fn parse_quantity_str(s: &str) -> Result<U256, HexError> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Ok(U256::ZERO);
    }

    if trimmed.starts_with("0x") || trimmed.starts_with("0X") {
        let digits = strip_hex_prefix(trimmed).trim_start_matches('0');
        if digits.is_empty() {
            return Ok(U256::ZERO);
        }
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HexError::InvalidHex(s.to_string()));
        }
        if digits.len() > 64 {
            return Err(HexError::Overflow(s.to_string()));
        }
        return U256::from_str_radix(digits, 16).map_err(|_| HexError::InvalidHex(s.to_string()));
    }

    if !trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Err(HexError::NotAnInteger(s.to_string()));
    }
    U256::from_str_radix(trimmed, 10).map_err(|_| HexError::Overflow(s.to_string()))
}

/// Canonical quantity encoding of an integer.
pub fn quantity_hex(value: &U256) -> String {
    if value.is_zero() {
        return "0x0".to_string();
    }
    format!("0x{:x}", value)
}

/// Normalize any numeric JSON value to a canonical hex quantity.
pub fn to_hex_quantity(value: &Value) -> Result<String, HexError> {
    parse_quantity(value).map(|v| quantity_hex(&v))
}

/// Normalize a byte-string JSON value (`null` or hex) to canonical data hex.
pub fn to_hex_bytes(value: &Value) -> Result<String, HexError> {
    match value {
        Value::Null => Ok("0x".to_string()),
        Value::String(s) => hex_decode(s).map(|bytes| hex_encode(&bytes)),
        other => Err(HexError::InvalidHex(other.to_string())),
    }
}

/// Serde adapter: `U256` <-> hex quantity (lenient on input).
pub mod serde_quantity {
    use super::*;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&quantity_hex(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_quantity(&value).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter: `Option<U256>` <-> hex quantity, absent or `null` is `None`.
pub mod serde_quantity_opt {
    use super::*;

    pub fn serialize<S: Serializer>(value: &Option<U256>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_str(&quantity_hex(v)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<U256>, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(None);
        }
        parse_quantity(&value).map(Some).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter: `U256` <-> decimal string (lenient on input).
///
/// Token balances travel as decimal strings so JavaScript clients can feed
/// them straight into `BigInt`.
pub mod serde_decimal {
    use super::*;

    pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
        let value = Value::deserialize(deserializer)?;
        parse_quantity(&value).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter: `Vec<u8>` <-> `0x` data hex, `null` is empty.
pub mod serde_bytes_hex {
    use super::*;

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex_encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        match value {
            Some(s) => hex_decode(&s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use serde_json::json;

    #[test]
    fn keccak_of_empty_input() {
        assert_eq!(
            hex_encode(keccak256(b"")),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn address_parses_any_case_and_displays_checksummed() {
        let lower = parse_address("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        let upper = parse_address("0X5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED").unwrap();
        assert_eq!(lower, upper);
        // EIP-55 reference vector
        assert_eq!(lower.to_string(), "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
        assert_eq!(lower.to_lower_hex(), "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
    }

    #[test]
    fn address_rejects_bad_input() {
        assert!(parse_address("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
        assert!(parse_address("0x5aaeb6").is_err());
        assert!(parse_address("0xzzaeb6053f3e94c9b9a09f33669435e7ef1beaed").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn address_from_abi_word() {
        let mut word = [0u8; 32];
        word[31] = 6;
        word[12] = 0x42;
        let addr = Address::from_word_slice(&word).unwrap();
        assert_eq!(addr, address!("4200000000000000000000000000000000000006"));
        assert!(Address::from_word_slice(&word[..20]).is_err());
    }

    #[test]
    fn quantity_normalization_covers_all_shapes() {
        assert_eq!(to_hex_quantity(&Value::Null).unwrap(), "0x0");
        assert_eq!(to_hex_quantity(&json!(255)).unwrap(), "0xff");
        assert_eq!(to_hex_quantity(&json!("255")).unwrap(), "0xff");
        assert_eq!(to_hex_quantity(&json!("0x00FF")).unwrap(), "0xff");
        assert_eq!(to_hex_quantity(&json!("0x")).unwrap(), "0x0");
        assert_eq!(
            to_hex_quantity(&json!("1000000000000000000")).unwrap(),
            "0xde0b6b3a7640000"
        );
    }

    #[test]
    fn quantity_normalization_is_idempotent() {
        for input in [json!(null), json!(7), json!("123456789"), json!("0x0001e240")] {
            let once = to_hex_quantity(&input).unwrap();
            let twice = to_hex_quantity(&json!(once.clone())).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn quantity_normalization_rejects_non_integers() {
        assert!(to_hex_quantity(&json!(-1)).is_err());
        assert!(to_hex_quantity(&json!(1.5)).is_err());
        assert!(to_hex_quantity(&json!("12abc")).is_err());
        assert!(to_hex_quantity(&json!("0x1_0")).is_err());
        assert!(to_hex_quantity(&json!(true)).is_err());
        assert!(matches!(
            parse_quantity_str(&format!("0x1{}", "0".repeat(64))),
            Err(HexError::Overflow(_))
        ));
        assert!(matches!(
            parse_quantity_str(&format!("1{}", "0".repeat(78))),
            Err(HexError::Overflow(_))
        ));
    }

    #[test]
    fn bytes_normalization() {
        assert_eq!(to_hex_bytes(&Value::Null).unwrap(), "0x");
        assert_eq!(to_hex_bytes(&json!("0xABcd")).unwrap(), "0xabcd");
        assert_eq!(to_hex_bytes(&json!("0x")).unwrap(), "0x");
        assert!(to_hex_bytes(&json!("0xabc")).is_err());
        assert!(to_hex_bytes(&json!(12)).is_err());
    }
}
