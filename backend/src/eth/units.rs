//! Conversions between human-readable token amounts and raw integer units.
//!
//! The arithmetic is `alloy_primitives::utils`; this layer rejects inputs
//! the aggregator would misread (signs, exponents, excess precision) rather
//! than truncating them.

use alloy_primitives::{utils, U256};

/// Decimals of native ETH.
pub const ETHER_DECIMALS: u8 = 18;

/// Errors from amount parsing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UnitsError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Too many decimal places (max {0} for this token)")]
    TooManyDecimals(u8),

    #[error("Amount too large: {0}")]
    Overflow(String),
}

/// Convert a decimal amount to raw units.
///
/// `"1.5"` with 18 decimals becomes `1500000000000000000`.
pub fn parse_units(amount: &str, decimals: u8) -> Result<U256, UnitsError> {
    let amount = amount.trim();
    let (integer_part, decimal_part) = match amount.split_once('.') {
        Some((i, d)) => (i, d),
        None => (amount, ""),
    };

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (integer_part.is_empty() && decimal_part.is_empty())
        || !all_digits(integer_part)
        || !all_digits(decimal_part)
    {
        return Err(UnitsError::InvalidAmount(amount.to_string()));
    }

    if decimal_part.len() > decimals as usize {
        return Err(UnitsError::TooManyDecimals(decimals));
    }

    let normalized = format!("{}.{}", if integer_part.is_empty() { "0" } else { integer_part }, decimal_part);
    utils::parse_units(normalized.trim_end_matches('.'), decimals)
        .map(|parsed| parsed.get_absolute())
        .map_err(|_| UnitsError::Overflow(amount.to_string()))
}

/// Convert raw units to a decimal amount without trailing zeros.
pub fn format_units(value: U256, decimals: u8) -> String {
    let Ok(formatted) = utils::format_units(value, decimals) else {
        return value.to_string();
    };
    if !formatted.contains('.') {
        return formatted;
    }
    formatted.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// Ether to wei.
pub fn parse_ether(amount: &str) -> Result<U256, UnitsError> {
    parse_units(amount, ETHER_DECIMALS)
}

/// Wei to ether.
pub fn format_ether(wei: U256) -> String {
    format_units(wei, ETHER_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_amounts() {
        assert_eq!(parse_ether("1").unwrap(), U256::from(10u64).pow(U256::from(18u64)));
        assert_eq!(parse_ether("1.5").unwrap(), U256::from(1_500_000_000_000_000_000u64));
        assert_eq!(parse_units("0.01", 6).unwrap(), U256::from(10_000u64));
        assert_eq!(parse_units(".5", 6).unwrap(), U256::from(500_000u64));
        assert_eq!(parse_units("0", 6).unwrap(), U256::ZERO);
    }

    #[test]
    fn rejects_bad_amounts() {
        assert!(matches!(parse_units("1.1234567", 6), Err(UnitsError::TooManyDecimals(6))));
        assert!(parse_units("", 6).is_err());
        assert!(parse_units("-1", 6).is_err());
        assert!(parse_units("1.2.3", 6).is_err());
        assert!(parse_units("1e18", 18).is_err());
        assert!(matches!(parse_units(&"9".repeat(80), 0), Err(UnitsError::Overflow(_))));
    }

    #[test]
    fn formats_amounts() {
        assert_eq!(format_ether(U256::from(1_500_000_000_000_000_000u64)), "1.5");
        assert_eq!(format_ether(U256::from(1u64)), "0.000000000000000001");
        assert_eq!(format_ether(U256::ZERO), "0");
        assert_eq!(format_units(U256::from(2_000_000u64), 6), "2");
        assert_eq!(format_units(U256::from(42u64), 0), "42");
    }

    #[test]
    fn fixed_point_strings_from_floats_parse() {
        // the gas buffer is computed in f64 and rendered with 18 places
        let buffer = format!("{:.18}", 0.5_f64 / 3200.0);
        let wei = parse_ether(&buffer).unwrap();
        assert!(wei > U256::from(156_000_000_000_000u64));
        assert!(wei < U256::from(157_000_000_000_000u64));
    }
}
