//! # Utilities Module
//!
//! This module contains helper functions used across the backend service,
//! mostly for keeping log lines short.

/// Truncate a string to a maximum length, keeping both ends.
///
/// Useful for logging addresses, hashes and signatures.
///
/// ## Examples
///
/// ```rust,ignore
/// assert_eq!(truncate_string("abcdefghijklmnop", 10), "abc...nop");
/// ```
pub fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len || max_len < 5 {
        return s.to_string();
    }
    let half = (max_len - 3) / 2;
    let head: String = chars[..half].iter().collect();
    let tail: String = chars[chars.len() - half..].iter().collect();
    format!("{}...{}", head, tail)
}

/// `0x4fba...5524` form of an address or hash for logs.
pub fn short_hex(value: &str) -> String {
    truncate_string(value.trim(), 15)
}

/// Format a USD amount with two decimals.
pub fn format_usd(amount: f64) -> String {
    format!("${:.2}", amount)
}
