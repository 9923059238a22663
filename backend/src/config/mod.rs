//! # Configuration Module
//!
//! This module handles loading and validating configuration from
//! environment variables. All settings are centralized here.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = AppConfig::from_env()?;
//! println!("RPC URL: {}", config.rpc_url);
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `SERVER_HOST` | HTTP server host | `127.0.0.1` |
//! | `SERVER_PORT` | HTTP server port | `8080` |
//! | `CHAIN_ID` | Target chain | `8453` (Base) |
//! | `RPC_URL` | Chain JSON-RPC endpoint | `https://mainnet.base.org` |
//! | `PIMLICO_API_KEY` | Bundler/paymaster key | none |
//! | `BUNDLER_BASE_URL` | Bundler base URL | `https://api.pimlico.io/v2` |
//! | `ZERO_EX_API_KEY` | Swap aggregator key | none |
//! | `ZERO_EX_BASE_URL` | Swap aggregator URL | `https://api.0x.org` |
//! | `MORALIS_API_KEY` | Token indexer key | none |
//! | `MORALIS_BASE_URL` | Token indexer URL | `https://deep-index.moralis.io/api/v2.2` |
//! | `DEXSCREENER_BASE_URL` | Liquidity source URL | `https://api.dexscreener.com` |
//! | `FEE_RECIPIENT` | Swap fee recipient | project wallet |
//! | `SWAP_FEE_BPS` | Swap fee in basis points | `500` |
//! | `ENTRY_POINT_ADDRESS` | ERC-4337 EntryPoint | v0.6 |
//! | `FACTORY_ADDRESS` | SimpleAccount factory | v0.6 factory |
//! | `GAS_BUFFER_USD` | ETH kept back on a max withdrawal | `0.5` |
//! | `FALLBACK_ETH_PRICE_USD` | Price used when quoting fails | `3200` |
//! | `MIN_SWAP_LIQUIDITY_USD` | Swappable threshold | `1.0` |
//! | `PENDING_OPERATION_TTL` | Seconds an unsigned operation lives (max 86400) | `600` |
//! | `MONITOR_INTERVAL` | Background sweep period (seconds) | `60` |
//! | `HTTP_TIMEOUT_SECS` | Outbound request timeout | `30` |
//! | `ALLOWED_ORIGINS` | CORS origins, comma separated | `*` |
//!
//! Missing API keys do not stop the server: the routes that need them
//! answer with an error instead.

use std::env;
use std::str::FromStr;

use thiserror::Error;

use crate::eth::constants::{
    BASE_CHAIN_ID, DEFAULT_FEE_RECIPIENT, ENTRY_POINT_V06, SIMPLE_ACCOUNT_FACTORY, USDC, WETH,
};
use crate::eth::Address;

/// Upper bound for `PENDING_OPERATION_TTL` (one day).
pub const MAX_PENDING_OPERATION_TTL: u64 = 86_400;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// An environment variable has an invalid value
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),

    /// Failed to parse a value
    #[error("Failed to parse {0}: {1}")]
    ParseError(String, String),
}

/// Application configuration loaded from environment variables.
///
/// ## Example
///
/// ```rust,ignore
/// dotenvy::dotenv().ok();
/// let config = AppConfig::from_env()?;
/// println!("Chain: {}", config.chain_id);
/// ```
#[derive(Debug, Clone)]
pub struct AppConfig {
    // ==========================================
    // SERVER SETTINGS
    // ==========================================

    /// HTTP server host address.
    pub server_host: String,

    /// HTTP server port number.
    pub server_port: u16,

    /// Origins allowed by CORS. `*` allows any.
    pub allowed_origins: Vec<String>,

    // ==========================================
    // CHAIN SETTINGS
    // ==========================================

    /// Chain the Vaults are deployed on.
    pub chain_id: u64,

    /// Chain JSON-RPC endpoint.
    pub rpc_url: String,

    /// ERC-4337 EntryPoint (v0.6).
    pub entry_point: Address,

    /// SimpleAccount factory used to derive Vault addresses.
    pub factory: Address,

    /// WETH, default buy token of the quote relay.
    pub weth: Address,

    /// USDC, used for ETH pricing and USDC withdrawals.
    pub usdc: Address,

    // ==========================================
    // UPSTREAM SERVICES
    // ==========================================

    /// Bundler/paymaster API key. Never logged.
    pub pimlico_api_key: Option<String>,

    /// Bundler base URL; the chain id and key are appended.
    pub bundler_base_url: String,

    /// Swap aggregator API key. Never logged.
    pub zero_ex_api_key: Option<String>,

    /// Swap aggregator base URL.
    pub zero_ex_base_url: String,

    /// Token indexer API key. Never logged.
    pub moralis_api_key: Option<String>,

    /// Token indexer base URL.
    pub moralis_base_url: String,

    /// Liquidity source base URL.
    pub dexscreener_base_url: String,

    /// Timeout applied to every outbound request (seconds).
    pub http_timeout_secs: u64,

    // ==========================================
    // SWAP & WITHDRAW SETTINGS
    // ==========================================

    /// Receives the integrator fee on every swap.
    pub fee_recipient: Address,

    /// Integrator fee in basis points of the buy amount.
    pub swap_fee_bps: u32,

    /// USD worth of ETH left behind on a 100% withdrawal.
    pub gas_buffer_usd: f64,

    /// ETH price used when the quote lookup fails.
    pub fallback_eth_price_usd: f64,

    /// Tokens with less liquidity than this are not offered for swapping.
    pub min_swap_liquidity_usd: f64,

    // ==========================================
    // SESSION SETTINGS
    // ==========================================

    /// Seconds an unsigned operation waits for its signature.
    pub pending_operation_ttl: u64,

    /// Seconds between background sweeps.
    pub monitor_interval: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 8080,
            allowed_origins: vec!["*".to_string()],
            chain_id: BASE_CHAIN_ID,
            rpc_url: "https://mainnet.base.org".to_string(),
            entry_point: ENTRY_POINT_V06,
            factory: SIMPLE_ACCOUNT_FACTORY,
            weth: WETH,
            usdc: USDC,
            pimlico_api_key: None,
            bundler_base_url: "https://api.pimlico.io/v2".to_string(),
            zero_ex_api_key: None,
            zero_ex_base_url: "https://api.0x.org".to_string(),
            moralis_api_key: None,
            moralis_base_url: "https://deep-index.moralis.io/api/v2.2".to_string(),
            dexscreener_base_url: "https://api.dexscreener.com".to_string(),
            http_timeout_secs: 30,
            fee_recipient: DEFAULT_FEE_RECIPIENT,
            swap_fee_bps: 500,
            gas_buffer_usd: 0.5,
            fallback_eth_price_usd: 3200.0,
            min_swap_liquidity_usd: 1.0,
            pending_operation_ttl: 600,
            monitor_interval: 60,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    ///
    /// Use `dotenvy::dotenv()` before calling this to load from `.env` file.
    ///
    /// ## Returns
    ///
    /// - `Ok(AppConfig)` - Configuration loaded successfully
    /// - `Err(ConfigError)` - A variable is present but invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let config = Self {
            // Server
            server_host: get_env_or_default("SERVER_HOST", &defaults.server_host),
            server_port: parse_env("SERVER_PORT", defaults.server_port)?,
            allowed_origins: get_env_or_default("ALLOWED_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),

            // Chain
            chain_id: parse_env("CHAIN_ID", defaults.chain_id)?,
            rpc_url: get_env_or_default("RPC_URL", &defaults.rpc_url),
            entry_point: parse_env("ENTRY_POINT_ADDRESS", defaults.entry_point)?,
            factory: parse_env("FACTORY_ADDRESS", defaults.factory)?,
            weth: parse_env("WETH_ADDRESS", defaults.weth)?,
            usdc: parse_env("USDC_ADDRESS", defaults.usdc)?,

            // Upstream services
            pimlico_api_key: get_optional_env("PIMLICO_API_KEY"),
            bundler_base_url: get_env_or_default("BUNDLER_BASE_URL", &defaults.bundler_base_url),
            zero_ex_api_key: get_optional_env("ZERO_EX_API_KEY"),
            zero_ex_base_url: get_env_or_default("ZERO_EX_BASE_URL", &defaults.zero_ex_base_url),
            moralis_api_key: get_optional_env("MORALIS_API_KEY"),
            moralis_base_url: get_env_or_default("MORALIS_BASE_URL", &defaults.moralis_base_url),
            dexscreener_base_url: get_env_or_default(
                "DEXSCREENER_BASE_URL",
                &defaults.dexscreener_base_url,
            ),
            http_timeout_secs: parse_env("HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,

            // Swap & withdraw
            fee_recipient: parse_env("FEE_RECIPIENT", defaults.fee_recipient)?,
            swap_fee_bps: parse_env("SWAP_FEE_BPS", defaults.swap_fee_bps)?,
            gas_buffer_usd: parse_env("GAS_BUFFER_USD", defaults.gas_buffer_usd)?,
            fallback_eth_price_usd: parse_env(
                "FALLBACK_ETH_PRICE_USD",
                defaults.fallback_eth_price_usd,
            )?,
            min_swap_liquidity_usd: parse_env(
                "MIN_SWAP_LIQUIDITY_USD",
                defaults.min_swap_liquidity_usd,
            )?,

            // Sessions
            pending_operation_ttl: parse_env("PENDING_OPERATION_TTL", defaults.pending_operation_ttl)?,
            monitor_interval: parse_env("MONITOR_INTERVAL", defaults.monitor_interval)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject values that parse but make no sense.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.swap_fee_bps > 10_000 {
            return Err(ConfigError::InvalidValue(
                "SWAP_FEE_BPS".to_string(),
                format!("{} exceeds 10000", self.swap_fee_bps),
            ));
        }
        if !(self.fallback_eth_price_usd > 0.0) {
            return Err(ConfigError::InvalidValue(
                "FALLBACK_ETH_PRICE_USD".to_string(),
                "must be positive".to_string(),
            ));
        }
        if self.gas_buffer_usd < 0.0 {
            return Err(ConfigError::InvalidValue(
                "GAS_BUFFER_USD".to_string(),
                "must not be negative".to_string(),
            ));
        }
        if !(1..=MAX_PENDING_OPERATION_TTL).contains(&self.pending_operation_ttl) {
            return Err(ConfigError::InvalidValue(
                "PENDING_OPERATION_TTL".to_string(),
                format!("must be between 1 and {}", MAX_PENDING_OPERATION_TTL),
            ));
        }
        if self.monitor_interval == 0 {
            return Err(ConfigError::InvalidValue(
                "MONITOR_INTERVAL".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Full bundler/paymaster RPC URL, if a key is configured.
    ///
    /// Contains the API key; do not log it.
    pub fn bundler_url(&self) -> Option<String> {
        self.pimlico_api_key.as_ref().map(|key| {
            format!(
                "{}/{}/rpc?apikey={}",
                self.bundler_base_url.trim_end_matches('/'),
                self.chain_id,
                key
            )
        })
    }
}

/// Get an environment variable with a default value.
///
/// Returns the default if the variable is not set.
fn get_env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get an optional environment variable; empty counts as unset.
fn get_optional_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ConfigError::ParseError(key.to_string(), format!("{}", e))),
        Err(_) => Ok(default),
    }
}
