//! # Token Scanner Service
//!
//! Lists the ERC-20 tokens a wallet holds, enriched with DEX liquidity.
//!
//! ## Scan Flow
//!
//! ```text
//! 1. Indexer (Moralis): balances + metadata, spam excluded
//!                ↓
//! 2. Drop native and zero-balance rows
//!                ↓  (nothing left → return [])
//! 3. DexScreener: pairs for the remaining addresses, 30 per request
//!                ↓
//! 4. Merge by address: deepest pair gives liquidity, price, logo fallback
//! ```
//!
//! Any failure aborts the whole scan. There are no partial results.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::eth::primitives::{parse_quantity, serde_decimal};
use crate::eth::{Address, AddressExt, U256};

/// DexScreener accepts at most this many addresses per request.
pub const DEXSCREENER_CHUNK_SIZE: usize = 30;

/// Network tag attached to every scanned token.
pub const NETWORK: &str = "base-mainnet";

/// Errors that abort a scan.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("token indexer is not configured")]
    NotConfigured,

    #[error("Scan request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{source_name} returned status {status}")]
    Status { source_name: &'static str, status: u16 },

    #[error("Invalid {source_name} response: {reason}")]
    InvalidResponse { source_name: &'static str, reason: String },
}

/// A token held by the scanned wallet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Token {
    pub address: Address,
    pub symbol: String,
    pub name: String,
    pub decimals: u8,

    /// Raw integer balance.
    #[serde(with = "serde_decimal")]
    pub balance: U256,

    pub logo: Option<String>,
    pub liquidity_usd: Option<f64>,
    pub price_usd: Option<String>,
    pub network: String,
}

impl Token {
    /// Liquidity above `min_usd`; tokens without a pair never qualify.
    pub fn is_swappable(&self, min_usd: f64) -> bool {
        self.liquidity_usd.map(|l| l > min_usd).unwrap_or(false)
    }
}

// ==========================================
// INDEXER
// ==========================================

/// One row of the indexer's wallet-token listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndexedToken {
    pub token_address: Address,

    #[serde(default)]
    pub symbol: Option<String>,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub logo: Option<String>,

    #[serde(default)]
    pub thumbnail: Option<String>,

    #[serde(deserialize_with = "lenient_decimals", default)]
    pub decimals: u8,

    #[serde(with = "serde_decimal", default)]
    pub balance: U256,

    #[serde(default)]
    pub possible_spam: bool,

    #[serde(default)]
    pub native_token: bool,
}

/// `decimals` arrives as a number or a numeric string.
fn lenient_decimals<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let n = parse_quantity(&value).map_err(serde::de::Error::custom)?;
    u8::try_from(n).map_err(|_| serde::de::Error::custom(format!("decimals out of range: {}", n)))
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenIndexer: Send + Sync {
    /// Every token row the indexer reports for `owner`.
    async fn wallet_tokens(&self, owner: &Address) -> Result<Vec<IndexedToken>, ScanError>;
}

/// Moralis wallet-token indexer.
#[derive(Clone)]
pub struct MoralisIndexer {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl MoralisIndexer {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: Option<String>, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct MoralisPage {
    #[serde(default)]
    result: Vec<IndexedToken>,
}

#[async_trait]
impl TokenIndexer for MoralisIndexer {
    async fn wallet_tokens(&self, owner: &Address) -> Result<Vec<IndexedToken>, ScanError> {
        let api_key = self.api_key.as_ref().ok_or(ScanError::NotConfigured)?;

        let response = self
            .http
            .get(format!("{}/wallets/{}/tokens", self.base_url, owner.to_lower_hex()))
            .query(&[("chain", "base"), ("exclude_spam", "true")])
            .header("X-API-Key", api_key)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                source_name: "indexer",
                status: status.as_u16(),
            });
        }

        let page: MoralisPage = response.json().await.map_err(|e| ScanError::InvalidResponse {
            source_name: "indexer",
            reason: e.to_string(),
        })?;
        Ok(page.result)
    }
}

// ==========================================
// LIQUIDITY
// ==========================================

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PairToken {
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct PairLiquidity {
    #[serde(default)]
    pub usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairInfo {
    #[serde(default)]
    pub image_url: Option<String>,
}

/// One DEX pair as reported by DexScreener.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DexPair {
    pub base_token: PairToken,

    #[serde(default)]
    pub liquidity: Option<PairLiquidity>,

    #[serde(default)]
    pub price_usd: Option<String>,

    #[serde(default)]
    pub info: Option<PairInfo>,
}

impl DexPair {
    fn liquidity_usd(&self) -> f64 {
        self.liquidity.as_ref().and_then(|l| l.usd).unwrap_or(0.0)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LiquiditySource: Send + Sync {
    /// Pairs for up to [`DEXSCREENER_CHUNK_SIZE`] token addresses.
    async fn pairs(&self, tokens: &[Address]) -> Result<Vec<DexPair>, ScanError>;
}

#[derive(Clone)]
pub struct DexScreenerClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl DexScreenerClient {
    pub fn new(http: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        }
    }
}

#[derive(Deserialize)]
struct DexScreenerPage {
    #[serde(default)]
    pairs: Option<Vec<DexPair>>,
}

#[async_trait]
impl LiquiditySource for DexScreenerClient {
    async fn pairs(&self, tokens: &[Address]) -> Result<Vec<DexPair>, ScanError> {
        let list = tokens
            .iter()
            .map(Address::to_lower_hex)
            .collect::<Vec<_>>()
            .join(",");

        let response = self
            .http
            .get(format!("{}/latest/dex/tokens/{}", self.base_url, list))
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScanError::Status {
                source_name: "liquidity source",
                status: status.as_u16(),
            });
        }

        let page: DexScreenerPage = response.json().await.map_err(|e| ScanError::InvalidResponse {
            source_name: "liquidity source",
            reason: e.to_string(),
        })?;
        Ok(page.pairs.unwrap_or_default())
    }
}

// ==========================================
// SCANNER
// ==========================================

/// Combines the indexer and the liquidity source.
pub struct TokenScanner {
    indexer: Box<dyn TokenIndexer>,
    liquidity: Box<dyn LiquiditySource>,
}

impl TokenScanner {
    pub fn new(indexer: Box<dyn TokenIndexer>, liquidity: Box<dyn LiquiditySource>) -> Self {
        Self { indexer, liquidity }
    }

    /// Scan `owner`'s wallet.
    pub async fn scan(&self, owner: &Address) -> Result<Vec<Token>, ScanError> {
        let rows: Vec<IndexedToken> = self
            .indexer
            .wallet_tokens(owner)
            .await?
            .into_iter()
            .filter(|t| !t.native_token && !t.possible_spam && !t.balance.is_zero())
            .collect();

        if rows.is_empty() {
            debug!("No tokens held by {}", owner);
            return Ok(Vec::new());
        }

        let addresses: Vec<Address> = rows.iter().map(|t| t.token_address).collect();
        let pairs: Vec<DexPair> = try_join_all(
            addresses
                .chunks(DEXSCREENER_CHUNK_SIZE)
                .map(|chunk| self.liquidity.pairs(chunk)),
        )
        .await?
        .into_iter()
        .flatten()
        .collect();

        let tokens = merge(rows, &pairs);
        info!("🔍 Scanned {}: {} tokens, {} pairs", owner, tokens.len(), pairs.len());
        Ok(tokens)
    }

    /// Scan and keep tokens with liquidity above `min_liquidity_usd`.
    pub async fn scan_swappable(&self, owner: &Address, min_liquidity_usd: f64) -> Result<Vec<Token>, ScanError> {
        Ok(swappable(self.scan(owner).await?, min_liquidity_usd))
    }
}

/// Pair with the most USD liquidity whose base token is `address`.
pub fn deepest_pair<'a>(pairs: &'a [DexPair], address: &Address) -> Option<&'a DexPair> {
    let wanted = address.to_lower_hex();
    pairs
        .iter()
        .filter(|p| p.base_token.address.to_lowercase() == wanted)
        .fold(None, |best: Option<&DexPair>, pair| match best {
            Some(b) if b.liquidity_usd() >= pair.liquidity_usd() => Some(b),
            _ => Some(pair),
        })
}

/// Join indexer rows with their deepest pair.
pub fn merge(rows: Vec<IndexedToken>, pairs: &[DexPair]) -> Vec<Token> {
    rows.into_iter()
        .map(|row| {
            let pair = deepest_pair(pairs, &row.token_address);
            let pair_logo = pair.and_then(|p| p.info.as_ref()).and_then(|i| i.image_url.clone());

            Token {
                address: row.token_address,
                symbol: row.symbol.unwrap_or_default(),
                name: row.name.unwrap_or_default(),
                decimals: row.decimals,
                balance: row.balance,
                logo: row.thumbnail.or(row.logo).or(pair_logo),
                liquidity_usd: pair.and_then(|p| p.liquidity.as_ref()).and_then(|l| l.usd),
                price_usd: pair.and_then(|p| p.price_usd.clone()),
                network: NETWORK.to_string(),
            }
        })
        .collect()
}

pub fn swappable(tokens: Vec<Token>, min_liquidity_usd: f64) -> Vec<Token> {
    tokens
        .into_iter()
        .filter(|t| t.is_swappable(min_liquidity_usd))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn owner() -> Address {
        "0x3333333333333333333333333333333333333333".parse().unwrap()
    }

    fn row(address: &str, balance: &str) -> IndexedToken {
        serde_json::from_value(json!({
            "token_address": address,
            "symbol": "DUST",
            "name": "Dust Token",
            "logo": "https://logo.example/full.png",
            "thumbnail": null,
            "decimals": "18",
            "balance": balance,
            "possible_spam": false,
            "native_token": false
        }))
        .unwrap()
    }

    fn pair(address: &str, liquidity: f64, price: &str) -> DexPair {
        serde_json::from_value(json!({
            "baseToken": { "address": address },
            "liquidity": { "usd": liquidity },
            "priceUsd": price,
            "info": { "imageUrl": "https://dex.example/img.png" }
        }))
        .unwrap()
    }

    const A: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const B: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    #[test]
    fn indexer_row_accepts_numeric_decimals() {
        let parsed: IndexedToken = serde_json::from_value(json!({
            "token_address": A,
            "decimals": 6,
            "balance": "1000"
        }))
        .unwrap();
        assert_eq!(parsed.decimals, 6);
        assert_eq!(parsed.balance, U256::from(1000u64));
    }

    #[test]
    fn deepest_pair_wins_case_insensitively() {
        let pairs = vec![
            pair("0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA", 10.0, "0.1"),
            pair(A, 5000.0, "0.2"),
            pair(B, 99999.0, "9"),
        ];
        let best = deepest_pair(&pairs, &A.parse().unwrap()).unwrap();
        assert_eq!(best.price_usd.as_deref(), Some("0.2"));
    }

    #[test]
    fn merge_prefers_indexer_logo() {
        let tokens = merge(vec![row(A, "5")], &[pair(A, 12.0, "0.5")]);
        assert_eq!(tokens[0].logo.as_deref(), Some("https://logo.example/full.png"));
        assert_eq!(tokens[0].liquidity_usd, Some(12.0));
        assert_eq!(tokens[0].network, NETWORK);

        let mut bare = row(B, "5");
        bare.logo = None;
        let tokens = merge(vec![bare], &[pair(B, 1.0, "1")]);
        assert_eq!(tokens[0].logo.as_deref(), Some("https://dex.example/img.png"));
    }

    #[test]
    fn swappable_requires_liquidity_above_threshold() {
        let tokens = merge(
            vec![row(A, "1"), row(B, "1")],
            &[pair(A, 1.0, "0"), pair(B, 1.5, "0")],
        );
        let kept = swappable(tokens, 1.0);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].address, B.parse::<Address>().unwrap());
    }

    #[test]
    fn balance_serializes_as_decimal_string() {
        let token = merge(vec![row(A, "123456789012345678901234567890")], &[]).remove(0);
        let value = serde_json::to_value(&token).unwrap();
        assert_eq!(value["balance"], "123456789012345678901234567890");
        assert_eq!(value["liquidityUsd"], Value::Null);
    }

    #[actix_rt::test]
    async fn scan_excludes_zero_native_and_spam() {
        let mut indexer = MockTokenIndexer::new();
        indexer.expect_wallet_tokens().returning(|_| {
            let mut native = row("0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee", "100");
            native.native_token = true;
            let mut spam = row(B, "100");
            spam.possible_spam = true;
            Ok(vec![row(A, "0"), native, spam, row("0xcccccccccccccccccccccccccccccccccccccccc", "7")])
        });

        let mut liquidity = MockLiquiditySource::new();
        liquidity.expect_pairs().times(1).returning(|tokens| {
            assert_eq!(tokens.len(), 1);
            Ok(vec![])
        });

        let scanner = TokenScanner::new(Box::new(indexer), Box::new(liquidity));
        let tokens = scanner.scan(&owner()).await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].balance, U256::from(7u64));
    }

    #[actix_rt::test]
    async fn empty_wallet_skips_liquidity_lookup() {
        let mut indexer = MockTokenIndexer::new();
        indexer.expect_wallet_tokens().returning(|_| Ok(vec![row(A, "0")]));
        let mut liquidity = MockLiquiditySource::new();
        liquidity.expect_pairs().times(0);

        let scanner = TokenScanner::new(Box::new(indexer), Box::new(liquidity));
        assert!(scanner.scan(&owner()).await.unwrap().is_empty());
    }

    #[actix_rt::test]
    async fn liquidity_requests_are_chunked() {
        let mut indexer = MockTokenIndexer::new();
        indexer.expect_wallet_tokens().returning(|_| {
            Ok((1..=65u8)
                .map(|i| row(&format!("0x{:040x}", i), "1"))
                .collect())
        });
        let mut liquidity = MockLiquiditySource::new();
        liquidity
            .expect_pairs()
            .times(3)
            .returning(|tokens| {
                assert!(tokens.len() <= DEXSCREENER_CHUNK_SIZE);
                Ok(vec![])
            });

        let scanner = TokenScanner::new(Box::new(indexer), Box::new(liquidity));
        assert_eq!(scanner.scan(&owner()).await.unwrap().len(), 65);
    }

    #[actix_rt::test]
    async fn any_failure_aborts_the_scan() {
        let mut indexer = MockTokenIndexer::new();
        indexer.expect_wallet_tokens().returning(|_| Ok(vec![row(A, "1")]));
        let mut liquidity = MockLiquiditySource::new();
        liquidity.expect_pairs().returning(|_| {
            Err(ScanError::Status {
                source_name: "liquidity source",
                status: 429,
            })
        });

        let scanner = TokenScanner::new(Box::new(indexer), Box::new(liquidity));
        assert!(scanner.scan(&owner()).await.is_err());
    }
}
