//! # Vault Session Manager
//!
//! Owns the in-memory state of the service: one Vault session per
//! connected owner, and the UserOperations waiting for the owner's
//! signature.
//!
//! ## Vault Derivation
//!
//! The Vault is a SimpleAccount whose address is fixed by the factory,
//! the owner and salt 0. It is read with `factory.getAddress(owner, 0)` so
//! reconnecting after a restart yields the same Vault.
//!
//! ## Operation Lifecycle
//!
//! ```text
//! prepare(owner, calls)
//!   1. sender      = Vault address
//!   2. nonce       = EntryPoint.getNonce(sender, 0)
//!   3. initCode    = factory ‖ createAccount(owner, 0)   (undeployed only)
//!   4. callData    = execute / executeBatch
//!   5. fees        = bundler gas price (fast)
//!   6. stub sponsorship → gas estimate
//!   7. final sponsorship (its gas fields win)
//!   8. userOpHash  → PendingOperation (expires after TTL)
//!            ↓
//! client signs userOpHash (EIP-191)
//!            ↓
//! submit(id, signature) → bundler → userOpHash
//!            ↓
//! receipt(hash)
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::aliases::U192;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::MAX_PENDING_OPERATION_TTL;
use crate::eth::abi::{decode_get_address, decode_get_nonce, encode_create_account, encode_get_address, encode_get_nonce};
use crate::eth::constants::{ACCOUNT_SALT, SIMPLE_ACCOUNT_DUMMY_SIGNATURE};
use crate::eth::primitives::{hex_decode, hex_encode};
use crate::eth::{Address, ChainApi, RpcError, UserOperation, U256};

use super::bundler::{BundlerApi, BundlerError};
use super::paymaster::PaymasterApi;
use super::transaction_builder::{encode_account_call_data, BuildError, CallDescriptor};

/// Length of an ECDSA signature (r, s, v).
const SIGNATURE_LENGTH: usize = 65;

/// Errors from session and operation handling.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session for this owner; call connect first.
    #[error("No Vault session for {0}")]
    NotConnected(Address),

    #[error("Operation not found: {0}")]
    OperationNotFound(Uuid),

    #[error("Operation expired: {0}")]
    OperationExpired(Uuid),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// Chain node failure.
    #[error("Chain RPC failed: {0}")]
    Chain(#[from] RpcError),

    /// Bundler or paymaster failure.
    #[error(transparent)]
    Bundler(#[from] BundlerError),

    #[error("Invalid chain response: {0}")]
    InvalidResponse(String),

    /// `now + ttl` left the representable date range.
    #[error("Operation expiry out of range")]
    ExpiryOutOfRange,
}

/// A connected owner and their Vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultSession {
    pub owner: Address,
    pub vault_address: Address,
    pub factory: Address,
    pub entry_point: Address,
    pub chain_id: u64,
    pub connected_at: DateTime<Utc>,
}

/// A UserOperation waiting for the owner's signature.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOperation {
    pub id: Uuid,
    pub owner: Address,
    pub label: String,
    pub user_operation: UserOperation,

    /// Hash the owner signs as an EIP-191 personal message.
    pub user_op_hash: String,

    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl PendingOperation {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Session and pending-operation store.
pub struct VaultSessionManager {
    chain: Arc<dyn ChainApi>,
    bundler: Arc<dyn BundlerApi>,
    paymaster: Arc<dyn PaymasterApi>,
    entry_point: Address,
    factory: Address,
    chain_id: u64,
    ttl: Duration,
    sessions: RwLock<HashMap<Address, VaultSession>>,
    pending: RwLock<HashMap<Uuid, PendingOperation>>,
}

impl VaultSessionManager {
    pub fn new(
        chain: Arc<dyn ChainApi>,
        bundler: Arc<dyn BundlerApi>,
        paymaster: Arc<dyn PaymasterApi>,
        entry_point: Address,
        factory: Address,
        chain_id: u64,
        ttl_secs: u64,
    ) -> Self {
        // bounded, so the cast and Duration::seconds cannot overflow
        let ttl_secs = ttl_secs.min(MAX_PENDING_OPERATION_TTL) as i64;
        Self {
            chain,
            bundler,
            paymaster,
            entry_point,
            factory,
            chain_id,
            ttl: Duration::seconds(ttl_secs),
            sessions: RwLock::new(HashMap::new()),
            pending: RwLock::new(HashMap::new()),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    // ==========================================
    // SESSIONS
    // ==========================================

    /// `factory.getAddress(owner, 0)`.
    pub async fn derive_vault_address(&self, owner: &Address) -> Result<Address, SessionError> {
        let data = encode_get_address(owner, U256::from(ACCOUNT_SALT));
        let ret = self.chain.call(&self.factory, &data).await?;
        decode_get_address(&ret).map_err(|e| SessionError::InvalidResponse(format!("getAddress: {}", e)))
    }

    /// Return the owner's session, creating it on first connect.
    pub async fn connect(&self, owner: &Address) -> Result<VaultSession, SessionError> {
        if let Some(existing) = self.sessions.read().await.get(owner) {
            return Ok(existing.clone());
        }

        let vault_address = self.derive_vault_address(owner).await?;
        let session = VaultSession {
            owner: *owner,
            vault_address,
            factory: self.factory,
            entry_point: self.entry_point,
            chain_id: self.chain_id,
            connected_at: Utc::now(),
        };

        let mut sessions = self.sessions.write().await;
        let stored = sessions.entry(*owner).or_insert(session).clone();
        info!("🔗 Vault session: owner {} → vault {}", owner, stored.vault_address);
        Ok(stored)
    }

    /// Drop the session and the owner's pending operations.
    pub async fn disconnect(&self, owner: &Address) -> bool {
        let removed = self.sessions.write().await.remove(owner).is_some();
        self.pending.write().await.retain(|_, op| op.owner != *owner);
        if removed {
            info!("Vault session closed for {}", owner);
        }
        removed
    }

    pub async fn session(&self, owner: &Address) -> Option<VaultSession> {
        self.sessions.read().await.get(owner).cloned()
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    // ==========================================
    // OPERATIONS
    // ==========================================

    /// Build, estimate and sponsor a UserOperation for `calls`.
    pub async fn prepare(
        &self,
        owner: &Address,
        calls: &[CallDescriptor],
        label: &str,
    ) -> Result<PendingOperation, SessionError> {
        let session = self
            .session(owner)
            .await
            .ok_or(SessionError::NotConnected(*owner))?;
        let sender = session.vault_address;

        let mut op = UserOperation::new(sender);
        op.call_data = encode_account_call_data(calls)?;
        op.nonce = self.nonce(&sender).await?;
        op.init_code = self.init_code(owner, &sender).await?;

        let fees = self.bundler.gas_price().await?;
        op.max_fee_per_gas = fees.max_fee_per_gas;
        op.max_priority_fee_per_gas = fees.max_priority_fee_per_gas;

        op.signature = hex_decode(SIMPLE_ACCOUNT_DUMMY_SIGNATURE)
            .map_err(|e| SessionError::InvalidSignature(e.to_string()))?;

        self.paymaster.get_paymaster_stub_data(&op).await?.apply(&mut op);
        self.bundler.estimate_gas(&op).await?.apply(&mut op);
        self.paymaster.get_paymaster_data(&op).await?.apply(&mut op);

        op.signature = Vec::new();
        let hash = op.hash(&self.entry_point, self.chain_id);

        let now = Utc::now();
        let expires_at = now.checked_add_signed(self.ttl).ok_or(SessionError::ExpiryOutOfRange)?;
        let pending = PendingOperation {
            id: Uuid::new_v4(),
            owner: *owner,
            label: label.to_string(),
            user_operation: op,
            user_op_hash: hex_encode(hash),
            created_at: now,
            expires_at,
        };

        self.pending.write().await.insert(pending.id, pending.clone());
        info!(
            "📝 Prepared {} operation {} for vault {} (hash {})",
            label, pending.id, sender, pending.user_op_hash
        );
        Ok(pending)
    }

    async fn nonce(&self, sender: &Address) -> Result<U256, SessionError> {
        let data = encode_get_nonce(sender, U192::ZERO);
        let ret = self.chain.call(&self.entry_point, &data).await?;
        decode_get_nonce(&ret).map_err(|e| SessionError::InvalidResponse(format!("getNonce: {}", e)))
    }

    /// Factory deployment code while the Vault has no code yet.
    async fn init_code(&self, owner: &Address, sender: &Address) -> Result<Vec<u8>, SessionError> {
        let code = self.chain.get_code(sender).await?;
        if !code.is_empty() {
            return Ok(Vec::new());
        }
        debug!("Vault {} not deployed; attaching initCode", sender);
        let mut init_code = self.factory.to_vec();
        init_code.extend(encode_create_account(owner, U256::from(ACCOUNT_SALT)));
        Ok(init_code)
    }

    pub async fn pending_operation(&self, id: &Uuid) -> Option<PendingOperation> {
        self.pending.read().await.get(id).cloned()
    }

    pub async fn pending_count(&self) -> usize {
        self.pending.read().await.len()
    }

    /// Attach the owner's signature and hand the operation to the bundler.
    pub async fn submit(&self, id: &Uuid, signature: &str) -> Result<String, SessionError> {
        let pending = self
            .pending_operation(id)
            .await
            .ok_or(SessionError::OperationNotFound(*id))?;

        if pending.is_expired(Utc::now()) {
            self.pending.write().await.remove(id);
            return Err(SessionError::OperationExpired(*id));
        }

        let signature = hex_decode(signature).map_err(|e| SessionError::InvalidSignature(e.to_string()))?;
        if signature.len() != SIGNATURE_LENGTH {
            return Err(SessionError::InvalidSignature(format!(
                "expected {} bytes, got {}",
                SIGNATURE_LENGTH,
                signature.len()
            )));
        }

        let mut op = pending.user_operation;
        op.signature = signature;
        let hash = self.bundler.send_user_operation(&op).await?;

        self.pending.write().await.remove(id);
        info!("✅ Operation {} submitted as {}", id, hash);
        Ok(hash)
    }

    /// Receipt for a submitted operation; `None` while still pending.
    pub async fn receipt(&self, user_op_hash: &str) -> Result<Option<Value>, SessionError> {
        Ok(self.bundler.user_operation_receipt(user_op_hash).await?)
    }

    /// Remove operations past their TTL. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut pending = self.pending.write().await;
        let before = pending.len();
        pending.retain(|_, op| !op.is_expired(now));
        let removed = before - pending.len();
        if removed > 0 {
            warn!("Purged {} expired pending operation(s)", removed);
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eth::abi::{IEntryPoint, ISimpleAccount, ISimpleAccountFactory};
    use alloy_sol_types::{SolCall, SolValue};
    use crate::eth::constants::{BASE_CHAIN_ID, ENTRY_POINT_V06, SIMPLE_ACCOUNT_FACTORY};
    use crate::eth::MockChainApi;
    use crate::services::bundler::{GasEstimate, GasPrice, MockBundlerApi};
    use crate::services::paymaster::{MockPaymasterApi, PaymasterFields};
    use serde_json::json;

    fn owner() -> Address {
        "0xabcdef0000000000000000000000000000000001".parse().unwrap()
    }

    fn vault() -> Address {
        "0x2222222222222222222222222222222222222222".parse().unwrap()
    }

    /// Chain with an undeployed Vault at nonce 0.
    fn chain() -> MockChainApi {
        let mut chain = MockChainApi::new();
        chain.expect_call().returning(|to, data| {
            if *to == SIMPLE_ACCOUNT_FACTORY {
                assert_eq!(&data[..4], &ISimpleAccountFactory::getAddressCall::SELECTOR);
                Ok(vault().abi_encode())
            } else {
                assert_eq!(&data[..4], &IEntryPoint::getNonceCall::SELECTOR);
                Ok(U256::ZERO.abi_encode())
            }
        });
        chain.expect_get_code().returning(|_| Ok(Vec::new()));
        chain
    }

    fn bundler() -> MockBundlerApi {
        let mut bundler = MockBundlerApi::new();
        bundler.expect_gas_price().returning(|| {
            Ok(GasPrice {
                max_fee_per_gas: U256::from(1_000u64),
                max_priority_fee_per_gas: U256::from(100u64),
            })
        });
        bundler.expect_estimate_gas().returning(|op| {
            assert_eq!(op.signature.len(), SIGNATURE_LENGTH);
            assert_eq!(op.paymaster_and_data, vec![0x01]);
            Ok(GasEstimate {
                pre_verification_gas: U256::from(50_000u64),
                verification_gas_limit: U256::from(150_000u64),
                call_gas_limit: U256::from(100_000u64),
            })
        });
        bundler
    }

    fn paymaster() -> MockPaymasterApi {
        let mut paymaster = MockPaymasterApi::new();
        paymaster.expect_get_paymaster_stub_data().returning(|_| {
            Ok(PaymasterFields {
                paymaster_and_data: vec![0x01],
                ..PaymasterFields::default()
            })
        });
        paymaster.expect_get_paymaster_data().returning(|op| {
            assert_eq!(op.call_gas_limit, U256::from(100_000u64));
            Ok(PaymasterFields {
                paymaster_and_data: vec![0x02, 0x03],
                verification_gas_limit: Some(U256::from(200_000u64)),
                ..PaymasterFields::default()
            })
        });
        paymaster
    }

    fn manager_with(bundler: MockBundlerApi, ttl_secs: u64) -> VaultSessionManager {
        VaultSessionManager::new(
            Arc::new(chain()),
            Arc::new(bundler),
            Arc::new(paymaster()),
            ENTRY_POINT_V06,
            SIMPLE_ACCOUNT_FACTORY,
            BASE_CHAIN_ID,
            ttl_secs,
        )
    }

    fn withdraw_calls() -> Vec<CallDescriptor> {
        vec![CallDescriptor::new(owner(), U256::from(5u64), Vec::new())]
    }

    #[actix_rt::test]
    async fn connect_is_idempotent_per_owner() {
        let manager = manager_with(bundler(), 600);
        let first = manager.connect(&owner()).await.unwrap();
        assert_eq!(first.vault_address, vault());

        // same owner typed in a different case
        let upper: Address = "0xABCDEF0000000000000000000000000000000001".parse().unwrap();
        let second = manager.connect(&upper).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(manager.session_count().await, 1);
    }

    #[actix_rt::test]
    async fn prepare_requires_session() {
        let manager = manager_with(bundler(), 600);
        let err = manager.prepare(&owner(), &withdraw_calls(), "withdraw").await.unwrap_err();
        assert!(matches!(err, SessionError::NotConnected(_)));
    }

    #[actix_rt::test]
    async fn prepare_assembles_sponsored_operation() {
        let manager = manager_with(bundler(), 600);
        manager.connect(&owner()).await.unwrap();

        let pending = manager.prepare(&owner(), &withdraw_calls(), "withdraw").await.unwrap();
        let op = &pending.user_operation;

        assert_eq!(op.sender, vault());
        assert_eq!(&op.init_code[..20], SIMPLE_ACCOUNT_FACTORY.as_slice());
        assert_eq!(&op.call_data[..4], &ISimpleAccount::executeCall::SELECTOR);
        assert_eq!(op.max_fee_per_gas, U256::from(1_000u64));
        assert_eq!(op.paymaster_and_data, vec![0x02, 0x03]);
        // final paymaster gas overrides the estimate
        assert_eq!(op.verification_gas_limit, U256::from(200_000u64));
        assert_eq!(op.pre_verification_gas, U256::from(50_000u64));
        assert!(op.signature.is_empty());

        assert_eq!(pending.user_op_hash, hex_encode(op.hash(&ENTRY_POINT_V06, BASE_CHAIN_ID)));
        assert_eq!(manager.pending_count().await, 1);
    }

    #[actix_rt::test]
    async fn submit_attaches_signature_and_clears_pending() {
        let mut bundler = bundler();
        bundler.expect_send_user_operation().times(1).returning(|op| {
            assert_eq!(op.signature.len(), SIGNATURE_LENGTH);
            Ok("0xfeed".to_string())
        });
        let manager = manager_with(bundler, 600);
        manager.connect(&owner()).await.unwrap();
        let pending = manager.prepare(&owner(), &withdraw_calls(), "withdraw").await.unwrap();

        let short = manager.submit(&pending.id, "0x1234").await;
        assert!(matches!(short, Err(SessionError::InvalidSignature(_))));

        let signature = format!("0x{}", "ab".repeat(SIGNATURE_LENGTH));
        let hash = manager.submit(&pending.id, &signature).await.unwrap();
        assert_eq!(hash, "0xfeed");
        assert_eq!(manager.pending_count().await, 0);

        let again = manager.submit(&pending.id, &signature).await;
        assert!(matches!(again, Err(SessionError::OperationNotFound(_))));
    }

    #[actix_rt::test]
    async fn expired_operations_are_rejected_and_purged() {
        let manager = manager_with(bundler(), 0);
        manager.connect(&owner()).await.unwrap();
        let first = manager.prepare(&owner(), &withdraw_calls(), "withdraw").await.unwrap();
        manager.prepare(&owner(), &withdraw_calls(), "withdraw").await.unwrap();

        let signature = format!("0x{}", "ab".repeat(SIGNATURE_LENGTH));
        assert!(matches!(
            manager.submit(&first.id, &signature).await,
            Err(SessionError::OperationExpired(_))
        ));
        assert_eq!(manager.purge_expired().await, 1);
        assert_eq!(manager.pending_count().await, 0);
    }

    #[actix_rt::test]
    async fn oversized_ttl_is_capped() {
        let manager = manager_with(bundler(), u64::MAX);
        manager.connect(&owner()).await.unwrap();
        let pending = manager.prepare(&owner(), &withdraw_calls(), "withdraw").await.unwrap();

        let lifetime = pending.expires_at - pending.created_at;
        assert_eq!(lifetime, Duration::seconds(MAX_PENDING_OPERATION_TTL as i64));
        assert!(!pending.is_expired(Utc::now()));
    }

    #[actix_rt::test]
    async fn disconnect_drops_pending_operations() {
        let manager = manager_with(bundler(), 600);
        manager.connect(&owner()).await.unwrap();
        manager.prepare(&owner(), &withdraw_calls(), "withdraw").await.unwrap();

        assert!(manager.disconnect(&owner()).await);
        assert!(manager.session(&owner()).await.is_none());
        assert_eq!(manager.pending_count().await, 0);
        assert!(!manager.disconnect(&owner()).await);
    }

    #[actix_rt::test]
    async fn receipt_passes_through() {
        let mut bundler = bundler();
        bundler
            .expect_user_operation_receipt()
            .returning(|hash| Ok(if hash == "0x01" { Some(json!({ "success": true })) } else { None }));
        let manager = manager_with(bundler, 600);

        assert_eq!(manager.receipt("0x01").await.unwrap(), Some(json!({ "success": true })));
        assert_eq!(manager.receipt("0x02").await.unwrap(), None);
    }
}
