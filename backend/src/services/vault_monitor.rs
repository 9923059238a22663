//! # Vault Monitor Service
//!
//! The VaultMonitor runs in the background and keeps the in-memory state
//! tidy:
//! - Expired pending operations are purged
//! - The chain RPC is probed and mismatches are logged
//!
//! ## Monitoring Flow
//!
//! ```text
//! VaultMonitor (background task)
//!              │
//!              ├── Every MONITOR_INTERVAL: purge expired operations
//!              │
//!              └── Every 2m: chain RPC health check
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::eth::ChainApi;

use super::vault_session::VaultSessionManager;

/// Result of one chain probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainHealth {
    Healthy,
    WrongChain(u64),
    Unreachable,
}

impl ChainHealth {
    pub fn is_healthy(&self) -> bool {
        matches!(self, ChainHealth::Healthy)
    }
}

/// Ask the node for its chain id and compare it with `expected`.
pub async fn probe_chain(chain: &dyn ChainApi, expected: u64) -> ChainHealth {
    match chain.chain_id().await {
        Ok(id) if id == expected => ChainHealth::Healthy,
        Ok(id) => ChainHealth::WrongChain(id),
        Err(e) => {
            warn!("Chain RPC health check failed: {}", e);
            ChainHealth::Unreachable
        }
    }
}

/// The Vault Monitor service.
///
/// ## Usage
///
/// ```rust,ignore
/// let monitor = VaultMonitor::new(sessions, chain, 60);
///
/// // Start monitoring (runs forever)
/// tokio::spawn(async move {
///     monitor.start().await;
/// });
/// ```
#[derive(Clone)]
pub struct VaultMonitor {
    sessions: Arc<VaultSessionManager>,
    chain: Arc<dyn ChainApi>,
    purge_interval: Duration,
}

impl VaultMonitor {
    pub fn new(sessions: Arc<VaultSessionManager>, chain: Arc<dyn ChainApi>, purge_interval_secs: u64) -> Self {
        Self {
            sessions,
            chain,
            purge_interval: Duration::from_secs(purge_interval_secs.max(1)),
        }
    }

    /// Start the monitoring loop.
    ///
    /// | Check | Interval |
    /// |-------|----------|
    /// | Purge expired operations | `MONITOR_INTERVAL` (default 60s) |
    /// | Chain health | 2 minutes |
    pub async fn start(&self) {
        info!("Starting Vault Monitor service");

        let mut purge_ticker = interval(self.purge_interval);
        let mut health_ticker = interval(Duration::from_secs(120));

        loop {
            tokio::select! {
                _ = purge_ticker.tick() => {
                    self.purge_expired().await;
                }

                _ = health_ticker.tick() => {
                    self.perform_health_check().await;
                }
            }
        }
    }

    async fn purge_expired(&self) -> usize {
        let removed = self.sessions.purge_expired().await;
        debug!(
            "Sweep: {} removed, {} pending, {} sessions",
            removed,
            self.sessions.pending_count().await,
            self.sessions.session_count().await
        );
        removed
    }

    async fn perform_health_check(&self) -> ChainHealth {
        let expected = self.sessions.chain_id();
        let health = probe_chain(self.chain.as_ref(), expected).await;
        match health {
            ChainHealth::Healthy => debug!("Health check passed: chain {} reachable", expected),
            ChainHealth::WrongChain(id) => {
                warn!("Chain RPC reports chain {} but {} is configured", id, expected)
            }
            ChainHealth::Unreachable => {}
        }
        health
    }
}
