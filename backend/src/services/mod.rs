//! # Services Module
//!
//! This module contains the core business logic services for the
//! Dust Vault backend. Each service handles a specific domain.
//!
//! ## Services Overview
//!
//! | Service | Responsibility |
//! |---------|---------------|
//! | `VaultManager` | Quarantine, swap, withdraw, send, balances |
//! | `VaultSessionManager` | Vault derivation, UserOperation assembly, pending store |
//! | `TokenScanner` | Wallet token listing with liquidity |
//! | `ZeroExClient` | Swap quotes, ETH price |
//! | `PimlicoBundler` / `PimlicoPaymaster` | ERC-4337 bundling and sponsorship |
//! | `VaultMonitor` | Expired operation purge, chain health |
//!
//! ## Service Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SERVICES LAYER                            │
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │                    VaultManager                           │   │
//! │  │  • quarantine()  • swap()  • withdraw()  • send()         │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! │         │                    │                    │              │
//! │         ▼                    ▼                    ▼              │
//! │  ┌────────────┐      ┌──────────────┐     ┌────────────┐        │
//! │  │   Token    │      │ VaultSession │     │   Swap     │        │
//! │  │  Scanner   │      │   Manager    │     │   Quote    │        │
//! │  │            │      │              │     │            │        │
//! │  │ Moralis    │      │ Bundler      │     │ 0x API     │        │
//! │  │ DexScreener│      │ Paymaster    │     │            │        │
//! │  └────────────┘      └──────────────┘     └────────────┘        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod bundler;
pub mod paymaster;
pub mod swap_quote;
pub mod token_scanner;
pub mod transaction_builder;
pub mod vault_manager;
pub mod vault_monitor;
pub mod vault_session;

pub use bundler::{BundlerApi, BundlerError, PimlicoBundler};
pub use paymaster::{PaymasterApi, PimlicoPaymaster};
pub use swap_quote::{QuoteApi, QuoteError, QuoteRequest, ZeroExClient};
pub use token_scanner::{DexScreenerClient, MoralisIndexer, ScanError, TokenScanner};
pub use vault_manager::{ActionError, VaultManager};
pub use vault_monitor::VaultMonitor;
pub use vault_session::{SessionError, VaultSessionManager};
