//! # Dust Vault Backend Service
//!
//! This is the main entry point for the backend of the Dust Vault mini
//! app. It provides:
//!
//! - Proxy routes for the paymaster/bundler RPC and swap quotes
//! - A token scanner (balances + DEX liquidity)
//! - Vault sessions: smart-account derivation and sponsored UserOperations
//! - Vault actions: quarantine, swap, withdraw, send
//! - A background monitor for pending operations and chain health
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        BACKEND SERVICE                           │
//! │                                                                  │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  REST API   │  │  Proxies    │  │   Background Services   │  │
//! │  │  (Actix)    │  │             │  │  • Vault Monitor        │  │
//! │  │  /scan      │  │  /api/      │  │                         │  │
//! │  │  /vault/*   │  │   webhook/* │  │                         │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! │         │                │                     │                 │
//! │         └────────────────┴─────────────────────┘                 │
//! │                          │                                       │
//! │  ┌───────────────────────┴───────────────────────────────────┐  │
//! │  │                    SERVICE LAYER                           │  │
//! │  │  VaultManager · VaultSessionManager · TokenScanner         │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                          │                                       │
//! │   ┌──────────┬───────────┼────────────┬─────────────┐           │
//! │   │ Base RPC │ Pimlico   │ 0x API     │ Moralis     │ DexScreener│
//! │   └──────────┴───────────┴────────────┴─────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! 1. Copy `.env.example` to `.env` and fill in the API keys
//! 2. Start the server: `cargo run`
//!
//! ## Environment Variables
//!
//! See `.env.example` and `config/mod.rs` for all configuration.

use std::sync::Arc;
use std::time::Duration;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod api;
mod config;
mod eth;
mod models;
mod services;
mod utils;

use config::AppConfig;
use eth::{ChainApi, EthClient};
use services::{
    BundlerApi, DexScreenerClient, MoralisIndexer, PaymasterApi, PimlicoBundler, PimlicoPaymaster, QuoteApi,
    TokenScanner, VaultManager, VaultMonitor, VaultSessionManager, ZeroExClient,
};

/// Application state shared across all handlers.
///
/// Upstream clients sit behind traits so tests can swap in mocks.
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,

    /// Chain node client
    pub chain: Arc<dyn ChainApi>,

    /// Bundler client; also serves the paymaster relay route
    pub bundler: Arc<dyn BundlerApi>,

    /// Swap quote client; also serves the quote relay route
    pub quotes: Arc<dyn QuoteApi>,

    /// Token scanner
    pub scanner: Arc<TokenScanner>,

    /// Vault sessions and pending operations
    pub sessions: Arc<VaultSessionManager>,

    /// Vault action service
    pub vault_manager: VaultManager,
}

impl AppState {
    /// Wire the services together.
    pub fn new(
        config: AppConfig,
        chain: Arc<dyn ChainApi>,
        bundler: Arc<dyn BundlerApi>,
        paymaster: Arc<dyn PaymasterApi>,
        quotes: Arc<dyn QuoteApi>,
        scanner: TokenScanner,
    ) -> Self {
        let scanner = Arc::new(scanner);
        let sessions = Arc::new(VaultSessionManager::new(
            chain.clone(),
            bundler.clone(),
            paymaster,
            config.entry_point,
            config.factory,
            config.chain_id,
            config.pending_operation_ttl,
        ));
        let vault_manager = VaultManager::new(
            config.clone(),
            chain.clone(),
            quotes.clone(),
            scanner.clone(),
            sessions.clone(),
        );

        Self {
            config,
            chain,
            bundler,
            quotes,
            scanner,
            sessions,
            vault_manager,
        }
    }
}

/// Build the CORS policy from `ALLOWED_ORIGINS`.
fn cors_policy(origins: &[String]) -> Cors {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Cors::permissive();
    }
    origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        .allow_any_method()
        .allow_any_header()
        .max_age(3600)
}

fn startup_error(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

/// Main entry point for the backend service.
///
/// This function:
/// 1. Sets up logging
/// 2. Loads configuration from environment
/// 3. Creates the upstream clients
/// 4. Starts the background monitor
/// 5. Launches the HTTP server
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // =========================================
    // STEP 1: Initialize Logging
    // =========================================
    // RUST_LOG overrides the default `info` level
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(startup_error)?;

    info!("🚀 Starting Dust Vault Backend Service");

    // =========================================
    // STEP 2: Load Configuration
    // =========================================
    dotenvy::dotenv().ok(); // It's okay if .env doesn't exist

    let config = AppConfig::from_env().map_err(startup_error)?;

    info!("📋 Configuration loaded");
    info!("   Chain: {} via {}", config.chain_id, config.rpc_url);
    info!("   EntryPoint: {}", config.entry_point);
    info!("   Factory: {}", config.factory);
    info!(
        "   Keys: bundler={} quotes={} indexer={}",
        config.pimlico_api_key.is_some(),
        config.zero_ex_api_key.is_some(),
        config.moralis_api_key.is_some()
    );

    // =========================================
    // STEP 3: Initialize Upstream Clients
    // =========================================
    let timeout = Duration::from_secs(config.http_timeout_secs);
    let http = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(startup_error)?;

    let chain: Arc<dyn ChainApi> = Arc::new(EthClient::new(http.clone(), &config.rpc_url, timeout));
    let bundler_url = config.bundler_url();
    let bundler: Arc<dyn BundlerApi> = Arc::new(PimlicoBundler::new(
        http.clone(),
        bundler_url.clone(),
        config.entry_point,
        timeout,
    ));
    let paymaster: Arc<dyn PaymasterApi> = Arc::new(PimlicoPaymaster::new(
        http.clone(),
        bundler_url,
        config.entry_point,
        config.chain_id,
        timeout,
    ));
    let quotes: Arc<dyn QuoteApi> = Arc::new(ZeroExClient::new(
        http.clone(),
        &config.zero_ex_base_url,
        config.zero_ex_api_key.clone(),
        config.chain_id,
        config.fee_recipient,
        config.swap_fee_bps,
        timeout,
    ));
    let scanner = TokenScanner::new(
        Box::new(MoralisIndexer::new(
            http.clone(),
            &config.moralis_base_url,
            config.moralis_api_key.clone(),
            timeout,
        )),
        Box::new(DexScreenerClient::new(http, &config.dexscreener_base_url, timeout)),
    );

    info!("⛓️  Upstream clients initialized");

    // =========================================
    // STEP 4: Create Application State
    // =========================================
    let app_state = Arc::new(AppState::new(config.clone(), chain, bundler, paymaster, quotes, scanner));

    info!("🔧 Services initialized");

    // =========================================
    // STEP 5: Start Background Services
    // =========================================
    let monitor = VaultMonitor::new(
        app_state.sessions.clone(),
        app_state.chain.clone(),
        config.monitor_interval,
    );
    tokio::spawn(async move {
        monitor.start().await;
    });

    info!("👁️  Vault monitor started");

    // =========================================
    // STEP 6: Start HTTP Server
    // =========================================
    let server_host = config.server_host.clone();
    let server_port = config.server_port;
    let allowed_origins = config.allowed_origins.clone();

    info!("🌐 Starting HTTP server on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        App::new()
            // Attach shared application state
            .app_data(web::Data::new(app_state.clone()))
            // Add logging middleware
            .wrap(middleware::Logger::default())
            // Mini-app origin
            .wrap(cors_policy(&allowed_origins))
            // Configure API routes
            .configure(api::configure_routes)
    })
    .bind(format!("{}:{}", server_host, server_port))?
    .run()
    .await
}
