//! # API Routes
//!
//! This module configures all HTTP routes for the API.
//!
//! ## Route Structure
//!
//! ```text
//! /
//! ├── /                                  GET  - API information
//! ├── /health                            GET  - Health check
//! ├── /scan/{address}                    GET  - Wallet tokens with liquidity
//! ├── /api/webhook
//! │   ├── /paymaster                     POST - Paymaster/bundler JSON-RPC relay
//! │   └── /swap                          GET  - Swap quote relay
//! └── /vault
//!     ├── /connect                       POST - Derive and remember the Vault
//!     ├── /disconnect                    POST - Forget the session
//!     ├── /balance/{owner}               GET  - Vault ETH and tokens
//!     ├── /eth-price                     GET  - ETH price in USD
//!     ├── /quarantine                    POST - Build wallet → Vault transfer
//!     ├── /swap                          POST - Prepare a Vault swap
//!     ├── /withdraw                      POST - Prepare a Vault withdrawal
//!     ├── /send                          POST - Prepare a Vault send
//!     ├── /operations/{id}               GET  - Pending operation
//!     ├── /operations/{id}/submit        POST - Submit the signed operation
//!     └── /operations/receipt/{hash}     GET  - Inclusion receipt
//! ```
//!
//! JSON bodies and query strings that fail to deserialize are answered
//! with 400 `INVALID_REQUEST` by the extractor configs registered here.

use actix_web::web;

use super::handlers;

/// Configure all API routes.
///
/// This function is called from main.rs to set up the routing.
///
/// ## Example
///
/// ```rust,ignore
/// App::new()
///     .configure(configure_routes)
/// ```
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(handlers::json_error_handler))
        .app_data(web::QueryConfig::default().error_handler(handlers::query_error_handler));

    cfg
        // Root and health
        .route("/", web::get().to(handlers::api_info))
        .route("/health", web::get().to(handlers::health_check))
        // Token scanner
        .route("/scan/{address}", web::get().to(handlers::scan_tokens))
        // Proxy routes used by the mini app
        .service(
            web::scope("/api/webhook")
                .route("/paymaster", web::post().to(handlers::paymaster_relay))
                .route("/swap", web::get().to(handlers::swap_quote_relay)),
        )
        // Vault endpoints
        .service(
            web::scope("/vault")
                // Sessions
                .route("/connect", web::post().to(handlers::connect_vault))
                .route("/disconnect", web::post().to(handlers::disconnect_vault))
                // Queries
                .route("/balance/{owner}", web::get().to(handlers::get_balance))
                .route("/eth-price", web::get().to(handlers::get_eth_price))
                // Actions
                .route("/quarantine", web::post().to(handlers::quarantine))
                .route("/swap", web::post().to(handlers::swap))
                .route("/withdraw", web::post().to(handlers::withdraw))
                .route("/send", web::post().to(handlers::send))
                // Pending operations
                .route("/operations/receipt/{hash}", web::get().to(handlers::get_receipt))
                .route("/operations/{id}", web::get().to(handlers::get_operation))
                .route("/operations/{id}/submit", web::post().to(handlers::submit_operation)),
        );
}
