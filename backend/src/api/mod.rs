//! # REST API Module
//!
//! This module defines all HTTP endpoints for the Dust Vault API.
//!
//! ## Endpoint Overview
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/api/webhook/paymaster` | Paymaster/bundler relay |
//! | GET | `/api/webhook/swap` | Swap quote relay |
//! | GET | `/scan/:address` | Wallet tokens |
//! | POST | `/vault/connect` | Connect an owner's Vault |
//! | POST | `/vault/quarantine` | Move a token into the Vault |
//! | POST | `/vault/swap` | Swap a Vault token |
//! | POST | `/vault/withdraw` | Withdraw Vault ETH |
//! | POST | `/vault/send` | Send ETH or USDC from the Vault |
//! | POST | `/vault/operations/:id/submit` | Submit a signed operation |
//! | GET | `/health` | Health check |
//!
//! ## Request/Response Format
//!
//! Vault and scan endpoints use the envelope:
//!
//! ```json
//! // Success response
//! {
//!     "success": true,
//!     "data": { ... }
//! }
//!
//! // Error response
//! {
//!     "success": false,
//!     "error": {
//!         "code": "ERROR_CODE",
//!         "message": "Human readable message"
//!     }
//! }
//! ```
//!
//! The `/api/webhook/*` proxies answer with the raw upstream shapes
//! (`{"result": ...}` / `{"error": ...}`).

pub mod routes;
pub mod handlers;

pub use routes::configure_routes;
