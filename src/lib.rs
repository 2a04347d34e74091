//! Gmail bridge library
//!
//! Exposes Gmail through a line-delimited JSON-RPC tool server and a CLI,
//! with OAuth2 authorization-code auth and a file-backed credential store.

pub mod auth;
pub mod config;
pub mod error;
pub mod gmail;
pub mod mcp;

pub use config::Config;
pub use error::{GmailBridgeError, Result};
