//! Tool protocol module
//!
//! Implements the line-delimited JSON-RPC tool server and its catalog.

pub mod server;
pub mod tools;
pub mod types;

pub use server::ToolServer;
