//! Gmail API module
//!
//! Contains wire types, MIME helpers, and the client for interacting with
//! the Gmail API.

pub mod client;
pub mod mime;
pub mod types;

pub use client::GmailClient;
