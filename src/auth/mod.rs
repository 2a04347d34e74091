//! OAuth2 authentication: credential storage and the authorization endpoint set

pub mod credentials;
pub mod server;

pub use credentials::{Credential, CredentialStore, OAuthKeys};
pub use server::AuthServer;
