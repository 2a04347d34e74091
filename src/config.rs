//! Configuration management for the Gmail bridge
//!
//! Handles paths, environment variables, and configuration loading.

use std::path::PathBuf;

use crate::error::{ConfigError, GmailBridgeError, Result};

/// Configuration for the Gmail bridge
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory for storing configuration files
    pub config_dir: PathBuf,

    /// Path to OAuth keys file (client credentials)
    pub oauth_path: PathBuf,

    /// Path to stored credential (access/refresh tokens)
    pub credentials_path: PathBuf,

    /// OAuth callback URL
    pub oauth_callback_url: String,

    /// OAuth callback port
    pub oauth_callback_port: u16,

    /// Gmail API scopes
    pub scopes: Vec<String>,
}

impl Config {
    /// Create a new configuration with default paths
    pub fn new() -> Result<Self> {
        let config_dir = Self::get_config_dir()?;

        let oauth_path = std::env::var("GMAIL_OAUTH_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir.join("gcp-oauth.keys.json"));

        let credentials_path = std::env::var("GMAIL_CREDENTIALS_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir.join("credentials.json"));

        let oauth_callback_port = std::env::var("GMAIL_OAUTH_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(8000);

        let oauth_callback_url = format!("http://localhost:{}/auth/callback", oauth_callback_port);

        Ok(Self {
            config_dir,
            oauth_path,
            credentials_path,
            oauth_callback_url,
            oauth_callback_port,
            scopes: vec!["https://www.googleapis.com/auth/gmail.modify".to_string()],
        })
    }

    /// Get the configuration directory, creating it if necessary
    fn get_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::home_dir()
            .ok_or_else(|| {
                GmailBridgeError::Config(ConfigError::DirNotFound {
                    path: "~".to_string(),
                })
            })?
            .join(".gmail-bridge");

        if !config_dir.exists() {
            std::fs::create_dir_all(&config_dir).map_err(|_| {
                GmailBridgeError::Config(ConfigError::DirCreationFailed {
                    path: config_dir.display().to_string(),
                })
            })?;
        }

        Ok(config_dir)
    }

    /// Check if OAuth keys file exists
    pub fn oauth_keys_exist(&self) -> bool {
        self.oauth_path.exists()
    }

    /// Check if a persisted credential exists
    pub fn credentials_exist(&self) -> bool {
        self.credentials_path.exists()
    }
}

/// Gmail API constants
pub mod gmail {
    /// Base URL for Gmail API
    pub const API_BASE_URL: &str = "https://gmail.googleapis.com/gmail/v1";

    /// User ID for the authenticated user
    pub const USER_ID: &str = "me";

    /// System label names, usable directly as label ids
    pub const SYSTEM_LABELS: &[&str] = &[
        "INBOX",
        "SENT",
        "DRAFT",
        "SPAM",
        "TRASH",
        "STARRED",
        "UNREAD",
        "IMPORTANT",
    ];

    /// True if `name` is one of the fixed system label names
    pub fn is_system_label(name: &str) -> bool {
        SYSTEM_LABELS.contains(&name)
    }
}
