//! Credential storage and refresh
//!
//! Owns the single OAuth2 credential for the process: loads it from the
//! credential file, persists updates atomically, and mints fresh access
//! tokens through the token endpoint when the stored one has expired.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::config::Config;
use crate::error::{AuthError, GmailBridgeError, Result};

/// Refresh tokens this close to expiry instead of using them as-is.
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth client credentials (from the keys file)
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthKeys {
    /// Client ID
    pub client_id: String,

    /// Client secret
    pub client_secret: String,

    /// Auth URI
    pub auth_uri: String,

    /// Token URI
    pub token_uri: String,
}

/// OAuth keys file format (can be "installed" or "web")
#[derive(Debug, Deserialize)]
struct OAuthKeysFile {
    #[serde(alias = "web")]
    installed: Option<OAuthKeys>,
}

impl OAuthKeys {
    /// Load OAuth keys from file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(GmailBridgeError::Auth(AuthError::KeysFileNotFound {
                path: path.display().to_string(),
            }));
        }

        let content = std::fs::read_to_string(path)?;
        let keys_file: OAuthKeysFile = serde_json::from_str(&content)?;

        keys_file
            .installed
            .ok_or(GmailBridgeError::Auth(AuthError::InvalidKeysFormat))
    }
}

/// Persisted OAuth2 credential
///
/// File layout: `token`, `refresh_token`, `token_uri`, `client_id`,
/// `client_secret`, `scopes` (array), `expiry` (ISO-8601 string or null).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Credential {
    /// Access token presented on each API call
    pub token: String,

    /// Long-lived token used to mint new access tokens
    pub refresh_token: Option<String>,

    /// Token endpoint URL
    pub token_uri: String,

    /// OAuth client identifier
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// Granted scope set
    #[serde(default)]
    pub scopes: Vec<String>,

    /// Expiry timestamp; absence means the token always needs validation
    pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
    /// Whether the access token can be used without a refresh
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.expiry {
            Some(expiry) => now + Duration::seconds(EXPIRY_SKEW_SECS) < expiry,
            None => false,
        }
    }
}

/// Token response from the OAuth token endpoint
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
    #[serde(default)]
    pub scope: String,
}

impl TokenResponse {
    /// Expiry timestamp derived from `expires_in`, relative to now
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        self.expires_in.map(|e| Utc::now() + Duration::seconds(e))
    }
}

/// Single-owner credential manager
///
/// All reads and refreshes go through the internal lock, so no two refreshes
/// race within a process. Cross-process writers are not coordinated.
pub struct CredentialStore {
    /// Path of the credential file
    path: PathBuf,

    /// HTTP client for token refresh
    http_client: reqwest::Client,

    /// Current credential, if loaded
    credential: RwLock<Option<Credential>>,
}

impl CredentialStore {
    /// Create a store for the configured credential path, loading any
    /// persisted credential
    pub fn new(config: &Config) -> Self {
        Self::at_path(config.credentials_path.clone())
    }

    /// Create a store for an explicit path (used by tests)
    pub fn at_path(path: PathBuf) -> Self {
        let credential = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok());

        Self {
            path,
            http_client: reqwest::Client::new(),
            credential: RwLock::new(credential),
        }
    }

    /// Load the persisted credential from disk
    pub async fn load(&self) -> Result<Credential> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|_| {
            GmailBridgeError::Auth(AuthError::NotAuthenticated {
                path: self.path.display().to_string(),
            })
        })?;

        let credential: Credential = serde_json::from_str(&content)?;
        *self.credential.write().await = Some(credential.clone());
        Ok(credential)
    }

    /// Persist a credential and make it the active one
    ///
    /// The file is replaced atomically (temp file + rename) so a crashed
    /// writer never leaves a half-written credential behind.
    pub async fn save(&self, credential: &Credential) -> Result<()> {
        let content = serde_json::to_string_pretty(credential)?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &content).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        *self.credential.write().await = Some(credential.clone());
        Ok(())
    }

    /// Whether a credential is currently held
    pub async fn is_authenticated(&self) -> bool {
        self.credential.read().await.is_some()
    }

    /// Current authentication state for the status endpoint
    pub async fn status(&self) -> (bool, Option<DateTime<Utc>>) {
        match self.credential.read().await.as_ref() {
            Some(cred) => (true, cred.expiry),
            None => (false, None),
        }
    }

    /// Get a valid access token, refreshing through the token endpoint if
    /// the stored one has expired
    pub async fn access_token(&self) -> Result<String> {
        {
            let guard = self.credential.read().await;
            match guard.as_ref() {
                Some(cred) if cred.is_fresh(Utc::now()) => return Ok(cred.token.clone()),
                Some(_) => {}
                None => {
                    return Err(GmailBridgeError::Auth(AuthError::NotAuthenticated {
                        path: self.path.display().to_string(),
                    }))
                }
            }
        }

        self.refresh().await
    }

    /// Exchange the refresh token for a new access token and persist it
    async fn refresh(&self) -> Result<String> {
        // Re-check freshness under the write lock: another caller may have
        // refreshed while we waited.
        let mut guard = self.credential.write().await;

        let cred = guard.as_mut().ok_or(GmailBridgeError::Auth(
            AuthError::AuthenticationRequired,
        ))?;

        if cred.is_fresh(Utc::now()) {
            return Ok(cred.token.clone());
        }

        let refresh_token = cred
            .refresh_token
            .clone()
            .ok_or(GmailBridgeError::Auth(AuthError::AuthenticationRequired))?;

        let params = [
            ("client_id", cred.client_id.as_str()),
            ("client_secret", cred.client_secret.as_str()),
            ("refresh_token", refresh_token.as_str()),
            ("grant_type", "refresh_token"),
        ];

        let response = self
            .http_client
            .post(&cred.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GmailBridgeError::Auth(AuthError::TokenRefreshFailed {
                message: text,
            }));
        }

        let token_response: TokenResponse = response.json().await?;

        cred.token = token_response.access_token.clone();
        cred.expiry = token_response.expiry();
        if let Some(new_refresh) = token_response.refresh_token {
            cred.refresh_token = Some(new_refresh);
        }

        let updated = cred.clone();
        drop(guard);

        self.save(&updated).await?;

        tracing::debug!("refreshed access token, new expiry {:?}", updated.expiry);
        Ok(updated.token)
    }
}
