//! Authorization endpoint set
//!
//! Three HTTP endpoints drive the OAuth2 authorization-code flow:
//! `GET /auth` redirects to the provider consent page, `GET /auth/callback`
//! exchanges the returned code for a token pair and persists it, and
//! `GET /status` reports the current authentication state.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{Html, Json, Redirect};
use axum::routing::get;
use axum::Router;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{oneshot, Mutex};

use crate::auth::credentials::{Credential, CredentialStore, OAuthKeys, TokenResponse};
use crate::config::Config;
use crate::error::{AuthError, GmailBridgeError, Result};

/// OAuth endpoint server
pub struct AuthServer {
    state: Arc<AuthState>,
    port: u16,
}

struct AuthState {
    keys: OAuthKeys,
    scopes: Vec<String>,
    redirect_uri: String,
    store: Arc<CredentialStore>,
    http_client: reqwest::Client,

    /// Signalled once a credential has been persisted (interactive mode)
    done: Mutex<Option<oneshot::Sender<()>>>,
}

/// Response body for `GET /status`
#[derive(Debug, Serialize)]
struct StatusResponse {
    authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_at: Option<String>,
}

impl AuthServer {
    /// Create the endpoint set from configuration and a credential store
    pub fn new(config: &Config, store: Arc<CredentialStore>) -> Result<Self> {
        let keys = OAuthKeys::load(&config.oauth_path)?;

        Ok(Self {
            state: Arc::new(AuthState {
                keys,
                scopes: config.scopes.clone(),
                redirect_uri: config.oauth_callback_url.clone(),
                store,
                http_client: reqwest::Client::new(),
                done: Mutex::new(None),
            }),
            port: config.oauth_callback_port,
        })
    }

    /// The provider consent URL the `/auth` endpoint redirects to
    pub fn consent_url(&self) -> String {
        self.state.consent_url()
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/auth", get(handle_auth))
            .route("/auth/callback", get(handle_callback))
            .route("/status", get(handle_status))
            .with_state(self.state.clone())
    }

    /// Serve the endpoint set until the process is stopped
    pub async fn serve(&self) -> Result<()> {
        let addr = std::net::SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        tracing::info!("auth endpoints listening on port {}", self.port);
        axum::serve(listener, self.router())
            .await
            .map_err(|e| {
                GmailBridgeError::Auth(AuthError::CallbackError {
                    message: e.to_string(),
                })
            })
    }

    /// Run the interactive flow: open the consent page in a browser and
    /// serve until the callback has persisted a credential
    pub async fn authenticate_interactive(&self) -> Result<()> {
        let auth_url = self.consent_url();
        eprintln!("\nPlease visit this URL to authenticate:");
        eprintln!("{}\n", auth_url);

        if let Err(e) = open::that(&auth_url) {
            eprintln!("Could not open browser automatically: {}", e);
            eprintln!("Please open the URL manually.");
        }

        let (tx, rx) = oneshot::channel::<()>();
        *self.state.done.lock().await = Some(tx);

        let addr = std::net::SocketAddr::from(([127, 0, 0, 1], self.port));
        let listener = tokio::net::TcpListener::bind(addr).await?;

        eprintln!("Waiting for authentication callback on port {}...", self.port);

        let server = axum::serve(listener, self.router());

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    return Err(GmailBridgeError::Auth(AuthError::CallbackError {
                        message: e.to_string(),
                    }));
                }
            }
            signal = rx => {
                if signal.is_err() {
                    return Err(GmailBridgeError::Auth(AuthError::NoAuthCode));
                }
                eprintln!("Authentication completed successfully!");
            }
        }

        Ok(())
    }
}

impl AuthState {
    fn consent_url(&self) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            self.keys.auth_uri,
            urlencoding::encode(&self.keys.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scopes)
        )
    }

    /// Exchange an authorization code for a token pair and persist it
    async fn exchange_code(&self, code: &str) -> Result<Credential> {
        let params = [
            ("client_id", self.keys.client_id.as_str()),
            ("client_secret", self.keys.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.keys.token_uri)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(GmailBridgeError::Auth(AuthError::TokenExchangeFailed {
                message: text,
            }));
        }

        let token_response: TokenResponse = response.json().await?;
        let expiry = token_response.expiry();

        let credential = Credential {
            token: token_response.access_token,
            refresh_token: token_response.refresh_token,
            token_uri: self.keys.token_uri.clone(),
            client_id: self.keys.client_id.clone(),
            client_secret: self.keys.client_secret.clone(),
            scopes: self.scopes.clone(),
            expiry,
        };

        self.store.save(&credential).await?;
        Ok(credential)
    }
}

async fn handle_auth(State(state): State<Arc<AuthState>>) -> Redirect {
    Redirect::temporary(&state.consent_url())
}

async fn handle_callback(
    State(state): State<Arc<AuthState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Html<&'static str> {
    let Some(code) = params.get("code") else {
        return Html(
            "<html><body><h1>Authentication failed</h1>\
             <p>No authorization code received.</p></body></html>",
        );
    };

    match state.exchange_code(code).await {
        Ok(_) => {
            if let Some(tx) = state.done.lock().await.take() {
                let _ = tx.send(());
            }
            Html(
                "<html><body><h1>Authentication successful!</h1>\
                 <p>You can close this window.</p></body></html>",
            )
        }
        Err(e) => {
            tracing::error!("token exchange failed: {}", e);
            Html(
                "<html><body><h1>Authentication failed</h1>\
                 <p>Token exchange was rejected by the provider.</p></body></html>",
            )
        }
    }
}

async fn handle_status(State(state): State<Arc<AuthState>>) -> Json<serde_json::Value> {
    let (authenticated, expiry) = state.store.status().await;
    let status = StatusResponse {
        authenticated,
        expires_at: expiry.map(|e: DateTime<Utc>| e.to_rfc3339()),
    };
    Json(serde_json::to_value(status).unwrap_or_default())
}
