//! Error types for the Gmail bridge
//!
//! Every operation returns an explicit `Result` at the API boundary; the
//! front ends and the tool adapter convert these into user-facing messages
//! or structured error payloads.

use thiserror::Error;

/// Main error type for the Gmail bridge
#[derive(Error, Debug)]
pub enum GmailBridgeError {
    /// OAuth authentication errors
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    /// Gmail API errors
    #[error("Gmail API error: {0}")]
    Api(#[from] ApiError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// MCP protocol errors
    #[error("MCP protocol error: {0}")]
    Mcp(#[from] McpError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// OAuth authentication errors
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated: no credential file at {path}")]
    NotAuthenticated { path: String },

    #[error("Authentication required: token expired and no refresh token available")]
    AuthenticationRequired,

    #[error("OAuth keys file not found: {path}")]
    KeysFileNotFound { path: String },

    #[error("Invalid OAuth keys format: expected 'installed' or 'web' credentials")]
    InvalidKeysFormat,

    #[error("Failed to refresh access token: {message}")]
    TokenRefreshFailed { message: String },

    #[error("Token exchange failed: {message}")]
    TokenExchangeFailed { message: String },

    #[error("No authorization code provided")]
    NoAuthCode,

    #[error("OAuth callback error: {message}")]
    CallbackError { message: String },
}

/// Gmail API errors
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Message not found: {message_id}")]
    MessageNotFound { message_id: String },

    #[error("Label not found: {name}")]
    LabelNotFound { name: String },

    #[error("API request failed ({status}): {body}")]
    RequestFailed { status: u16, body: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config directory not found: {path}")]
    DirNotFound { path: String },

    #[error("Failed to create config directory: {path}")]
    DirCreationFailed { path: String },
}

/// Validation errors
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Invalid email address: {email}")]
    InvalidEmail { email: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid parameter: {name} - {message}")]
    InvalidParameter { name: String, message: String },
}

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Unknown tool: {name}")]
    UnknownTool { name: String },

    #[error("Invalid tool arguments: {message}")]
    InvalidArguments { message: String },

    #[error("Protocol error: {message}")]
    ProtocolError { message: String },
}

/// Result type alias for Gmail bridge operations
pub type Result<T> = std::result::Result<T, GmailBridgeError>;
