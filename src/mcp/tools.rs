//! Tool catalog and dispatch
//!
//! Exposes the five mail operations as tools with JSON-schema-described
//! parameters. Every tool invocation returns a JSON object; failures become
//! an `{"error": ...}` envelope so callers check for an `error` key instead
//! of relying on transport failures.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::Result;
use crate::gmail::client::GmailClient;
use crate::gmail::mime::OutgoingMessage;
use crate::mcp::types::Tool;

/// The closed set of exposed tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    ListEmails,
    ReadEmail,
    SendEmail,
    SearchEmails,
    GetLabels,
}

impl ToolKind {
    /// All tools in catalog order
    pub const ALL: [ToolKind; 5] = [
        ToolKind::ListEmails,
        ToolKind::ReadEmail,
        ToolKind::SendEmail,
        ToolKind::SearchEmails,
        ToolKind::GetLabels,
    ];

    /// Wire name of the tool
    pub fn name(self) -> &'static str {
        match self {
            ToolKind::ListEmails => "gmail_list_emails",
            ToolKind::ReadEmail => "gmail_read_email",
            ToolKind::SendEmail => "gmail_send_email",
            ToolKind::SearchEmails => "gmail_search_emails",
            ToolKind::GetLabels => "gmail_get_labels",
        }
    }

    /// Parse a wire name
    pub fn parse(name: &str) -> Option<ToolKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    fn description(self) -> &'static str {
        match self {
            ToolKind::ListEmails => "List recent emails from a Gmail label",
            ToolKind::ReadEmail => "Read the full content of a specific email",
            ToolKind::SendEmail => "Send an email from the authenticated account",
            ToolKind::SearchEmails => "Search emails using Gmail query syntax",
            ToolKind::GetLabels => "List all Gmail labels",
        }
    }

    fn input_schema(self) -> Value {
        match self {
            ToolKind::ListEmails => json!({
                "type": "object",
                "properties": {
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of emails to return",
                        "default": 10
                    },
                    "label": {
                        "type": "string",
                        "description": "Label to list emails from",
                        "default": "INBOX"
                    }
                }
            }),
            ToolKind::ReadEmail => json!({
                "type": "object",
                "properties": {
                    "email_id": {
                        "type": "string",
                        "description": "ID of the email to read"
                    }
                },
                "required": ["email_id"]
            }),
            ToolKind::SendEmail => json!({
                "type": "object",
                "properties": {
                    "to": {
                        "type": "string",
                        "description": "Recipient email address"
                    },
                    "subject": {
                        "type": "string",
                        "description": "Email subject"
                    },
                    "body": {
                        "type": "string",
                        "description": "Plain-text email body"
                    },
                    "cc": {
                        "type": "string",
                        "description": "CC recipients"
                    },
                    "bcc": {
                        "type": "string",
                        "description": "BCC recipients"
                    }
                },
                "required": ["to", "subject", "body"]
            }),
            ToolKind::SearchEmails => json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Gmail search query (e.g. 'from:someone is:unread')"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of emails to return",
                        "default": 10
                    }
                },
                "required": ["query"]
            }),
            ToolKind::GetLabels => json!({
                "type": "object",
                "properties": {}
            }),
        }
    }

    /// Catalog entry for this tool
    pub fn definition(self) -> Tool {
        Tool {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: self.input_schema(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListEmailsArgs {
    #[serde(default = "default_max_results")]
    max_results: u32,
    #[serde(default = "default_label")]
    label: String,
}

#[derive(Debug, Deserialize)]
struct ReadEmailArgs {
    email_id: String,
}

#[derive(Debug, Deserialize)]
struct SendEmailArgs {
    to: String,
    subject: String,
    body: String,
    #[serde(default)]
    cc: Option<String>,
    #[serde(default)]
    bcc: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchEmailsArgs {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: u32,
}

fn default_max_results() -> u32 {
    10
}

fn default_label() -> String {
    "INBOX".to_string()
}

/// Tool registry backed by a shared Gmail client
pub struct ToolRegistry {
    client: Arc<GmailClient>,
}

impl ToolRegistry {
    /// Create a new registry
    pub fn new(client: Arc<GmailClient>) -> Self {
        Self { client }
    }

    /// List all available tools
    pub fn list_tools(&self) -> Vec<Tool> {
        ToolKind::ALL.iter().map(|kind| kind.definition()).collect()
    }

    /// Invoke a tool by name
    ///
    /// Always produces a JSON object; an unknown name or any client failure
    /// comes back as an `{"error": ...}` envelope.
    pub async fn call(&self, name: &str, args: Value) -> Value {
        let kind = match ToolKind::parse(name) {
            Some(kind) => kind,
            None => return json!({"error": format!("Unknown tool: {}", name)}),
        };

        match self.dispatch(kind, args).await {
            Ok(payload) => payload,
            Err(e) => json!({"error": e.to_string()}),
        }
    }

    async fn dispatch(&self, kind: ToolKind, args: Value) -> Result<Value> {
        match kind {
            ToolKind::ListEmails => {
                let args: ListEmailsArgs = parse_args(args)?;
                let emails = self.client.list_emails(args.max_results, &args.label).await?;
                let count = emails.len();
                Ok(json!({"emails": emails, "count": count}))
            }
            ToolKind::ReadEmail => {
                let args: ReadEmailArgs = parse_args(args)?;
                let email = self.client.read_email(&args.email_id).await?;
                Ok(serde_json::to_value(email)?)
            }
            ToolKind::SendEmail => {
                let args: SendEmailArgs = parse_args(args)?;
                let message_id = self
                    .client
                    .send_email(&OutgoingMessage {
                        to: args.to,
                        subject: args.subject,
                        body: args.body,
                        cc: args.cc,
                        bcc: args.bcc,
                    })
                    .await?;
                Ok(json!({"message": "Email sent successfully", "message_id": message_id}))
            }
            ToolKind::SearchEmails => {
                let args: SearchEmailsArgs = parse_args(args)?;
                let emails = self.client.search_emails(&args.query, args.max_results).await?;
                let count = emails.len();
                Ok(json!({"emails": emails, "count": count}))
            }
            ToolKind::GetLabels => {
                let labels = self.client.get_labels().await?;
                Ok(json!({"labels": labels}))
            }
        }
    }
}

fn parse_args<T: serde::de::DeserializeOwned>(args: Value) -> Result<T> {
    serde_json::from_value(args).map_err(|e| {
        crate::error::McpError::InvalidArguments {
            message: e.to_string(),
        }
        .into()
    })
}
