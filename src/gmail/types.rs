//! Gmail API type definitions
//!
//! Wire types mirror the Gmail API payloads; the flat record types at the
//! bottom are what operations return to callers.

use serde::{Deserialize, Serialize};

/// A Gmail message part (MIME part)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    /// MIME type of this part
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    /// Filename for attachments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,

    /// Headers for this part
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Header>,

    /// Body of this part
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<MessagePartBody>,

    /// Nested parts (for multipart messages)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<MessagePart>,
}

/// Header in a message part
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Header {
    /// Header name
    pub name: String,

    /// Header value
    pub value: String,
}

/// Body of a message part
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessagePartBody {
    /// Attachment ID (if this is an attachment)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attachment_id: Option<String>,

    /// Size in bytes
    #[serde(default)]
    pub size: i64,

    /// Base64url-encoded data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// A Gmail message
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message ID
    pub id: String,

    /// Thread ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,

    /// Label IDs
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub label_ids: Vec<String>,

    /// Snippet (preview text)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,

    /// Message payload (MIME structure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<MessagePart>,
}

/// List of messages response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageList {
    /// Messages in this page
    #[serde(default)]
    pub messages: Vec<MessageRef>,

    /// Next page token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Reference to a message (id and thread_id only)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// Message ID
    pub id: String,

    /// Thread ID
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// A Gmail label
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    /// Label ID
    pub id: String,

    /// Label name
    pub name: String,

    /// Label type (system or user)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub label_type: Option<String>,
}

/// List of labels response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelList {
    /// Labels
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// Request to create a label
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLabelRequest {
    /// Label name
    pub name: String,

    /// Message list visibility
    pub message_list_visibility: String,

    /// Label list visibility
    pub label_list_visibility: String,
}

/// Request to modify message labels
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModifyMessageRequest {
    /// Label IDs to add
    #[serde(skip_serializing_if = "Option::is_none")]
    pub add_label_ids: Option<Vec<String>>,

    /// Label IDs to remove
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remove_label_ids: Option<Vec<String>>,
}

/// Request to send a raw message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    /// Raw RFC822 message (base64url encoded)
    pub raw: String,
}

/// Flat summary record produced by list and search
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailSummary {
    /// Message ID
    pub id: String,

    /// Subject header
    pub subject: String,

    /// From header
    pub from: String,

    /// Date header, as supplied by the provider
    pub date: String,

    /// Preview snippet
    pub snippet: String,
}

/// Flat detail record produced by read
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailDetail {
    /// Message ID
    pub id: String,

    /// Subject header
    pub subject: String,

    /// From header
    pub from: String,

    /// Date header, as supplied by the provider
    pub date: String,

    /// Decoded plain-text body
    pub body: String,
}

/// Attachment info collected from a message's MIME parts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentInfo {
    /// Attachment ID
    pub id: String,

    /// Filename
    pub filename: String,

    /// MIME type
    pub mime_type: String,

    /// Size in bytes
    pub size: i64,
}

/// Aggregate outcome of a per-message bulk operation
#[derive(Debug, Clone, Default)]
pub struct BulkOutcome {
    /// Number of messages processed successfully
    pub succeeded: usize,

    /// Per-message failures (id, error message)
    pub failures: Vec<(String, String)>,
}

impl BulkOutcome {
    /// Overall success: at least one message went through
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }

    /// Number of failed messages
    pub fn failed(&self) -> usize {
        self.failures.len()
    }
}
