//! MIME helpers
//!
//! Message assembly for send, body/attachment extraction for read, and the
//! base64url encoding the Gmail API uses for raw message payloads.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

use crate::error::{GmailBridgeError, Result, ValidationError};
use crate::gmail::types::{AttachmentInfo, MessagePart};

/// Placeholder body used when a text part cannot be decoded
pub const UNDECODABLE_BODY: &str = "Unable to decode email body";

/// Validate an email address
pub fn validate_email(email: &str) -> bool {
    let parts: Vec<&str> = email.split('@').collect();
    if parts.len() != 2 {
        return false;
    }
    let (local, domain) = (parts[0], parts[1]);

    !local.is_empty()
        && !domain.is_empty()
        && !local.contains(' ')
        && !domain.contains(' ')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
}

/// Encode text for a MIME header (RFC 2047)
pub fn encode_mime_header(text: &str) -> String {
    if text.chars().all(|c| c.is_ascii() && c != '\r' && c != '\n') {
        return text.to_string();
    }

    format!(
        "=?UTF-8?B?{}?=",
        base64::engine::general_purpose::STANDARD.encode(text.as_bytes())
    )
}

/// Encode a raw email message for the Gmail API (base64url, no padding)
pub fn encode_raw_message(message: &str) -> String {
    URL_SAFE_NO_PAD.encode(message.as_bytes())
}

/// Decode base64url data from the Gmail API
///
/// Handles both padded and non-padded variants; provider responses are
/// usually unpadded.
pub fn decode_base64url(data: &str) -> Result<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(data)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(data))
        .or_else(|_| base64::engine::general_purpose::STANDARD.decode(data))
        .map_err(|e| {
            GmailBridgeError::Validation(ValidationError::InvalidParameter {
                name: "base64 data".to_string(),
                message: e.to_string(),
            })
        })
}

/// Decode base64url data to a UTF-8 string
pub fn decode_base64url_string(data: &str) -> Result<String> {
    let bytes = decode_base64url(data)?;
    String::from_utf8(bytes).map_err(|e| {
        GmailBridgeError::Validation(ValidationError::InvalidParameter {
            name: "UTF-8 content".to_string(),
            message: e.to_string(),
        })
    })
}

/// Find a header value by name (case-insensitive)
pub fn find_header<'a>(part: &'a MessagePart, name: &str) -> Option<&'a str> {
    part.headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .map(|h| h.value.as_str())
}

/// Extract the plain-text body from a MIME part tree
///
/// Walks the tree depth-first and decodes the first `text/plain` part.
/// Returns an empty string when no plain-text part exists, and a
/// placeholder when one exists but cannot be decoded.
pub fn extract_plain_text(part: &MessagePart) -> String {
    fn first_plain_data(part: &MessagePart) -> Option<&str> {
        if part.mime_type.as_deref() == Some("text/plain") {
            if let Some(data) = part.body.as_ref().and_then(|b| b.data.as_deref()) {
                return Some(data);
            }
        }
        part.parts.iter().find_map(first_plain_data)
    }

    match first_plain_data(part) {
        Some(data) => decode_base64url_string(data).unwrap_or_else(|e| {
            tracing::debug!("failed to decode text/plain part: {}", e);
            UNDECODABLE_BODY.to_string()
        }),
        None => String::new(),
    }
}

/// Collect attachment info from a MIME part tree
///
/// An attachment is any part carrying both a filename and an attachment id.
pub fn extract_attachments(part: &MessagePart) -> Vec<AttachmentInfo> {
    let mut attachments = Vec::new();
    collect_attachments(part, &mut attachments);
    attachments
}

fn collect_attachments(part: &MessagePart, attachments: &mut Vec<AttachmentInfo>) {
    if let (Some(filename), Some(body)) = (part.filename.as_deref(), part.body.as_ref()) {
        if !filename.is_empty() {
            if let Some(attachment_id) = body.attachment_id.as_deref() {
                attachments.push(AttachmentInfo {
                    id: attachment_id.to_string(),
                    filename: filename.to_string(),
                    mime_type: part
                        .mime_type
                        .clone()
                        .unwrap_or_else(|| "application/octet-stream".to_string()),
                    size: body.size,
                });
            }
        }
    }

    for subpart in &part.parts {
        collect_attachments(subpart, attachments);
    }
}

/// Extract the bare address from a `Name <addr>` From header
pub fn sender_address(from_header: &str) -> String {
    if let (Some(start), Some(end)) = (from_header.find('<'), from_header.rfind('>')) {
        if start < end {
            return from_header[start + 1..end].to_string();
        }
    }
    from_header.trim().to_string()
}

/// Prefix a subject with `Re:` unless already present
pub fn reply_subject(subject: &str) -> String {
    if subject.starts_with("Re:") {
        subject.to_string()
    } else {
        format!("Re: {}", subject)
    }
}

/// Prefix a subject with `Fwd:` unless already present
pub fn forward_subject(subject: &str) -> String {
    if subject.starts_with("Fwd:") {
        subject.to_string()
    } else {
        format!("Fwd: {}", subject)
    }
}

/// Recipients and content of an outgoing plain-text message
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub cc: Option<String>,
    pub bcc: Option<String>,
}

/// Assemble a single-part plain-text RFC822 message
pub fn build_plain_message(params: &OutgoingMessage) -> Result<String> {
    if !validate_email(&params.to) {
        return Err(GmailBridgeError::Validation(ValidationError::InvalidEmail {
            email: params.to.clone(),
        }));
    }

    let mut lines = Vec::new();

    lines.push("From: me".to_string());
    lines.push(format!("To: {}", params.to));

    if let Some(ref cc) = params.cc {
        if !cc.is_empty() {
            lines.push(format!("Cc: {}", cc));
        }
    }

    if let Some(ref bcc) = params.bcc {
        if !bcc.is_empty() {
            lines.push(format!("Bcc: {}", bcc));
        }
    }

    lines.push(format!("Subject: {}", encode_mime_header(&params.subject)));
    lines.push("MIME-Version: 1.0".to_string());
    lines.push("Content-Type: text/plain; charset=UTF-8".to_string());
    lines.push("Content-Transfer-Encoding: 7bit".to_string());
    lines.push(String::new());
    lines.push(params.body.clone());

    Ok(lines.join("\r\n"))
}
