//! Gmail API client
//!
//! Translates each domain operation into one remote call (or one-plus-N for
//! the per-message list operations) and reshapes the responses into the flat
//! records of `gmail::types`.

use std::sync::Arc;

use crate::auth::CredentialStore;
use crate::config::gmail::{is_system_label, API_BASE_URL, USER_ID};
use crate::error::{ApiError, GmailBridgeError, Result};
use crate::gmail::mime::{
    build_plain_message, encode_raw_message, extract_attachments, extract_plain_text, find_header,
    forward_subject, reply_subject, sender_address, OutgoingMessage,
};
use crate::gmail::types::*;

/// Gmail API client
pub struct GmailClient {
    /// HTTP client
    http_client: reqwest::Client,

    /// Credential store supplying bearer tokens
    store: Arc<CredentialStore>,

    /// API base URL, overridable for tests
    base_url: String,
}

impl GmailClient {
    /// Create a new Gmail client
    pub fn new(store: Arc<CredentialStore>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            store,
            base_url: API_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (used by tests)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Get a valid access token
    async fn access_token(&self) -> Result<String> {
        self.store.access_token().await
    }

    /// Base URL for messages
    fn messages_url(&self) -> String {
        format!("{}/users/{}/messages", self.base_url, USER_ID)
    }

    /// Base URL for labels
    fn labels_url(&self) -> String {
        format!("{}/users/{}/labels", self.base_url, USER_ID)
    }

    async fn fail(response: reqwest::Response) -> GmailBridgeError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        GmailBridgeError::Api(ApiError::RequestFailed { status, body })
    }

    // ==================== Message Operations ====================

    /// List messages under a label, newest first as returned by the provider
    ///
    /// Label names that are not system labels are resolved case-insensitively
    /// through the label list before querying.
    pub async fn list_emails(&self, max_results: u32, label: &str) -> Result<Vec<EmailSummary>> {
        let label_id = self.resolve_label(label).await?;

        let token = self.access_token().await?;
        let url = format!(
            "{}?labelIds={}&maxResults={}",
            self.messages_url(),
            urlencoding::encode(&label_id),
            max_results
        );

        let response = self.http_client.get(&url).bearer_auth(&token).send().await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let message_list: MessageList = response.json().await?;
        self.fetch_summaries(&token, &message_list.messages).await
    }

    /// Search messages with the provider's query syntax
    pub async fn search_emails(&self, query: &str, max_results: u32) -> Result<Vec<EmailSummary>> {
        let token = self.access_token().await?;
        let url = format!(
            "{}?q={}&maxResults={}",
            self.messages_url(),
            urlencoding::encode(query),
            max_results
        );

        let response = self.http_client.get(&url).bearer_auth(&token).send().await?;
        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let message_list: MessageList = response.json().await?;
        self.fetch_summaries(&token, &message_list.messages).await
    }

    /// Fetch the metadata triplet plus snippet for each listed message id
    async fn fetch_summaries(
        &self,
        token: &str,
        refs: &[MessageRef],
    ) -> Result<Vec<EmailSummary>> {
        let mut summaries = Vec::with_capacity(refs.len());

        for msg_ref in refs {
            let url = format!(
                "{}/{}?format=metadata&metadataHeaders=Subject&metadataHeaders=From&metadataHeaders=Date",
                self.messages_url(),
                msg_ref.id
            );

            let response = self.http_client.get(&url).bearer_auth(token).send().await?;
            if !response.status().is_success() {
                return Err(Self::fail(response).await);
            }

            let message: Message = response.json().await?;
            let payload = message.payload.as_ref();

            summaries.push(EmailSummary {
                id: message.id,
                subject: payload
                    .and_then(|p| find_header(p, "subject"))
                    .unwrap_or("No Subject")
                    .to_string(),
                from: payload
                    .and_then(|p| find_header(p, "from"))
                    .unwrap_or("Unknown")
                    .to_string(),
                date: payload
                    .and_then(|p| find_header(p, "date"))
                    .unwrap_or("Unknown")
                    .to_string(),
                snippet: message.snippet.unwrap_or_default(),
            });
        }

        Ok(summaries)
    }

    /// Fetch a full message by id
    async fn get_message(&self, message_id: &str) -> Result<Message> {
        let token = self.access_token().await?;
        let url = format!("{}/{}?format=full", self.messages_url(), message_id);

        let response = self.http_client.get(&url).bearer_auth(&token).send().await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else if response.status().as_u16() == 404 {
            Err(GmailBridgeError::Api(ApiError::MessageNotFound {
                message_id: message_id.to_string(),
            }))
        } else {
            Err(Self::fail(response).await)
        }
    }

    /// Read a message: header triplet plus decoded plain-text body
    pub async fn read_email(&self, email_id: &str) -> Result<EmailDetail> {
        let message = self.get_message(email_id).await?;
        let payload = message.payload.as_ref();

        Ok(EmailDetail {
            id: message.id.clone(),
            subject: payload
                .and_then(|p| find_header(p, "subject"))
                .unwrap_or("No Subject")
                .to_string(),
            from: payload
                .and_then(|p| find_header(p, "from"))
                .unwrap_or("Unknown")
                .to_string(),
            date: payload
                .and_then(|p| find_header(p, "date"))
                .unwrap_or("Unknown")
                .to_string(),
            body: payload.map(extract_plain_text).unwrap_or_default(),
        })
    }

    /// Send a plain-text email; returns the provider-assigned message id
    pub async fn send_email(&self, params: &OutgoingMessage) -> Result<String> {
        let token = self.access_token().await?;

        let raw_message = build_plain_message(params)?;
        let request = SendMessageRequest {
            raw: encode_raw_message(&raw_message),
        };

        let url = format!("{}/send", self.messages_url());
        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let message: Message = response.json().await?;
        Ok(message.id)
    }

    /// Apply a label modification to a single message
    async fn modify_message(
        &self,
        message_id: &str,
        add_label_ids: Option<Vec<String>>,
        remove_label_ids: Option<Vec<String>>,
    ) -> Result<()> {
        let token = self.access_token().await?;
        let url = format!("{}/{}/modify", self.messages_url(), message_id);

        let request = ModifyMessageRequest {
            add_label_ids,
            remove_label_ids,
        };

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else if response.status().as_u16() == 404 {
            Err(GmailBridgeError::Api(ApiError::MessageNotFound {
                message_id: message_id.to_string(),
            }))
        } else {
            Err(Self::fail(response).await)
        }
    }

    /// Apply one modification per message id, aggregating the outcome
    ///
    /// Partial failures are recorded, not retried; the operation succeeds
    /// overall when at least one message went through.
    async fn modify_each(
        &self,
        email_ids: &[String],
        add_label_ids: Option<Vec<String>>,
        remove_label_ids: Option<Vec<String>>,
    ) -> BulkOutcome {
        let mut outcome = BulkOutcome::default();

        for email_id in email_ids {
            match self
                .modify_message(email_id, add_label_ids.clone(), remove_label_ids.clone())
                .await
            {
                Ok(()) => outcome.succeeded += 1,
                Err(e) => {
                    tracing::warn!("failed to modify message {}: {}", email_id, e);
                    outcome.failures.push((email_id.clone(), e.to_string()));
                }
            }
        }

        outcome
    }

    /// Mark messages read (remove UNREAD) or unread (add UNREAD)
    pub async fn mark_as_read(&self, email_ids: &[String], read: bool) -> BulkOutcome {
        let unread = Some(vec!["UNREAD".to_string()]);
        if read {
            self.modify_each(email_ids, None, unread).await
        } else {
            self.modify_each(email_ids, unread, None).await
        }
    }

    /// Star or unstar messages
    pub async fn star_emails(&self, email_ids: &[String], starred: bool) -> BulkOutcome {
        let star = Some(vec!["STARRED".to_string()]);
        if starred {
            self.modify_each(email_ids, star, None).await
        } else {
            self.modify_each(email_ids, None, star).await
        }
    }

    /// Move messages to a label, resolving the label name first
    pub async fn move_to_label(&self, email_ids: &[String], label_name: &str) -> Result<BulkOutcome> {
        let label_id = self
            .find_label_id(label_name)
            .await?
            .ok_or_else(|| {
                GmailBridgeError::Api(ApiError::LabelNotFound {
                    name: label_name.to_string(),
                })
            })?;

        Ok(self
            .modify_each(email_ids, Some(vec![label_id]), None)
            .await)
    }

    /// Reply to a message, quoting the original body when asked
    pub async fn reply(
        &self,
        email_id: &str,
        body: &str,
        include_original: bool,
    ) -> Result<String> {
        let original = self.read_email(email_id).await?;

        let reply_body = if include_original {
            format!("{}\n\n--- Original Message ---\n{}", body, original.body)
        } else {
            body.to_string()
        };

        self.send_email(&OutgoingMessage {
            to: sender_address(&original.from),
            subject: reply_subject(&original.subject),
            body: reply_body,
            cc: None,
            bcc: None,
        })
        .await
    }

    /// Forward a message to a new recipient with an optional note
    pub async fn forward(&self, email_id: &str, to: &str, note: &str) -> Result<String> {
        let original = self.read_email(email_id).await?;

        let forward_body = format!(
            "{}\n\n--- Forwarded Message ---\n{}",
            note, original.body
        );

        self.send_email(&OutgoingMessage {
            to: to.to_string(),
            subject: forward_subject(&original.subject),
            body: forward_body,
            cc: None,
            bcc: None,
        })
        .await
    }

    /// List attachments of a message
    pub async fn get_attachments(&self, email_id: &str) -> Result<Vec<AttachmentInfo>> {
        let message = self.get_message(email_id).await?;
        Ok(message
            .payload
            .as_ref()
            .map(extract_attachments)
            .unwrap_or_default())
    }

    // ==================== Label Operations ====================

    /// List all labels with id, name and type
    pub async fn get_labels(&self) -> Result<Vec<Label>> {
        let token = self.access_token().await?;

        let response = self
            .http_client
            .get(self.labels_url())
            .bearer_auth(&token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        let label_list: LabelList = response.json().await?;
        Ok(label_list.labels)
    }

    /// Create a user label with default visibility
    pub async fn create_label(&self, name: &str) -> Result<Label> {
        let token = self.access_token().await?;

        let request = CreateLabelRequest {
            name: name.to_string(),
            message_list_visibility: "show".to_string(),
            label_list_visibility: "labelShow".to_string(),
        };

        let response = self
            .http_client
            .post(self.labels_url())
            .bearer_auth(&token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::fail(response).await);
        }

        Ok(response.json().await?)
    }

    /// Find a label id by name (case-insensitive)
    async fn find_label_id(&self, name: &str) -> Result<Option<String>> {
        let labels = self.get_labels().await?;
        Ok(labels
            .into_iter()
            .find(|l| l.name.eq_ignore_ascii_case(name))
            .map(|l| l.id))
    }

    /// Resolve a label argument to an id for listing
    ///
    /// System label names pass through untouched. Other names are looked up
    /// case-insensitively; an unresolved name falls through as a raw id,
    /// which the provider will reject with its own error.
    async fn resolve_label(&self, label: &str) -> Result<String> {
        if is_system_label(label) {
            return Ok(label.to_string());
        }

        match self.find_label_id(label).await? {
            Some(id) => Ok(id),
            None => {
                tracing::warn!("label '{}' not found, passing it through as an id", label);
                Ok(label.to_string())
            }
        }
    }
}
