//! Integration tests for the Gmail bridge
//!
//! Exercise the mail client, the credential store, and the tool registry
//! against a mock Gmail API; no real API calls are made.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gmail_bridge::auth::{Credential, CredentialStore};
use gmail_bridge::gmail::client::GmailClient;
use gmail_bridge::gmail::mime::{decode_base64url_string, OutgoingMessage};
use gmail_bridge::mcp::tools::ToolRegistry;

/// Store holding a fresh credential, so client calls never hit a token
/// endpoint.
fn fresh_store(dir: &tempfile::TempDir) -> Arc<CredentialStore> {
    let credential = Credential {
        token: "test-access-token".to_string(),
        refresh_token: Some("test-refresh-token".to_string()),
        token_uri: "http://127.0.0.1:1/token".to_string(),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        scopes: vec!["https://www.googleapis.com/auth/gmail.modify".to_string()],
        expiry: Some(Utc::now() + Duration::hours(1)),
    };

    let cred_path = dir.path().join("credentials.json");
    std::fs::write(&cred_path, serde_json::to_string(&credential).unwrap()).unwrap();
    Arc::new(CredentialStore::at_path(cred_path))
}

fn client(store: Arc<CredentialStore>, server: &MockServer) -> GmailClient {
    GmailClient::new(store).with_base_url(server.uri())
}

fn metadata_message(id: &str, subject: &str, from: &str) -> serde_json::Value {
    json!({
        "id": id,
        "threadId": format!("thread-{}", id),
        "snippet": format!("snippet of {}", id),
        "payload": {
            "mimeType": "text/html",
            "headers": [
                {"name": "Subject", "value": subject},
                {"name": "From", "value": from},
                {"name": "Date", "value": "Mon, 2 Jun 2025 10:00:00 +0000"}
            ]
        }
    })
}

async fn mount_metadata(server: &MockServer, id: &str, subject: &str, from: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/users/me/messages/{}", id)))
        .and(query_param("format", "metadata"))
        .respond_with(ResponseTemplate::new(200).set_body_json(metadata_message(id, subject, from)))
        .mount(server)
        .await;
}

fn b64url(content: &str) -> String {
    gmail_bridge::gmail::mime::encode_raw_message(content)
}

#[tokio::test]
async fn list_respects_max_results_and_order() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    // The mailbox holds 5 messages; the page size caps the listing at 3.
    Mock::given(method("GET"))
        .and(path("/users/me/messages"))
        .and(query_param("labelIds", "INBOX"))
        .and(query_param("maxResults", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [
                {"id": "m1", "threadId": "t1"},
                {"id": "m2", "threadId": "t2"},
                {"id": "m3", "threadId": "t3"}
            ],
            "resultSizeEstimate": 5
        })))
        .mount(&server)
        .await;

    mount_metadata(&server, "m1", "First", "alice@example.com").await;
    mount_metadata(&server, "m2", "Second", "bob@example.com").await;
    mount_metadata(&server, "m3", "Third", "carol@example.com").await;

    let client = client(fresh_store(&dir), &server);
    let emails = client.list_emails(3, "INBOX").await.unwrap();

    assert_eq!(emails.len(), 3);
    assert_eq!(
        emails.iter().map(|e| e.id.as_str()).collect::<Vec<_>>(),
        vec!["m1", "m2", "m3"]
    );
    for email in &emails {
        assert!(!email.subject.is_empty());
        assert!(!email.from.is_empty());
        assert!(!email.date.is_empty());
    }
    assert_eq!(emails[0].subject, "First");
}

#[tokio::test]
async fn list_resolves_label_name_case_insensitively() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "labels": [
                {"id": "INBOX", "name": "INBOX", "type": "system"},
                {"id": "Label_7", "name": "Work", "type": "user"}
            ]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/users/me/messages"))
        .and(query_param("labelIds", "Label_7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"messages": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(fresh_store(&dir), &server);
    let emails = client.list_emails(10, "work").await.unwrap();
    assert!(emails.is_empty());
}

#[tokio::test]
async fn search_uses_query_and_fetches_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me/messages"))
        .and(query_param("q", "from:alice is:unread"))
        .and(query_param("maxResults", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"id": "m9", "threadId": "t9"}]
        })))
        .mount(&server)
        .await;

    mount_metadata(&server, "m9", "Found", "alice@example.com").await;

    let client = client(fresh_store(&dir), &server);
    let emails = client.search_emails("from:alice is:unread", 5).await.unwrap();
    assert_eq!(emails.len(), 1);
    assert_eq!(emails[0].subject, "Found");
}

#[tokio::test]
async fn read_prefers_plain_text_over_html() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me/messages/m1"))
        .and(query_param("format", "full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "m1",
            "threadId": "t1",
            "payload": {
                "mimeType": "multipart/alternative",
                "headers": [
                    {"name": "Subject", "value": "Multipart"},
                    {"name": "From", "value": "Alice <alice@example.com>"},
                    {"name": "Date", "value": "Mon, 2 Jun 2025 10:00:00 +0000"}
                ],
                "parts": [
                    {
                        "mimeType": "text/html",
                        "body": {"data": b64url("<h1>html body</h1>")}
                    },
                    {
                        "mimeType": "text/plain",
                        "body": {"data": b64url("the plain body")}
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = client(fresh_store(&dir), &server);
    let email = client.read_email("m1").await.unwrap();
    assert_eq!(email.subject, "Multipart");
    assert_eq!(email.body, "the plain body");
}

#[tokio::test]
async fn read_missing_message_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me/messages/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": {"code": 404}})))
        .mount(&server)
        .await;

    let client = client(fresh_store(&dir), &server);
    let err = client.read_email("gone").await.unwrap_err();
    assert!(err.to_string().contains("gone"));
}

#[tokio::test]
async fn send_encodes_recipients_and_body() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/me/messages/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "sent-1",
            "threadId": "t-sent"
        })))
        .mount(&server)
        .await;

    let client = client(fresh_store(&dir), &server);
    let message_id = client
        .send_email(&OutgoingMessage {
            to: "dest@example.com".to_string(),
            subject: "Greetings".to_string(),
            body: "Hello there".to_string(),
            cc: Some("cc@example.com".to_string()),
            bcc: None,
        })
        .await
        .unwrap();

    assert_eq!(message_id, "sent-1");

    let requests = server.received_requests().await.unwrap();
    let send_request = requests
        .iter()
        .find(|r| r.url.path().ends_with("/send"))
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&send_request.body).unwrap();
    let raw = decode_base64url_string(body["raw"].as_str().unwrap()).unwrap();

    assert!(raw.contains("To: dest@example.com"));
    assert!(raw.contains("Cc: cc@example.com"));
    assert!(raw.contains("Subject: Greetings"));
    assert!(raw.ends_with("Hello there"));
}

#[tokio::test]
async fn expired_credential_refreshes_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access-token",
            "expires_in": 3600,
            "scope": "https://www.googleapis.com/auth/gmail.modify"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let credential = Credential {
        token: "stale-token".to_string(),
        refresh_token: Some("test-refresh-token".to_string()),
        token_uri: format!("{}/token", server.uri()),
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        scopes: vec![],
        expiry: Some(Utc::now() - Duration::hours(1)),
    };

    let cred_path = dir.path().join("credentials.json");
    std::fs::write(&cred_path, serde_json::to_string(&credential).unwrap()).unwrap();
    let store = CredentialStore::at_path(cred_path);

    // The second call finds the refreshed token still fresh.
    assert_eq!(store.access_token().await.unwrap(), "new-access-token");
    assert_eq!(store.access_token().await.unwrap(), "new-access-token");

    let (authenticated, expires_at) = store.status().await;
    assert!(authenticated);
    assert!(expires_at.unwrap() > Utc::now());
}

#[tokio::test]
async fn mark_as_read_records_partial_failure() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/me/messages/id1/modify"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "id1"})))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/users/me/messages/id2/modify"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": {"code": 404}})))
        .mount(&server)
        .await;

    let client = client(fresh_store(&dir), &server);
    let outcome = client
        .mark_as_read(&["id1".to_string(), "id2".to_string()], true)
        .await;

    assert!(outcome.is_success());
    assert_eq!(outcome.succeeded, 1);
    assert_eq!(outcome.failed(), 1);
    assert_eq!(outcome.failures[0].0, "id2");
}

#[tokio::test]
async fn move_to_unknown_label_fails_before_any_modify() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "labels": [{"id": "Label_1", "name": "Receipts", "type": "user"}]
        })))
        .mount(&server)
        .await;

    let client = client(fresh_store(&dir), &server);
    let err = client
        .move_to_label(&["id1".to_string()], "NoSuchLabel")
        .await
        .unwrap_err();

    assert!(err.to_string().contains("NoSuchLabel"));
}

#[tokio::test]
async fn reply_quotes_original_and_prefixes_subject() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me/messages/m1"))
        .and(query_param("format", "full"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "m1",
            "payload": {
                "mimeType": "text/plain",
                "headers": [
                    {"name": "Subject", "value": "Question"},
                    {"name": "From", "value": "Alice <alice@example.com>"},
                    {"name": "Date", "value": "Mon, 2 Jun 2025 10:00:00 +0000"}
                ],
                "body": {"data": b64url("original text")}
            }
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/users/me/messages/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sent-2"})))
        .mount(&server)
        .await;

    let client = client(fresh_store(&dir), &server);
    let message_id = client.reply("m1", "my answer", true).await.unwrap();
    assert_eq!(message_id, "sent-2");

    let requests = server.received_requests().await.unwrap();
    let send_request = requests
        .iter()
        .find(|r| r.url.path().ends_with("/send"))
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&send_request.body).unwrap();
    let raw = decode_base64url_string(body["raw"].as_str().unwrap()).unwrap();

    assert!(raw.contains("To: alice@example.com"));
    assert!(raw.contains("Subject: Re: Question"));
    assert!(raw.contains("my answer"));
    assert!(raw.contains("--- Original Message ---"));
    assert!(raw.contains("original text"));
}

#[tokio::test]
async fn get_attachments_walks_nested_parts() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me/messages/m1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "m1",
            "payload": {
                "mimeType": "multipart/mixed",
                "parts": [
                    {"mimeType": "text/plain", "body": {"data": b64url("body")}},
                    {
                        "mimeType": "application/pdf",
                        "filename": "invoice.pdf",
                        "body": {"attachmentId": "att-9", "size": 4096}
                    }
                ]
            }
        })))
        .mount(&server)
        .await;

    let client = client(fresh_store(&dir), &server);
    let attachments = client.get_attachments("m1").await.unwrap();

    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].filename, "invoice.pdf");
    assert_eq!(attachments[0].id, "att-9");
    assert_eq!(attachments[0].size, 4096);
}

#[tokio::test]
async fn create_label_posts_name_with_default_visibility() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/me/labels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "Label_42",
            "name": "Projects",
            "type": "user"
        })))
        .mount(&server)
        .await;

    let client = client(fresh_store(&dir), &server);
    let label = client.create_label("Projects").await.unwrap();
    assert_eq!(label.id, "Label_42");

    let requests = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["name"], "Projects");
    assert_eq!(body["labelListVisibility"], "labelShow");
    assert_eq!(body["messageListVisibility"], "show");
}

#[tokio::test]
async fn tool_call_converts_remote_failure_to_error_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me/messages"))
        .respond_with(ResponseTemplate::new(500).set_body_string("backend exploded"))
        .mount(&server)
        .await;

    let registry = ToolRegistry::new(Arc::new(client(fresh_store(&dir), &server)));
    let result = registry
        .call("gmail_list_emails", json!({"label": "INBOX"}))
        .await;

    let message = result["error"].as_str().unwrap();
    assert!(message.contains("500"));
}

#[tokio::test]
async fn tool_call_unknown_name_is_error_envelope() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    let registry = ToolRegistry::new(Arc::new(client(fresh_store(&dir), &server)));
    let result = registry.call("gmail_purge_inbox", json!({})).await;

    assert_eq!(result["error"], "Unknown tool: gmail_purge_inbox");
}

#[tokio::test]
async fn tool_call_list_returns_count_and_emails() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/me/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messages": [{"id": "m1", "threadId": "t1"}]
        })))
        .mount(&server)
        .await;

    mount_metadata(&server, "m1", "Only one", "alice@example.com").await;

    let registry = ToolRegistry::new(Arc::new(client(fresh_store(&dir), &server)));
    let result = registry.call("gmail_list_emails", json!({})).await;

    assert_eq!(result["count"], 1);
    assert_eq!(result["emails"][0]["subject"], "Only one");
}

#[tokio::test]
async fn tool_call_send_reports_message_id() {
    let dir = tempfile::tempdir().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users/me/messages/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sent-3"})))
        .mount(&server)
        .await;

    let registry = ToolRegistry::new(Arc::new(client(fresh_store(&dir), &server)));
    let result = registry
        .call(
            "gmail_send_email",
            json!({"to": "dest@example.com", "subject": "S", "body": "B"}),
        )
        .await;

    assert_eq!(result["message_id"], "sent-3");
    assert_eq!(result["message"], "Email sent successfully");
}

#[tokio::test]
async fn unauthenticated_store_surfaces_as_tool_error() {
    let server = MockServer::start().await;
    let store = Arc::new(CredentialStore::at_path(PathBuf::from(
        "/nonexistent/credentials.json",
    )));

    let registry = ToolRegistry::new(Arc::new(client(store, &server)));
    let result = registry.call("gmail_get_labels", json!({})).await;

    assert!(result["error"].as_str().unwrap().contains("Not authenticated"));
}
