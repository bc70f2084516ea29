use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info};

use coursefinder_core::config::MessengerConfig;
use coursefinder_core::domain::user::UserId;

pub const MESSAGE_METADATA: &str = "DEVELOPER_DEFINED_METADATA";

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SendReceipt {
    pub recipient_id: Option<String>,
    pub message_id: Option<String>,
}

/// A failed Send API call. `status_code` is absent for transport failures.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("send failed (status {status_code:?}): {message}")]
pub struct SendError {
    pub status_code: Option<u16>,
    pub message: String,
}

impl SendError {
    fn transport(message: impl Into<String>) -> Self {
        Self { status_code: None, message: message.into() }
    }
}

/// Outbound text delivery. Implementations never retry.
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_text(&self, recipient: &UserId, text: &str) -> Result<SendReceipt, SendError>;
}

pub fn outbound_payload(recipient: &UserId, text: &str) -> Value {
    json!({
        "recipient": { "id": recipient.0 },
        "message": { "text": text, "metadata": MESSAGE_METADATA },
    })
}

/// Graph API `me/messages` client.
pub struct GraphSendClient {
    http: reqwest::Client,
    endpoint: String,
    page_access_token: SecretString,
}

impl GraphSendClient {
    pub fn new(
        graph_api_url: &str,
        page_access_token: SecretString,
        timeout: Duration,
    ) -> Result<Self, SendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| SendError::transport(error.to_string()))?;
        let endpoint = format!("{}/me/messages", graph_api_url.trim_end_matches('/'));
        Ok(Self { http, endpoint, page_access_token })
    }

    pub fn from_config(config: &MessengerConfig) -> Result<Self, SendError> {
        Self::new(
            &config.graph_api_url,
            config.page_access_token.clone(),
            Duration::from_secs(config.send_timeout_secs),
        )
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    recipient_id: Option<String>,
    message_id: Option<String>,
}

#[async_trait]
impl MessageSender for GraphSendClient {
    async fn send_text(&self, recipient: &UserId, text: &str) -> Result<SendReceipt, SendError> {
        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("access_token", self.page_access_token.expose_secret())])
            .json(&outbound_payload(recipient, text))
            .send()
            .await
            .map_err(|error| {
                let error = error.without_url();
                error!(
                    event_name = "messenger.send.transport_failed",
                    user_id = %recipient,
                    error = %error,
                    "send api request failed"
                );
                SendError::transport(error.to_string())
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!(
                event_name = "messenger.send.rejected",
                user_id = %recipient,
                status_code = status.as_u16(),
                body = %body,
                "send api rejected message"
            );
            return Err(SendError { status_code: Some(status.as_u16()), message: body });
        }

        let receipt = serde_json::from_str::<SendResponse>(&body)
            .map(|parsed| SendReceipt {
                recipient_id: parsed.recipient_id,
                message_id: parsed.message_id,
            })
            .unwrap_or_default();
        match &receipt.message_id {
            Some(message_id) => info!(
                event_name = "messenger.send.delivered",
                user_id = %recipient,
                message_id = %message_id,
                "sent message"
            ),
            None => info!(
                event_name = "messenger.send.delivered",
                user_id = %recipient,
                "send api call succeeded"
            ),
        }
        Ok(receipt)
    }
}

#[derive(Default)]
pub struct NoopSender;

#[async_trait]
impl MessageSender for NoopSender {
    async fn send_text(&self, _recipient: &UserId, _text: &str) -> Result<SendReceipt, SendError> {
        Ok(SendReceipt::default())
    }
}

/// Keeps every outbound message in memory. Used by tests and the CLI.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<(UserId, String)>>,
}

impl RecordingSender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<(UserId, String)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl MessageSender for RecordingSender {
    async fn send_text(&self, recipient: &UserId, text: &str) -> Result<SendReceipt, SendError> {
        let mut sent = self.sent.lock().map_err(|_| SendError::transport("recorder poisoned"))?;
        sent.push((recipient.clone(), text.to_owned()));
        Ok(SendReceipt {
            recipient_id: Some(recipient.0.clone()),
            message_id: Some(format!("mid.{}", sent.len())),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use httpmock::prelude::*;
    use serde_json::json;

    use coursefinder_core::domain::user::UserId;

    use super::{outbound_payload, GraphSendClient, MessageSender, RecordingSender};

    fn client_for(server: &MockServer, token: &str) -> GraphSendClient {
        GraphSendClient::new(&server.base_url(), token.to_owned().into(), Duration::from_secs(5))
            .expect("client")
    }

    #[test]
    fn payload_carries_recipient_text_and_metadata() {
        let payload = outbound_payload(&UserId("u1".to_owned()), "hello");
        assert_eq!(payload["recipient"]["id"], "u1");
        assert_eq!(payload["message"]["text"], "hello");
        assert_eq!(payload["message"]["metadata"], "DEVELOPER_DEFINED_METADATA");
    }

    #[tokio::test]
    async fn successful_send_returns_message_id() {
        let server = MockServer::start_async().await;
        let send_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/me/messages")
                    .query_param("access_token", "page-token")
                    .json_body(json!({
                        "recipient": { "id": "u1" },
                        "message": { "text": "hi", "metadata": "DEVELOPER_DEFINED_METADATA" }
                    }));
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(json!({ "recipient_id": "u1", "message_id": "mid.1" }));
            })
            .await;

        let receipt = client_for(&server, "page-token")
            .send_text(&UserId("u1".to_owned()), "hi")
            .await
            .expect("send");
        send_mock.assert_async().await;
        assert_eq!(receipt.recipient_id.as_deref(), Some("u1"));
        assert_eq!(receipt.message_id.as_deref(), Some("mid.1"));
    }

    #[tokio::test]
    async fn rejected_send_surfaces_status_and_body() {
        let server = MockServer::start_async().await;
        let send_mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/me/messages").query_param("access_token", "bad-token");
                then.status(400)
                    .header("content-type", "application/json")
                    .json_body(json!({ "error": { "message": "Invalid OAuth" } }));
            })
            .await;

        let error = client_for(&server, "bad-token")
            .send_text(&UserId("u1".to_owned()), "hi")
            .await
            .expect_err("rejected");
        send_mock.assert_async().await;
        assert_eq!(error.status_code, Some(400));
        assert!(error.message.contains("Invalid OAuth"));
    }

    #[tokio::test]
    async fn unparseable_success_body_yields_empty_receipt() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/me/messages");
                then.status(200).body("ok");
            })
            .await;

        let receipt = client_for(&server, "page-token")
            .send_text(&UserId("u1".to_owned()), "hi")
            .await
            .expect("send");
        assert_eq!(receipt.message_id, None);
    }

    #[tokio::test]
    async fn recording_sender_keeps_order() {
        let sender = RecordingSender::new();
        sender.send_text(&UserId("u1".to_owned()), "one").await.expect("send");
        sender.send_text(&UserId("u2".to_owned()), "two").await.expect("send");

        let sent = sender.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], (UserId("u2".to_owned()), "two".to_owned()));
    }
}
