use serde::Deserialize;
use thiserror::Error;

use coursefinder_core::domain::message::MessageEvent;
use coursefinder_core::domain::user::UserId;

/// A parsed webhook delivery. Only `object == "page"` payloads carry events.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WebhookEnvelope {
    pub object: String,
    pub events: Vec<MessagingEvent>,
}

impl WebhookEnvelope {
    pub fn is_page(&self) -> bool {
        self.object == "page"
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessagingEvent {
    Optin { sender_id: UserId, recipient_id: Option<String>, pass_through: Option<String> },
    Message { sender_id: UserId, message: InboundMessage },
    Delivery { sender_id: UserId, message_ids: Vec<String>, watermark: i64 },
    Read { sender_id: UserId, watermark: i64 },
    Postback { sender_id: UserId, payload: String },
    AccountLinking { sender_id: UserId, status: String, authorization_code: Option<String> },
    Unknown { sender_id: Option<UserId> },
}

impl MessagingEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Optin { .. } => "optin",
            Self::Message { .. } => "message",
            Self::Delivery { .. } => "delivery",
            Self::Read { .. } => "read",
            Self::Postback { .. } => "postback",
            Self::AccountLinking { .. } => "account_linking",
            Self::Unknown { .. } => "unknown",
        }
    }

    pub fn sender_id(&self) -> Option<&UserId> {
        match self {
            Self::Optin { sender_id, .. }
            | Self::Message { sender_id, .. }
            | Self::Delivery { sender_id, .. }
            | Self::Read { sender_id, .. }
            | Self::Postback { sender_id, .. }
            | Self::AccountLinking { sender_id, .. } => Some(sender_id),
            Self::Unknown { sender_id } => sender_id.as_ref(),
        }
    }

    /// The text message that should run through the course pipeline, if any.
    pub fn as_text_message(&self) -> Option<MessageEvent> {
        match self {
            Self::Message { sender_id, message: InboundMessage::Text { text, .. } } => {
                Some(MessageEvent::new(sender_id.0.clone(), text.clone()))
            }
            _ => None,
        }
    }
}

/// Checked in this order: echo, quick reply, text, attachments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    Echo { message_id: Option<String>, app_id: Option<i64>, metadata: Option<String> },
    QuickReply { message_id: Option<String>, payload: String },
    Text { message_id: Option<String>, text: String },
    Attachments { message_id: Option<String>, count: usize },
    Empty { message_id: Option<String> },
}

#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("webhook body is not valid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("messaging event {index} in entry {entry} has no sender id")]
    MissingSender { entry: usize, index: usize },
}

pub fn parse_envelope(body: &[u8]) -> Result<WebhookEnvelope, EnvelopeError> {
    let raw: RawEnvelope = serde_json::from_slice(body)?;
    let mut events = Vec::new();

    for (entry_index, entry) in raw.entry.into_iter().enumerate() {
        for (index, item) in entry.messaging.into_iter().enumerate() {
            events.push(convert(item, entry_index, index)?);
        }
    }

    Ok(WebhookEnvelope { object: raw.object, events })
}

fn convert(raw: RawMessaging, entry: usize, index: usize) -> Result<MessagingEvent, EnvelopeError> {
    let sender = raw.sender.map(|party| UserId(party.id)).filter(|id| !id.0.is_empty());
    let recipient_id = raw.recipient.map(|party| party.id);

    // Unknown payload shapes are tolerated even without a sender.
    let known = raw.optin.is_some()
        || raw.message.is_some()
        || raw.delivery.is_some()
        || raw.read.is_some()
        || raw.postback.is_some()
        || raw.account_linking.is_some();
    if !known {
        return Ok(MessagingEvent::Unknown { sender_id: sender });
    }
    let sender_id = sender.ok_or(EnvelopeError::MissingSender { entry, index })?;

    if let Some(optin) = raw.optin {
        return Ok(MessagingEvent::Optin { sender_id, recipient_id, pass_through: optin.reference });
    }
    if let Some(message) = raw.message {
        return Ok(MessagingEvent::Message { sender_id, message: classify_message(message) });
    }
    if let Some(delivery) = raw.delivery {
        return Ok(MessagingEvent::Delivery {
            sender_id,
            message_ids: delivery.mids,
            watermark: delivery.watermark,
        });
    }
    if let Some(read) = raw.read {
        return Ok(MessagingEvent::Read { sender_id, watermark: read.watermark });
    }
    if let Some(postback) = raw.postback {
        return Ok(MessagingEvent::Postback { sender_id, payload: postback.payload });
    }
    match raw.account_linking {
        Some(linking) => Ok(MessagingEvent::AccountLinking {
            sender_id,
            status: linking.status,
            authorization_code: linking.authorization_code,
        }),
        None => Ok(MessagingEvent::Unknown { sender_id: Some(sender_id) }),
    }
}

fn classify_message(message: RawMessage) -> InboundMessage {
    let message_id = message.mid;
    if message.is_echo {
        return InboundMessage::Echo { message_id, app_id: message.app_id, metadata: message.metadata };
    }
    if let Some(quick_reply) = message.quick_reply {
        return InboundMessage::QuickReply { message_id, payload: quick_reply.payload };
    }
    if let Some(text) = message.text.filter(|text| !text.is_empty()) {
        return InboundMessage::Text { message_id, text };
    }
    if !message.attachments.is_empty() {
        return InboundMessage::Attachments { message_id, count: message.attachments.len() };
    }
    InboundMessage::Empty { message_id }
}

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    object: String,
    #[serde(default)]
    entry: Vec<RawEntry>,
}

#[derive(Debug, Deserialize)]
struct RawEntry {
    #[serde(default)]
    messaging: Vec<RawMessaging>,
}

#[derive(Debug, Deserialize)]
struct RawParty {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RawMessaging {
    sender: Option<RawParty>,
    recipient: Option<RawParty>,
    optin: Option<RawOptin>,
    message: Option<RawMessage>,
    delivery: Option<RawDelivery>,
    read: Option<RawRead>,
    postback: Option<RawPostback>,
    account_linking: Option<RawAccountLinking>,
}

#[derive(Debug, Deserialize)]
struct RawOptin {
    #[serde(rename = "ref")]
    reference: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMessage {
    mid: Option<String>,
    text: Option<String>,
    #[serde(default)]
    is_echo: bool,
    app_id: Option<i64>,
    metadata: Option<String>,
    quick_reply: Option<RawQuickReply>,
    #[serde(default)]
    attachments: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawQuickReply {
    payload: String,
}

#[derive(Debug, Deserialize)]
struct RawDelivery {
    #[serde(default)]
    mids: Vec<String>,
    watermark: i64,
}

#[derive(Debug, Deserialize)]
struct RawRead {
    watermark: i64,
}

#[derive(Debug, Deserialize)]
struct RawPostback {
    payload: String,
}

#[derive(Debug, Deserialize)]
struct RawAccountLinking {
    status: String,
    authorization_code: Option<String>,
}
