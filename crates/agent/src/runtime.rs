use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use coursefinder_core::domain::intent::ClassifiedIntent;
use coursefinder_core::domain::message::MessageEvent;
use coursefinder_core::domain::user::UserId;
use coursefinder_core::pipeline::Dispatcher;
use coursefinder_messenger::events::{InboundMessage, MessagingEvent};
use coursefinder_messenger::send::MessageSender;

use crate::classifier::IntentClassifier;

pub const OPTIN_REPLY: &str = "Authentication successful";
pub const QUICK_REPLY_REPLY: &str = "Quick reply tapped";
pub const ATTACHMENT_REPLY: &str = "Message with attachment received";
pub const POSTBACK_REPLY: &str = "Postback called";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventOutcome {
    /// A reply was produced. `delivered` is false when the Send API failed.
    Replied { text: String, delivered: bool },
    Logged,
    Ignored,
}

/// Drives one messaging event end to end: classify, dispatch, send.
pub struct MessageRuntime {
    classifier: Arc<dyn IntentClassifier>,
    dispatcher: Arc<Dispatcher>,
    sender: Arc<dyn MessageSender>,
}

impl MessageRuntime {
    pub fn new(
        classifier: Arc<dyn IntentClassifier>,
        dispatcher: Arc<Dispatcher>,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self { classifier, dispatcher, sender }
    }

    pub async fn handle_event(&self, event: &MessagingEvent) -> EventOutcome {
        let correlation_id = Uuid::new_v4().to_string();
        let user_id = event.sender_id().map(ToString::to_string).unwrap_or_default();
        debug!(
            event_name = "runtime.event.received",
            correlation_id = %correlation_id,
            user_id = %user_id,
            kind = event.kind(),
            "received messaging event"
        );

        match event {
            MessagingEvent::Optin { sender_id, pass_through, .. } => {
                info!(
                    event_name = "runtime.optin",
                    correlation_id = %correlation_id,
                    user_id = %sender_id,
                    pass_through = pass_through.as_deref().unwrap_or(""),
                    "authentication optin received"
                );
                self.reply(sender_id, OPTIN_REPLY, &correlation_id).await
            }
            MessagingEvent::Message { sender_id, message } => match message {
                InboundMessage::Echo { message_id, app_id, .. } => {
                    info!(
                        event_name = "runtime.echo",
                        correlation_id = %correlation_id,
                        message_id = message_id.as_deref().unwrap_or(""),
                        app_id = app_id.unwrap_or_default(),
                        "ignoring echo of our own message"
                    );
                    EventOutcome::Ignored
                }
                InboundMessage::QuickReply { payload, .. } => {
                    info!(
                        event_name = "runtime.quick_reply",
                        correlation_id = %correlation_id,
                        payload = %payload,
                        "quick reply tapped"
                    );
                    self.reply(sender_id, QUICK_REPLY_REPLY, &correlation_id).await
                }
                InboundMessage::Text { text, .. } => {
                    let message = MessageEvent::new(sender_id.0.clone(), text.clone());
                    let reply = self.reply_to_text(&message, &correlation_id).await;
                    self.reply(sender_id, &reply, &correlation_id).await
                }
                InboundMessage::Attachments { count, .. } => {
                    debug!(event_name = "runtime.attachments", correlation_id = %correlation_id, count);
                    self.reply(sender_id, ATTACHMENT_REPLY, &correlation_id).await
                }
                InboundMessage::Empty { .. } => EventOutcome::Ignored,
            },
            MessagingEvent::Delivery { message_ids, watermark, .. } => {
                for message_id in message_ids {
                    debug!(event_name = "runtime.delivery", correlation_id = %correlation_id, message_id = %message_id);
                }
                info!(
                    event_name = "runtime.delivery",
                    correlation_id = %correlation_id,
                    watermark,
                    "messages delivered before watermark"
                );
                EventOutcome::Logged
            }
            MessagingEvent::Read { watermark, .. } => {
                info!(
                    event_name = "runtime.read",
                    correlation_id = %correlation_id,
                    watermark,
                    "messages read before watermark"
                );
                EventOutcome::Logged
            }
            MessagingEvent::AccountLinking { status, authorization_code, .. } => {
                info!(
                    event_name = "runtime.account_linking",
                    correlation_id = %correlation_id,
                    user_id = %user_id,
                    status = %status,
                    has_authorization_code = authorization_code.is_some(),
                    "account linking event"
                );
                EventOutcome::Logged
            }
            MessagingEvent::Postback { sender_id, payload } => {
                info!(
                    event_name = "runtime.postback",
                    correlation_id = %correlation_id,
                    user_id = %sender_id,
                    payload = %payload,
                    "postback received"
                );
                self.reply(sender_id, POSTBACK_REPLY, &correlation_id).await
            }
            MessagingEvent::Unknown { .. } => {
                warn!(
                    event_name = "runtime.unknown_event",
                    correlation_id = %correlation_id,
                    user_id = %user_id,
                    "webhook received unknown messaging event"
                );
                EventOutcome::Ignored
            }
        }
    }

    /// Classifies `message` and runs it through the dispatcher. Never fails:
    /// classifier errors fall back to the unknown intent.
    pub async fn reply_to_text(&self, message: &MessageEvent, correlation_id: &str) -> String {
        let intent = match self.classifier.classify(&message.text, &message.sender_id.0).await {
            Ok(intent) => intent,
            Err(error) => {
                warn!(
                    event_name = "runtime.classification_failed",
                    correlation_id,
                    user_id = %message.sender_id,
                    classifier = self.classifier.name(),
                    error = %error,
                    "classification failed; treating message as unknown"
                );
                ClassifiedIntent::unknown()
            }
        };

        self.dispatcher.dispatch(&message.sender_id, &intent, correlation_id).await
    }

    async fn reply(&self, recipient: &UserId, text: &str, correlation_id: &str) -> EventOutcome {
        let delivered = match self.sender.send_text(recipient, text).await {
            Ok(_) => true,
            Err(error) => {
                warn!(
                    event_name = "runtime.send_failed",
                    correlation_id,
                    user_id = %recipient,
                    status_code = error.status_code.unwrap_or_default(),
                    error = %error,
                    "reply could not be delivered"
                );
                false
            }
        };
        EventOutcome::Replied { text: text.to_owned(), delivered }
    }
}
