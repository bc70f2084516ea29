use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

/// Normalized inbound text message handed over by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub sender_id: UserId,
    pub text: String,
}

impl MessageEvent {
    pub fn new(sender_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { sender_id: UserId(sender_id.into()), text: text.into() }
    }
}
