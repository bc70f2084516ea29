//! Messenger Platform integration
//!
//! This crate is the chat transport for the course finder:
//! - **Events** (`events`) - webhook envelope parsing into typed `MessagingEvent`s
//! - **Signatures** (`signature`) - `X-Hub-Signature(-256)` HMAC verification
//! - **Send API** (`send`) - outbound text replies via the Graph API
//!
//! # Getting Started
//!
//! 1. Create a Facebook app with the Messenger product and a Page
//! 2. Point the webhook at `{server_url}/webhook` with your verify token
//! 3. Set env vars: `MESSENGER_APP_SECRET`, `MESSENGER_VALIDATION_TOKEN`,
//!    `MESSENGER_PAGE_ACCESS_TOKEN` (or their `COURSEFINDER_MESSENGER_*` forms)
//!
//! # Architecture
//!
//! ```text
//! POST /webhook → SignatureVerifier → parse_envelope → MessagingEvent
//!                                                           ↓
//!                              MessageSender ← reply ← Agent Runtime
//! ```

pub mod events;
pub mod send;
pub mod signature;

pub use events::{parse_envelope, EnvelopeError, InboundMessage, MessagingEvent, WebhookEnvelope};
pub use send::{GraphSendClient, MessageSender, NoopSender, RecordingSender, SendError, SendReceipt};
pub use signature::{SignatureAlgorithm, SignatureCheck, SignatureError, SignatureVerifier};
