//! Agent Runtime - intent classification and orchestration
//!
//! This crate is the layer between the Messenger transport and the course
//! pipeline:
//! - Classifies free text into a structured `ClassifiedIntent`
//! - Hands the intent to the core `Dispatcher`
//! - Sends the rendered reply back through a `MessageSender`
//!
//! # Key Types
//!
//! - `MessageRuntime` - per-event orchestrator (see `runtime` module)
//! - `IntentClassifier` - pluggable trait with api.ai and keyword providers
//!
//! The classifier only translates text. Course lookups and list changes are
//! decided by the core pipeline.

pub mod classifier;
pub mod runtime;

pub use classifier::{
    classifier_from_config, ApiAiClassifier, ClassifierError, IntentClassifier, KeywordClassifier,
};
pub use runtime::{EventOutcome, MessageRuntime};
