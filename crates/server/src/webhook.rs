use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use coursefinder_agent::runtime::MessageRuntime;
use coursefinder_core::errors::InterfaceError;
use coursefinder_messenger::events::parse_envelope;
use coursefinder_messenger::signature::{
    SignatureCheck, SignatureVerifier, SHA1_HEADER, SHA256_HEADER,
};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct WebhookState {
    verifier: Arc<SignatureVerifier>,
    validation_token: SecretString,
    runtime: Arc<MessageRuntime>,
}

impl WebhookState {
    pub fn new(
        verifier: SignatureVerifier,
        validation_token: SecretString,
        runtime: Arc<MessageRuntime>,
    ) -> Self {
        Self { verifier: Arc::new(verifier), validation_token, runtime }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// HTTP rendering of an [`InterfaceError`]. The body never echoes request data.
#[derive(Debug)]
pub struct WebhookRejection(pub InterfaceError);

impl WebhookRejection {
    fn forbidden(message: impl Into<String>) -> Self {
        Self(InterfaceError::Forbidden {
            message: message.into(),
            correlation_id: Uuid::new_v4().to_string(),
        })
    }

    pub(crate) fn bad_request(message: impl Into<String>) -> Self {
        Self(InterfaceError::BadRequest {
            message: message.into(),
            correlation_id: Uuid::new_v4().to_string(),
        })
    }
}

impl IntoResponse for WebhookRejection {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            InterfaceError::Forbidden { .. } => StatusCode::FORBIDDEN,
            InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = json!({
            "error": self.0.user_message(),
            "correlation_id": self.0.correlation_id(),
        });
        (status, Json(body)).into_response()
    }
}

pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/webhook", get(verify_subscription).post(receive_events))
        .with_state(state)
}

/// Subscription handshake: echo the challenge when the verify token matches.
pub async fn verify_subscription(
    State(state): State<WebhookState>,
    Query(query): Query<VerifyQuery>,
) -> Result<String, WebhookRejection> {
    let token_matches = query
        .verify_token
        .as_deref()
        .is_some_and(|token| token == state.validation_token.expose_secret());

    if query.mode.as_deref() == Some("subscribe") && token_matches {
        info!(event_name = "webhook.verify.accepted", "validating webhook");
        return Ok(query.challenge.unwrap_or_default());
    }

    let rejection = WebhookRejection::forbidden("webhook verification failed");
    error!(
        event_name = "webhook.verify.rejected",
        correlation_id = rejection.0.correlation_id(),
        mode = query.mode.as_deref().unwrap_or(""),
        "failed validation; make sure the validation tokens match"
    );
    Err(rejection)
}

/// Accepts a webhook delivery. Events run on their own tasks so the platform
/// gets its 200 without waiting on classification or the Send API.
pub async fn receive_events(
    State(state): State<WebhookState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, WebhookRejection> {
    let sha256 = headers.get(SHA256_HEADER).and_then(|value| value.to_str().ok());
    let sha1 = headers.get(SHA1_HEADER).and_then(|value| value.to_str().ok());

    match state.verifier.verify(sha256, sha1, &body) {
        Ok(SignatureCheck::Verified(algorithm)) => {
            info!(
                event_name = "webhook.signature.verified",
                algorithm = algorithm.prefix(),
                "request signature verified"
            );
        }
        Ok(SignatureCheck::Missing) => {
            error!(
                event_name = "webhook.signature.missing",
                "couldn't validate the signature; accepting unsigned request"
            );
        }
        Err(signature_error) => {
            let rejection = WebhookRejection::forbidden(signature_error.to_string());
            error!(
                event_name = "webhook.signature.rejected",
                correlation_id = rejection.0.correlation_id(),
                error = %signature_error,
                "couldn't validate the request signature"
            );
            return Err(rejection);
        }
    }

    let envelope = match parse_envelope(&body) {
        Ok(envelope) => envelope,
        Err(parse_error) => {
            let rejection = WebhookRejection::bad_request(parse_error.to_string());
            warn!(
                event_name = "webhook.envelope.invalid",
                correlation_id = rejection.0.correlation_id(),
                error = %parse_error,
                "webhook body could not be parsed"
            );
            return Err(rejection);
        }
    };

    if !envelope.is_page() {
        info!(
            event_name = "webhook.envelope.ignored",
            object = %envelope.object,
            "ignoring non-page webhook payload"
        );
        return Ok(StatusCode::OK);
    }

    for event in envelope.events {
        let runtime = state.runtime.clone();
        tokio::spawn(async move {
            runtime.handle_event(&event).await;
        });
    }

    Ok(StatusCode::OK)
}
