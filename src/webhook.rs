//! Inbound webhook for the messaging provider.
//!
//! The provider POSTs `application/x-www-form-urlencoded` fields (`Body`,
//! `From`, `MessageSid`) and expects a TwiML `<Response><Message>` document
//! back. Every request gets 200 with a message body; unreadable payloads
//! get a resend prompt rather than an error status, since providers retry
//! on non-2xx and the sender would see nothing.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Form, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum::extract::rejection::FormRejection;
use serde::Deserialize;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::pipeline::resolver::Resolver;
use crate::pipeline::types::InboundMessage;

/// Sent when the payload has no usable text.
pub const RESEND_PROMPT: &str =
    "Sorry, I could not read that message. Please send your health question as plain text.";

/// Sender id used when the provider omits `From`.
const DEFAULT_SENDER: &str = "default_user";

/// Hard ceiling on handler time, TwiML webhooks time out provider-side
/// at 15 seconds.
const HANDLER_TIMEOUT: Duration = Duration::from_secs(12);

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct AppState {
    pub resolver: Arc<Resolver>,
}

/// Build the Axum router for `/webhook` and `/healthz`.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/healthz", get(healthz_handler))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            HANDLER_TIMEOUT,
        ))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub struct WebhookForm {
    #[serde(rename = "Body")]
    pub body: Option<String>,
    #[serde(rename = "From")]
    pub from: Option<String>,
    #[serde(rename = "MessageSid")]
    pub message_sid: Option<String>,
}

async fn webhook_handler(
    State(state): State<AppState>,
    form: Result<Form<WebhookForm>, FormRejection>,
) -> Response {
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected webhook payload");
            return twiml_reply(RESEND_PROMPT);
        }
    };

    let body = form.body.as_deref().map(str::trim).unwrap_or_default();
    if body.is_empty() {
        debug!("Webhook carried no text body");
        return twiml_reply(RESEND_PROMPT);
    }

    let sender = form
        .from
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_SENDER);

    let message = InboundMessage::new(body, sender, form.message_sid.clone());
    let resolution = state.resolver.handle(&message).await;
    twiml_reply(&resolution.reply)
}

async fn healthz_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": "careline" }))
}

/// Wrap a reply in a TwiML message document.
fn twiml_reply(text: &str) -> Response {
    let xml = format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Response><Message>{}</Message></Response>",
        escape_xml(text)
    );
    ([(header::CONTENT_TYPE, "application/xml")], xml).into_response()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}
