//! Constrained generative fallback.
//!
//! When no matcher tier resolves a message, the pipeline asks a generative
//! backend under a fixed policy: health topics only, a verbatim refusal for
//! anything else, short answers, and pivot-language output (the envelope
//! translates the reply afterwards). Running without a credential is a
//! normal, handled state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::error::FallbackError;
use crate::lang::Lang;

/// Fixed reply when no generative credential is configured.
pub const UNCONFIGURED_REPLY: &str = "Sorry, I cannot answer that right now (AI engine not configured). Please ask me about common health topics like fever, headache, or cold.";

/// Fixed reply when the generative backend fails at runtime.
pub const UNAVAILABLE_REPLY: &str =
    "Sorry, I am having trouble answering right now. Please try again in a moment.";

/// System policy sent with every fallback request.
const SYSTEM_POLICY: &str = "You are CareLine, a careful health assistant.\n\
Answer only questions about health, symptoms, nutrition, medication, and wellbeing.\n\
If the question is not health-related, reply exactly: \"I can only help with health-related questions.\"\n\
Keep answers to three short sentences at most.\n\
Write your answer in English; replies are translated to the user's language before delivery.";

const MAX_TOKENS: u32 = 256;
const TEMPERATURE: f32 = 0.2;
/// Inbound text beyond this many chars is truncated in the prompt.
const MAX_INPUT_CHARS: usize = 1000;

/// A chat-completion service that can answer one constrained prompt.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn complete(&self, system: &str, user: &str) -> Result<String, FallbackError>;
}

// ── Groq client ─────────────────────────────────────────────────────

/// Client for an OpenAI-compatible chat-completions API (Groq hosts one).
pub struct GroqClient {
    api_key: SecretString,
    model: String,
    base_url: String,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

impl GroqClient {
    pub fn new(
        api_key: SecretString,
        model: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            api_key,
            model: model.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl GenerativeBackend for GroqClient {
    fn name(&self) -> &str {
        "groq"
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, FallbackError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FallbackError::Timeout {
                        backend: "groq".to_string(),
                        timeout: self.timeout,
                    }
                } else {
                    FallbackError::RequestFailed {
                        backend: "groq".to_string(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        match status.as_u16() {
            401 | 403 => {
                return Err(FallbackError::AuthFailed {
                    backend: "groq".to_string(),
                });
            }
            429 => {
                return Err(FallbackError::RateLimited {
                    backend: "groq".to_string(),
                });
            }
            _ if !status.is_success() => {
                let reason = resp.text().await.unwrap_or_default();
                return Err(FallbackError::RequestFailed {
                    backend: "groq".to_string(),
                    reason: format!("HTTP {status}: {reason}"),
                });
            }
            _ => {}
        }

        let parsed: ChatResponse =
            resp.json()
                .await
                .map_err(|e| FallbackError::InvalidResponse {
                    backend: "groq".to_string(),
                    reason: e.to_string(),
                })?;
        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| FallbackError::InvalidResponse {
                backend: "groq".to_string(),
                reason: "no choices in response".to_string(),
            })?;
        Ok(choice.message.content)
    }
}

// ── Responder ───────────────────────────────────────────────────────

/// Last tier of the pipeline: a generative answer under the fixed policy.
pub struct FallbackResponder {
    backend: Option<Arc<dyn GenerativeBackend>>,
}

impl FallbackResponder {
    pub fn new(backend: Arc<dyn GenerativeBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    /// Responder without a backend; every resolve explains that the bot
    /// cannot answer.
    pub fn unconfigured() -> Self {
        Self { backend: None }
    }

    /// Answer `user_input` (pivot text), optionally seeded with the user's
    /// last topic. Never fails: a missing credential or a backend error
    /// produces a canned reply and the raw error is only logged.
    pub async fn resolve(
        &self,
        user_input: &str,
        context_hint: Option<&str>,
        target_lang: Lang,
    ) -> String {
        let Some(backend) = &self.backend else {
            info!("fallback requested but no generative backend is configured");
            return UNCONFIGURED_REPLY.to_string();
        };

        let user = build_user_prompt(user_input, context_hint);
        match backend.complete(SYSTEM_POLICY, &user).await {
            Ok(text) => {
                let text = text.trim().to_string();
                info!(
                    backend = backend.name(),
                    target_lang = %target_lang,
                    chars = text.len(),
                    "fallback answer generated"
                );
                text
            }
            Err(err) => {
                error!(backend = backend.name(), error = %err, "generative backend failed");
                UNAVAILABLE_REPLY.to_string()
            }
        }
    }
}

/// Assemble the user prompt: optional topic hint line, then the question.
fn build_user_prompt(user_input: &str, context_hint: Option<&str>) -> String {
    let input: String = user_input.chars().take(MAX_INPUT_CHARS).collect();
    let mut prompt = String::with_capacity(input.len() + 64);
    if let Some(topic) = context_hint {
        prompt.push_str("Previous topic: ");
        prompt.push_str(topic);
        prompt.push_str("\n\n");
    }
    prompt.push_str(&input);
    prompt
}
