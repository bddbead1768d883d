//! Shared types for the resolution pipeline.

use uuid::Uuid;

use crate::lang::Lang;

// ── Inbound message ─────────────────────────────────────────────────

/// One message as handed to the pipeline by the transport.
#[derive(Debug, Clone)]
pub struct InboundMessage {
    /// Transport-native ID, or a generated UUID for log correlation.
    pub message_id: String,
    /// Stable sender identifier (e.g. "whatsapp:+15551234567").
    pub sender_id: String,
    /// Raw message text, in whatever language the sender wrote.
    pub body: String,
}

impl InboundMessage {
    pub fn new(
        body: impl Into<String>,
        sender_id: impl Into<String>,
        message_id: Option<String>,
    ) -> Self {
        Self {
            message_id: message_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            sender_id: sender_id.into(),
            body: body.into(),
        }
    }
}

// ── Match outcome ───────────────────────────────────────────────────

/// Which tier resolved a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Fixed-token greeting; replies with the introduction.
    Greeting,
    /// Case-insensitive equality with a bank key.
    Exact,
    /// Similarity score at or above the acceptance threshold.
    Approximate,
    /// Nothing matched; the fallback responder takes over.
    None,
}

impl MatchTier {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Greeting => "greeting",
            Self::Exact => "exact",
            Self::Approximate => "approximate",
            Self::None => "none",
        }
    }
}

/// Outcome of one trip through the matcher tiers. Lives only for the
/// duration of the message.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub tier: MatchTier,
    /// Canonical bank key that matched, if any.
    pub topic: Option<String>,
    /// Reply text, already resolved to the best language variant.
    pub answer: Option<String>,
    /// Language `answer` is written in.
    pub answer_lang: Lang,
    /// Winning similarity score, approximate tier only.
    pub score: Option<f32>,
}

impl MatchResult {
    pub fn greeting(reply: impl Into<String>) -> Self {
        Self {
            tier: MatchTier::Greeting,
            topic: None,
            answer: Some(reply.into()),
            answer_lang: Lang::En,
            score: None,
        }
    }

    pub fn exact(topic: impl Into<String>, answer: impl Into<String>, answer_lang: Lang) -> Self {
        Self {
            tier: MatchTier::Exact,
            topic: Some(topic.into()),
            answer: Some(answer.into()),
            answer_lang,
            score: None,
        }
    }

    pub fn approximate(
        topic: impl Into<String>,
        answer: impl Into<String>,
        answer_lang: Lang,
        score: f32,
    ) -> Self {
        Self {
            tier: MatchTier::Approximate,
            topic: Some(topic.into()),
            answer: Some(answer.into()),
            answer_lang,
            score: Some(score),
        }
    }

    pub fn none() -> Self {
        Self {
            tier: MatchTier::None,
            topic: None,
            answer: None,
            answer_lang: Lang::En,
            score: None,
        }
    }
}

// ── Resolution ──────────────────────────────────────────────────────

/// Terminal record of one message: what the bot replied and how it got
/// there.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Final reply text, in the sender's language where possible.
    pub reply: String,
    /// Tier that produced the reply (`None` means the fallback responder).
    pub tier: MatchTier,
    /// Detected language of the inbound message.
    pub language: Lang,
    /// Whether this interaction overwrote the sender's topic memory.
    pub context_updated: bool,
}
