//! The orchestrator: one inbound message in, one reply out.
//!
//! Stage order is fixed: detect language, normalize to the pivot, run the
//! matcher tiers, update topic memory, reverse-translate the final reply.
//! The context hint is read before the entry is overwritten, greetings
//! never touch memory, and the reply is translated at most once.

use std::sync::Arc;

use tracing::{debug, info};

use crate::context::ContextStore;
use crate::fallback::FallbackResponder;
use crate::lang::Lang;
use crate::pipeline::matcher::Matcher;
use crate::pipeline::types::{InboundMessage, MatchResult, MatchTier, Resolution};
use crate::translate::LanguageEnvelope;

/// Wires the envelope, matcher, context store, and fallback responder into
/// the resolution flow.
pub struct Resolver {
    envelope: LanguageEnvelope,
    matcher: Matcher,
    context: Arc<dyn ContextStore>,
    fallback: FallbackResponder,
}

impl Resolver {
    pub fn new(
        envelope: LanguageEnvelope,
        matcher: Matcher,
        context: Arc<dyn ContextStore>,
        fallback: FallbackResponder,
    ) -> Self {
        Self {
            envelope,
            matcher,
            context,
            fallback,
        }
    }

    /// Resolve one message to a reply. Infallible: every backend failure
    /// degrades to a polite reply, in the sender's language where possible.
    pub async fn handle(&self, msg: &InboundMessage) -> Resolution {
        let lang = self.envelope.detect(&msg.body).await;
        let pivot = self.envelope.normalize(&msg.body, lang).await;
        debug!(id = %msg.message_id, lang = %lang, "message normalized");

        let MatchResult {
            tier,
            topic,
            answer,
            answer_lang,
            ..
        } = self.matcher.resolve(&pivot, &msg.body, lang).await;

        let (reply, reply_lang, context_updated) = match tier {
            // Greetings never touch topic memory.
            MatchTier::Greeting => (answer.unwrap_or_default(), answer_lang, false),
            MatchTier::Exact | MatchTier::Approximate => {
                let topic = topic.unwrap_or_else(|| pivot.clone());
                self.context.put(&msg.sender_id, &topic).await;
                (answer.unwrap_or_default(), answer_lang, true)
            }
            MatchTier::None => {
                // Read the hint before this interaction overwrites it.
                let hint = self
                    .context
                    .get(&msg.sender_id)
                    .await
                    .map(|entry| entry.last_topic);
                let answer = self.fallback.resolve(&pivot, hint.as_deref(), lang).await;
                self.context.put(&msg.sender_id, &pivot).await;
                (answer, Lang::En, true)
            }
        };

        let reply = if reply_lang == lang {
            reply
        } else {
            self.envelope.denormalize(&reply, lang).await
        };

        info!(
            id = %msg.message_id,
            sender = %msg.sender_id,
            tier = tier.label(),
            lang = %lang,
            context_updated,
            "message resolved"
        );

        Resolution {
            reply,
            tier,
            language: lang,
            context_updated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::QuestionBank;
    use crate::context::InMemoryContextStore;
    use crate::error::{FallbackError, TranslateError};
    use crate::fallback::{GenerativeBackend, UNCONFIGURED_REPLY};
    use crate::pipeline::matcher::{GREETING_REPLY, MatchPolicy};
    use crate::pipeline::scorer::SequenceRatio;
    use crate::translate::TranslationBackend;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_bank() -> Arc<QuestionBank> {
        Arc::new(
            QuestionBank::from_json_str(
                r#"{
                    "fever": { "en": "Rest and hydrate.", "hi": "आराम करें और पानी पिएं।" },
                    "headache": { "en": "Drink water and rest in a dark room." }
                }"#,
            )
            .unwrap(),
        )
    }

    fn make_matcher() -> Matcher {
        Matcher::new(make_bank(), Arc::new(SequenceRatio), MatchPolicy::default())
    }

    fn make_message(body: &str) -> InboundMessage {
        InboundMessage::new(body, "whatsapp:+15551234567", None)
    }

    /// English-only resolver with an inspectable store and no generative
    /// backend.
    fn make_resolver(store: Arc<InMemoryContextStore>) -> Resolver {
        Resolver::new(
            LanguageEnvelope::disabled(),
            make_matcher(),
            store,
            FallbackResponder::unconfigured(),
        )
    }

    /// Translator with a tiny fixed dictionary and a call counter.
    struct StubTranslator {
        detect_as: Lang,
        calls: AtomicUsize,
    }

    impl StubTranslator {
        fn new(detect_as: Lang) -> Arc<Self> {
            Arc::new(Self {
                detect_as,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl TranslationBackend for StubTranslator {
        fn name(&self) -> &str {
            "stub"
        }

        async fn detect(&self, _text: &str) -> Result<Lang, TranslateError> {
            Ok(self.detect_as)
        }

        async fn translate(
            &self,
            text: &str,
            _source: Lang,
            target: Lang,
        ) -> Result<String, TranslateError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let out = match (text, target) {
                ("hola", Lang::En) => "hello".to_string(),
                ("tengo fiebre", Lang::En) => "fever".to_string(),
                ("बुखार", Lang::En) => "fever".to_string(),
                (_, Lang::Es) => format!("{text} [es]"),
                _ => text.to_string(),
            };
            Ok(out)
        }
    }

    /// Translator whose every call fails.
    struct DownTranslator;

    #[async_trait]
    impl TranslationBackend for DownTranslator {
        fn name(&self) -> &str {
            "down"
        }

        async fn detect(&self, _text: &str) -> Result<Lang, TranslateError> {
            Err(TranslateError::RequestFailed {
                reason: "unreachable".to_string(),
            })
        }

        async fn translate(
            &self,
            _text: &str,
            _source: Lang,
            _target: Lang,
        ) -> Result<String, TranslateError> {
            Err(TranslateError::RequestFailed {
                reason: "unreachable".to_string(),
            })
        }
    }

    /// Generative backend that records the user prompt it receives.
    struct RecordingBackend {
        seen_user: Mutex<Option<String>>,
    }

    impl RecordingBackend {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen_user: Mutex::new(None),
            })
        }
    }

    #[async_trait]
    impl GenerativeBackend for RecordingBackend {
        fn name(&self) -> &str {
            "recording"
        }

        async fn complete(&self, _system: &str, user: &str) -> Result<String, FallbackError> {
            *self.seen_user.lock().unwrap() = Some(user.to_string());
            Ok("Eat light, bland food and stay hydrated.".to_string())
        }
    }

    #[tokio::test]
    async fn exact_match_answers_from_the_bank() {
        let store = InMemoryContextStore::new(900);
        let resolver = make_resolver(store.clone());

        let resolution = resolver.handle(&make_message("Fever")).await;

        assert_eq!(resolution.tier, MatchTier::Exact);
        assert_eq!(resolution.reply, "Rest and hydrate.");
        assert!(resolution.context_updated);
        let entry = store.get("whatsapp:+15551234567").await.unwrap();
        assert_eq!(entry.last_topic, "fever");
    }

    #[tokio::test]
    async fn approximate_match_answers_from_the_bank() {
        let store = InMemoryContextStore::new(900);
        let resolver = make_resolver(store.clone());

        let resolution = resolver
            .handle(&make_message("i have a feverish feeling"))
            .await;

        assert_eq!(resolution.tier, MatchTier::Approximate);
        assert_eq!(resolution.reply, "Rest and hydrate.");
        assert_eq!(
            store.get("whatsapp:+15551234567").await.unwrap().last_topic,
            "fever"
        );
    }

    #[tokio::test]
    async fn unmatched_without_credential_reports_unconfigured_engine() {
        let store = InMemoryContextStore::new(900);
        let resolver = make_resolver(store.clone());

        let resolution = resolver
            .handle(&make_message("what is the capital of france"))
            .await;

        assert_eq!(resolution.tier, MatchTier::None);
        assert_eq!(resolution.reply, UNCONFIGURED_REPLY);
        // The unanswered question still becomes the stored topic.
        assert_eq!(
            store.get("whatsapp:+15551234567").await.unwrap().last_topic,
            "what is the capital of france"
        );
    }

    #[tokio::test]
    async fn fallback_receives_previous_topic_within_ttl() {
        let store = InMemoryContextStore::new(900);
        let backend = RecordingBackend::new();
        let resolver = Resolver::new(
            LanguageEnvelope::disabled(),
            make_matcher(),
            store,
            FallbackResponder::new(backend.clone()),
        );

        resolver.handle(&make_message("fever")).await;
        let resolution = resolver.handle(&make_message("what should I eat")).await;

        assert_eq!(resolution.tier, MatchTier::None);
        assert_eq!(resolution.reply, "Eat light, bland food and stay hydrated.");
        let prompt = backend.seen_user.lock().unwrap().clone().unwrap();
        assert!(prompt.contains("Previous topic: fever"), "prompt: {prompt}");
    }

    #[tokio::test]
    async fn greeting_skips_topic_memory() {
        let store = InMemoryContextStore::new(900);
        let resolver = make_resolver(store.clone());

        let resolution = resolver.handle(&make_message("  HELLO ")).await;

        assert_eq!(resolution.tier, MatchTier::Greeting);
        assert_eq!(resolution.reply, GREETING_REPLY);
        assert!(!resolution.context_updated);
        assert!(store.get("whatsapp:+15551234567").await.is_none());
    }

    #[tokio::test]
    async fn greeting_reply_is_translated_back() {
        let resolver = Resolver::new(
            LanguageEnvelope::new(StubTranslator::new(Lang::Es)),
            make_matcher(),
            InMemoryContextStore::new(900),
            FallbackResponder::unconfigured(),
        );

        let resolution = resolver.handle(&make_message("hola")).await;

        assert_eq!(resolution.tier, MatchTier::Greeting);
        assert_eq!(resolution.language, Lang::Es);
        assert_eq!(resolution.reply, format!("{GREETING_REPLY} [es]"));
    }

    #[tokio::test]
    async fn native_answer_skips_reverse_translation() {
        let translator = StubTranslator::new(Lang::Hi);
        let resolver = Resolver::new(
            LanguageEnvelope::new(translator.clone()),
            make_matcher(),
            InMemoryContextStore::new(900),
            FallbackResponder::unconfigured(),
        );

        let resolution = resolver.handle(&make_message("बुखार")).await;

        assert_eq!(resolution.tier, MatchTier::Exact);
        assert_eq!(resolution.reply, "आराम करें और पानी पिएं।");
        // One translate call for normalization, none for the reply.
        assert_eq!(translator.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn translation_outage_still_resolves_in_english() {
        let resolver = Resolver::new(
            LanguageEnvelope::new(Arc::new(DownTranslator)),
            make_matcher(),
            InMemoryContextStore::new(900),
            FallbackResponder::unconfigured(),
        );

        let resolution = resolver.handle(&make_message("Fever")).await;

        assert_eq!(resolution.tier, MatchTier::Exact);
        assert_eq!(resolution.language, Lang::En);
        assert_eq!(resolution.reply, "Rest and hydrate.");
    }

    #[tokio::test]
    async fn spanish_question_is_answered_in_spanish() {
        let resolver = Resolver::new(
            LanguageEnvelope::new(StubTranslator::new(Lang::Es)),
            make_matcher(),
            InMemoryContextStore::new(900),
            FallbackResponder::unconfigured(),
        );

        let resolution = resolver.handle(&make_message("tengo fiebre")).await;

        assert_eq!(resolution.tier, MatchTier::Exact);
        assert_eq!(resolution.reply, "Rest and hydrate. [es]");
    }

    #[tokio::test]
    async fn expired_topic_is_not_hinted() {
        let store = InMemoryContextStore::new(0);
        let backend = RecordingBackend::new();
        let resolver = Resolver::new(
            LanguageEnvelope::disabled(),
            make_matcher(),
            store,
            FallbackResponder::new(backend.clone()),
        );

        resolver.handle(&make_message("fever")).await;
        resolver.handle(&make_message("what should I eat")).await;

        let prompt = backend.seen_user.lock().unwrap().clone().unwrap();
        assert!(!prompt.contains("Previous topic"), "prompt: {prompt}");
    }
}
