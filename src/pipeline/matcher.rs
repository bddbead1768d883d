//! Tiered resolution against the question bank.
//!
//! Tiers run in order and the first hit wins: greeting tokens, exact
//! (case-insensitive) key equality, then approximate similarity scoring.
//! No tier errors outward; a scorer failure or timeout just means the
//! message goes on to the fallback responder.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::bank::QuestionBank;
use crate::error::ScoreError;
use crate::lang::Lang;
use crate::pipeline::scorer::SimilarityScorer;
use crate::pipeline::types::MatchResult;

/// Greeting tokens answered with the fixed introduction.
const GREETING_TOKENS: [&str; 5] = ["hi", "hello", "hey", "hii", "helo"];

/// Fixed introduction for the greeting tier.
pub const GREETING_REPLY: &str =
    "Hello! I am CareLine, your health assistant. How can I help you with your health questions today?";

/// Which text feeds the approximate tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreText {
    /// Score the English pivot text (default).
    Pivot,
    /// Score the sender's original, untranslated text.
    Original,
}

impl ScoreText {
    /// Parse a config value. Unrecognized names mean pivot.
    pub fn from_name(name: &str) -> ScoreText {
        match name.trim().to_ascii_lowercase().as_str() {
            "original" => ScoreText::Original,
            _ => ScoreText::Pivot,
        }
    }
}

/// Tuning knobs for the matcher.
#[derive(Debug, Clone)]
pub struct MatchPolicy {
    /// Minimum approximate score (0–100) to accept a candidate.
    pub threshold: f32,
    /// Which text the approximate tier scores.
    pub score_on: ScoreText,
    /// Upper bound on one approximate-tier pass.
    pub scorer_timeout: Duration,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            threshold: 70.0,
            score_on: ScoreText::Pivot,
            scorer_timeout: Duration::from_secs(5),
        }
    }
}

/// Greeting, exact, and approximate tiers over the question bank.
pub struct Matcher {
    bank: Arc<QuestionBank>,
    scorer: Arc<dyn SimilarityScorer>,
    policy: MatchPolicy,
}

impl Matcher {
    pub fn new(
        bank: Arc<QuestionBank>,
        scorer: Arc<dyn SimilarityScorer>,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            bank,
            scorer,
            policy,
        }
    }

    /// Run the tiers in order. `pivot_text` is the normalized English text,
    /// `original_text` the sender's untranslated message; `answer_lang`
    /// picks which answer variant a matched entry yields.
    pub async fn resolve(
        &self,
        pivot_text: &str,
        original_text: &str,
        answer_lang: Lang,
    ) -> MatchResult {
        let folded = pivot_text.trim().to_lowercase();

        if GREETING_TOKENS.contains(&folded.as_str()) {
            return MatchResult::greeting(GREETING_REPLY);
        }

        if let Some(entry) = self.bank.exact(pivot_text) {
            let (lang, answer) = entry.answer(answer_lang);
            return MatchResult::exact(entry.question(), answer, lang);
        }

        let score_text = match self.policy.score_on {
            ScoreText::Pivot => pivot_text,
            ScoreText::Original => original_text,
        };
        self.approximate(score_text, answer_lang).await
    }

    /// Approximate tier: score `text` against every bank key in document
    /// order and accept the best candidate only at or above the threshold.
    async fn approximate(&self, text: &str, answer_lang: Lang) -> MatchResult {
        let folded = text.trim().to_lowercase();
        if folded.is_empty() {
            return MatchResult::none();
        }

        let best = match timeout(self.policy.scorer_timeout, self.scan_bank(&folded)).await {
            Ok(Ok(best)) => best,
            Ok(Err(err)) => {
                warn!(
                    scorer = self.scorer.name(),
                    error = %err,
                    "scorer failed, skipping approximate tier"
                );
                return MatchResult::none();
            }
            Err(_) => {
                warn!(
                    scorer = self.scorer.name(),
                    timeout = ?self.policy.scorer_timeout,
                    "approximate tier timed out"
                );
                return MatchResult::none();
            }
        };

        match best {
            Some((index, score)) if score >= self.policy.threshold => {
                let entry = &self.bank.entries()[index];
                let (lang, answer) = entry.answer(answer_lang);
                debug!(topic = entry.question(), score, "approximate match accepted");
                MatchResult::approximate(entry.question(), answer, lang, score)
            }
            Some((_, score)) => {
                debug!(
                    score,
                    threshold = self.policy.threshold,
                    "best approximate score below threshold"
                );
                MatchResult::none()
            }
            None => MatchResult::none(),
        }
    }

    /// Best `(index, score)` over the bank. Strictly-greater comparison
    /// keeps the earliest entry on ties.
    async fn scan_bank(&self, folded_text: &str) -> Result<Option<(usize, f32)>, ScoreError> {
        let mut best: Option<(usize, f32)> = None;
        for (index, entry) in self.bank.entries().iter().enumerate() {
            let candidate = entry.question().trim().to_lowercase();
            let score = self.scorer.score(folded_text, &candidate).await?;
            let better = match best {
                Some((_, top)) => score > top,
                None => true,
            };
            if better {
                best = Some((index, score));
            }
        }
        Ok(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::scorer::{SequenceRatio, TermOverlap};
    use crate::pipeline::types::MatchTier;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn make_bank() -> Arc<QuestionBank> {
        Arc::new(
            QuestionBank::from_json_str(
                r#"{
                    "fever": { "en": "Rest and hydrate.", "hi": "आराम करें और पानी पिएं।" },
                    "headache": { "en": "Drink water and rest in a dark room." },
                    "cold": { "en": "Warm fluids help." }
                }"#,
            )
            .unwrap(),
        )
    }

    fn make_matcher() -> Matcher {
        Matcher::new(make_bank(), Arc::new(SequenceRatio), MatchPolicy::default())
    }

    /// Scorer that counts calls and never matches anything.
    struct CountingScorer(AtomicUsize);

    #[async_trait]
    impl SimilarityScorer for CountingScorer {
        fn name(&self) -> &str {
            "counting"
        }

        async fn score(&self, _input: &str, _candidate: &str) -> Result<f32, ScoreError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(0.0)
        }
    }

    /// Scorer whose every call fails.
    struct FailingScorer;

    #[async_trait]
    impl SimilarityScorer for FailingScorer {
        fn name(&self) -> &str {
            "failing"
        }

        async fn score(&self, _input: &str, _candidate: &str) -> Result<f32, ScoreError> {
            Err(ScoreError::Backend {
                name: "failing".to_string(),
                reason: "service unavailable".to_string(),
            })
        }
    }

    /// Scorer that stalls longer than any test timeout.
    struct SlowScorer;

    #[async_trait]
    impl SimilarityScorer for SlowScorer {
        fn name(&self) -> &str {
            "slow"
        }

        async fn score(&self, _input: &str, _candidate: &str) -> Result<f32, ScoreError> {
            tokio::time::sleep(Duration::from_millis(250)).await;
            Ok(100.0)
        }
    }

    #[tokio::test]
    async fn greeting_matches_ignoring_case_and_whitespace() {
        let matcher = make_matcher();
        for text in ["hi", "  HELLO ", "Hey", "hii", "HELO"] {
            let result = matcher.resolve(text, text, Lang::En).await;
            assert_eq!(result.tier, MatchTier::Greeting, "input {text:?}");
            assert_eq!(result.answer.as_deref(), Some(GREETING_REPLY));
            assert!(result.topic.is_none());
        }
    }

    #[tokio::test]
    async fn greeting_never_reaches_the_scorer() {
        let scorer = Arc::new(CountingScorer(AtomicUsize::new(0)));
        let matcher = Matcher::new(make_bank(), scorer.clone(), MatchPolicy::default());

        let result = matcher.resolve("hello", "hello", Lang::En).await;

        assert_eq!(result.tier, MatchTier::Greeting);
        assert_eq!(scorer.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exact_tier_wins_for_bank_keys_regardless_of_case() {
        let scorer = Arc::new(CountingScorer(AtomicUsize::new(0)));
        let matcher = Matcher::new(make_bank(), scorer.clone(), MatchPolicy::default());

        let result = matcher.resolve("Fever", "Fever", Lang::En).await;

        assert_eq!(result.tier, MatchTier::Exact);
        assert_eq!(result.topic.as_deref(), Some("fever"));
        assert_eq!(result.answer.as_deref(), Some("Rest and hydrate."));
        assert_eq!(scorer.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn exact_tier_resolves_requested_language() {
        let matcher = make_matcher();
        let result = matcher.resolve("fever", "fever", Lang::Hi).await;

        assert_eq!(result.tier, MatchTier::Exact);
        assert_eq!(result.answer_lang, Lang::Hi);
        assert_eq!(result.answer.as_deref(), Some("आराम करें और पानी पिएं।"));
    }

    #[tokio::test]
    async fn missing_language_variant_falls_back_to_english() {
        let matcher = make_matcher();
        let result = matcher.resolve("headache", "headache", Lang::Hi).await;

        assert_eq!(result.answer_lang, Lang::En);
        assert_eq!(
            result.answer.as_deref(),
            Some("Drink water and rest in a dark room.")
        );
    }

    #[tokio::test]
    async fn approximate_tier_accepts_embedded_key() {
        let matcher = make_matcher();
        let text = "i have a feverish feeling";
        let result = matcher.resolve(text, text, Lang::En).await;

        assert_eq!(result.tier, MatchTier::Approximate);
        assert_eq!(result.topic.as_deref(), Some("fever"));
        assert_eq!(result.answer.as_deref(), Some("Rest and hydrate."));
        assert!(result.score.unwrap() >= 70.0);
    }

    #[tokio::test]
    async fn below_threshold_yields_no_match() {
        let matcher = make_matcher();
        let text = "what is the capital of france";
        let result = matcher.resolve(text, text, Lang::En).await;

        assert_eq!(result.tier, MatchTier::None);
        assert!(result.answer.is_none());
    }

    #[tokio::test]
    async fn tie_breaks_to_earliest_bank_entry() {
        let bank = Arc::new(
            QuestionBank::from_json_str(
                r#"{
                    "sore throat": { "en": "Gargle warm salt water." },
                    "throat pain": { "en": "See a doctor if it persists." }
                }"#,
            )
            .unwrap(),
        );
        // "throat" scores identically against both keys with the term
        // scorer; the first entry must win.
        let matcher = Matcher::new(bank, Arc::new(TermOverlap), MatchPolicy::default());
        let result = matcher.resolve("throat", "throat", Lang::En).await;

        assert_eq!(result.tier, MatchTier::Approximate);
        assert_eq!(result.topic.as_deref(), Some("sore throat"));
    }

    #[tokio::test]
    async fn scorer_failure_degrades_to_no_match() {
        let matcher = Matcher::new(make_bank(), Arc::new(FailingScorer), MatchPolicy::default());
        let result = matcher.resolve("feeling unwell", "feeling unwell", Lang::En).await;

        assert_eq!(result.tier, MatchTier::None);
    }

    #[tokio::test]
    async fn scorer_timeout_degrades_to_no_match() {
        let policy = MatchPolicy {
            scorer_timeout: Duration::from_millis(10),
            ..MatchPolicy::default()
        };
        let matcher = Matcher::new(make_bank(), Arc::new(SlowScorer), policy);
        let result = matcher.resolve("feeling unwell", "feeling unwell", Lang::En).await;

        assert_eq!(result.tier, MatchTier::None);
    }

    #[tokio::test]
    async fn empty_input_yields_no_match() {
        let matcher = make_matcher();
        let result = matcher.resolve("", "", Lang::En).await;
        assert_eq!(result.tier, MatchTier::None);
    }

    #[tokio::test]
    async fn original_text_policy_scores_untranslated_input() {
        let policy = MatchPolicy {
            score_on: ScoreText::Original,
            ..MatchPolicy::default()
        };
        let matcher = Matcher::new(make_bank(), Arc::new(SequenceRatio), policy);

        // Pivot text is far from every key; the original contains one.
        let result = matcher
            .resolve("completely unrelated words", "my fever is back", Lang::En)
            .await;

        assert_eq!(result.tier, MatchTier::Approximate);
        assert_eq!(result.topic.as_deref(), Some("fever"));
    }
}
