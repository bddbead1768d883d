//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::pipeline::matcher::ScoreText;
use crate::pipeline::scorer::ScorerKind;

/// Service configuration.
///
/// Every field has a usable default; a bad or missing variable falls back
/// rather than aborting startup. Only the question bank file is required
/// to exist, and that is enforced at load time, not here.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the webhook server binds to.
    pub bind_addr: String,
    /// Path to the question bank JSON file.
    pub bank_path: PathBuf,
    /// Groq API key. Absent means the generative fallback is disabled.
    pub groq_api_key: Option<SecretString>,
    /// Groq model id for fallback completions.
    pub groq_model: String,
    /// Groq API base URL.
    pub groq_api_url: String,
    /// Translation API base URL. Absent means English-only operation.
    pub translate_api_url: Option<String>,
    /// Optional translation API key.
    pub translate_api_key: Option<String>,
    /// Minimum approximate-match score (0–100).
    pub match_threshold: f32,
    /// Similarity scorer for the approximate tier.
    pub scorer: ScorerKind,
    /// Which text the approximate tier scores.
    pub score_on: ScoreText,
    /// Seconds a remembered topic stays valid.
    pub context_ttl_secs: u64,
    /// Timeout applied to each outbound HTTP call.
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
            bank_path: PathBuf::from("responses.json"),
            groq_api_key: None,
            groq_model: "llama-3.3-70b-versatile".to_string(),
            groq_api_url: "https://api.groq.com/openai/v1".to_string(),
            translate_api_url: None,
            translate_api_key: None,
            match_threshold: 70.0,
            scorer: ScorerKind::Ratio,
            score_on: ScoreText::Pivot,
            context_ttl_secs: 900, // 15 minutes
            request_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Read configuration from the environment, falling back to defaults
    /// for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        let bind_addr =
            std::env::var("CARELINE_BIND_ADDR").unwrap_or_else(|_| defaults.bind_addr.clone());

        let bank_path = std::env::var("CARELINE_BANK_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| defaults.bank_path.clone());

        let groq_api_key = std::env::var("GROQ_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(SecretString::from);

        let groq_model =
            std::env::var("GROQ_MODEL").unwrap_or_else(|_| defaults.groq_model.clone());

        let groq_api_url =
            std::env::var("GROQ_API_URL").unwrap_or_else(|_| defaults.groq_api_url.clone());

        let translate_api_url = std::env::var("TRANSLATE_API_URL")
            .ok()
            .filter(|u| !u.trim().is_empty());

        let translate_api_key = std::env::var("TRANSLATE_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());

        let match_threshold: f32 = std::env::var("CARELINE_MATCH_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.match_threshold)
            .clamp(0.0, 100.0);

        let scorer = std::env::var("CARELINE_MATCH_SCORER")
            .map(|s| ScorerKind::from_name(&s))
            .unwrap_or(defaults.scorer);

        let score_on = std::env::var("CARELINE_MATCH_ON")
            .map(|s| ScoreText::from_name(&s))
            .unwrap_or(defaults.score_on);

        let context_ttl_secs: u64 = std::env::var("CARELINE_CONTEXT_TTL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.context_ttl_secs);

        let request_timeout = std::env::var("CARELINE_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        Self {
            bind_addr,
            bank_path,
            groq_api_key,
            groq_model,
            groq_api_url,
            translate_api_url,
            translate_api_key,
            match_threshold,
            scorer,
            score_on,
            context_ttl_secs,
            request_timeout,
        }
    }
}
