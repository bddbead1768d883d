//! Language detection and translation.
//!
//! Matching always runs against English pivot text. The envelope translates
//! inbound messages to the pivot exactly once before matching and the final
//! reply back to the sender's language at most once. Both operations are
//! best-effort: a failed backend call degrades to the untranslated text and
//! never stops a reply.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::TranslateError;
use crate::lang::Lang;

/// External service that detects languages and translates text.
#[async_trait]
pub trait TranslationBackend: Send + Sync {
    fn name(&self) -> &str;

    async fn detect(&self, text: &str) -> Result<Lang, TranslateError>;

    async fn translate(
        &self,
        text: &str,
        source: Lang,
        target: Lang,
    ) -> Result<String, TranslateError>;
}

// ── LibreTranslate client ────────────────────────────────────────────

/// Client for a LibreTranslate-compatible HTTP service.
pub struct LibreTranslate {
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct DetectRequest<'a> {
    q: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct Detection {
    language: String,
    #[serde(default)]
    confidence: f32,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    source: &'a str,
    target: &'a str,
    format: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    api_key: Option<&'a str>,
}

#[derive(Deserialize)]
struct TranslateResponse {
    #[serde(rename = "translatedText")]
    translated_text: String,
}

impl LibreTranslate {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post_json<T>(&self, path: &str, body: &impl Serialize) -> Result<T, TranslateError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let resp = self
            .client
            .post(self.endpoint(path))
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TranslateError::Timeout {
                        timeout: self.timeout,
                    }
                } else {
                    TranslateError::RequestFailed {
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let reason = resp.text().await.unwrap_or_default();
            return Err(TranslateError::Api {
                status: status.as_u16(),
                reason,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| TranslateError::InvalidResponse {
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl TranslationBackend for LibreTranslate {
    fn name(&self) -> &str {
        "libretranslate"
    }

    async fn detect(&self, text: &str) -> Result<Lang, TranslateError> {
        let body = DetectRequest {
            q: text,
            api_key: self.api_key.as_deref(),
        };
        let detections: Vec<Detection> = self.post_json("detect", &body).await?;
        let best = detections
            .into_iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .ok_or_else(|| TranslateError::InvalidResponse {
                reason: "empty detection list".to_string(),
            })?;
        Ok(Lang::from_code(&best.language))
    }

    async fn translate(
        &self,
        text: &str,
        source: Lang,
        target: Lang,
    ) -> Result<String, TranslateError> {
        let body = TranslateRequest {
            q: text,
            source: source.as_code(),
            target: target.as_code(),
            format: "text",
            api_key: self.api_key.as_deref(),
        };
        let resp: TranslateResponse = self.post_json("translate", &body).await?;
        Ok(resp.translated_text)
    }
}

// ── Pipeline-facing envelope ─────────────────────────────────────────

/// Fail-soft translation wrapper around the pipeline.
///
/// Detection failure means English; translation failure means the text
/// passes through unchanged. With no backend configured the envelope is a
/// no-op and the bot runs English-only.
pub struct LanguageEnvelope {
    backend: Option<Arc<dyn TranslationBackend>>,
}

impl LanguageEnvelope {
    pub fn new(backend: Arc<dyn TranslationBackend>) -> Self {
        Self {
            backend: Some(backend),
        }
    }

    pub fn disabled() -> Self {
        Self { backend: None }
    }

    /// Detect the language of `text`. Never fails: blank input, a missing
    /// backend, or a backend error all come back as English.
    pub async fn detect(&self, text: &str) -> Lang {
        if text.trim().is_empty() {
            return Lang::En;
        }
        let Some(backend) = &self.backend else {
            return Lang::En;
        };
        match backend.detect(text).await {
            Ok(lang) => {
                debug!(lang = %lang, "detected language");
                lang
            }
            Err(err) => {
                warn!(
                    backend = backend.name(),
                    error = %err,
                    "language detection failed, assuming English"
                );
                Lang::En
            }
        }
    }

    /// Translate `text` into the English pivot. Identity when the source
    /// already is English or the backend fails.
    pub async fn normalize(&self, text: &str, source: Lang) -> String {
        self.convert(text, source, Lang::PIVOT).await
    }

    /// Translate pivot `text` into `target`. Identity when the target is
    /// English or the backend fails.
    pub async fn denormalize(&self, text: &str, target: Lang) -> String {
        self.convert(text, Lang::PIVOT, target).await
    }

    async fn convert(&self, text: &str, source: Lang, target: Lang) -> String {
        if source == target {
            return text.to_string();
        }
        let Some(backend) = &self.backend else {
            return text.to_string();
        };
        match backend.translate(text, source, target).await {
            Ok(translated) => translated,
            Err(err) => {
                warn!(
                    backend = backend.name(),
                    source = %source,
                    target = %target,
                    error = %err,
                    "translation failed, passing text through"
                );
                text.to_string()
            }
        }
    }
}
