//! Error types for Careline.
//!
//! One enum per external concern. There is no crate-level aggregate: the
//! pipeline never propagates these to the user, it degrades each failure
//! to a reply at the seam where it happened. Only the bank errors can
//! surface, and only at startup.

use std::time::Duration;

/// Question bank loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum BankError {
    #[error("Failed to parse question bank: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Question key is blank")]
    BlankKey,

    #[error("Duplicate question key (case-insensitive): {key}")]
    DuplicateKey { key: String },

    #[error("Question {key} has no \"en\" answer")]
    MissingPivot { key: String },

    #[error("Question {key} uses unknown language code {code}")]
    UnknownLanguage { key: String, code: String },

    #[error("Question bank is empty")]
    Empty,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Translation backend errors.
#[derive(Debug, thiserror::Error)]
pub enum TranslateError {
    #[error("Translation request failed: {reason}")]
    RequestFailed { reason: String },

    #[error("Translation backend returned {status}: {reason}")]
    Api { status: u16, reason: String },

    #[error("Invalid response from translation backend: {reason}")]
    InvalidResponse { reason: String },

    #[error("Translation request timed out after {timeout:?}")]
    Timeout { timeout: Duration },
}

/// Generative fallback backend errors.
#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    #[error("Backend {backend} request failed: {reason}")]
    RequestFailed { backend: String, reason: String },

    #[error("Authentication failed for backend {backend}")]
    AuthFailed { backend: String },

    #[error("Backend {backend} rate limited")]
    RateLimited { backend: String },

    #[error("Invalid response from backend {backend}: {reason}")]
    InvalidResponse { backend: String, reason: String },

    #[error("Backend {backend} timed out after {timeout:?}")]
    Timeout { backend: String, timeout: Duration },
}

/// Similarity scorer errors.
#[derive(Debug, thiserror::Error)]
pub enum ScoreError {
    #[error("Scorer {name} failed: {reason}")]
    Backend { name: String, reason: String },
}
