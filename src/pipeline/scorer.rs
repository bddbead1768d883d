//! Similarity scorers for the approximate tier.
//!
//! Both bundled scorers emit on a 0–100 scale so one acceptance threshold
//! works regardless of which is configured. The trait is async because a
//! scorer may be a remote service; the bundled ones compute in-process and
//! return immediately.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ScoreError;

/// Scores how alike a user's question and a bank key are.
#[async_trait]
pub trait SimilarityScorer: Send + Sync {
    fn name(&self) -> &str;

    /// Score `input` against `candidate`; 100 means identical.
    async fn score(&self, input: &str, candidate: &str) -> Result<f32, ScoreError>;
}

/// Which bundled scorer to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScorerKind {
    Ratio,
    Terms,
}

impl ScorerKind {
    /// Parse a config value. Unrecognized names get the default ratio
    /// scorer.
    pub fn from_name(name: &str) -> ScorerKind {
        match name.trim().to_ascii_lowercase().as_str() {
            "terms" => ScorerKind::Terms,
            _ => ScorerKind::Ratio,
        }
    }

    pub fn create(&self) -> Arc<dyn SimilarityScorer> {
        match self {
            ScorerKind::Ratio => Arc::new(SequenceRatio),
            ScorerKind::Terms => Arc::new(TermOverlap),
        }
    }
}

// ── Edit-distance ratio ─────────────────────────────────────────────

/// Edit-distance ratio scorer.
///
/// Takes the best of the whole-string ratio and a sliding-window partial
/// ratio, so a short bank key buried in a longer sentence ("i have a
/// feverish feeling" against "fever") still scores high.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequenceRatio;

#[async_trait]
impl SimilarityScorer for SequenceRatio {
    fn name(&self) -> &str {
        "ratio"
    }

    async fn score(&self, input: &str, candidate: &str) -> Result<f32, ScoreError> {
        Ok(sequence_ratio(input, candidate))
    }
}

fn sequence_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    ratio(&a, &b).max(partial_ratio(&a, &b))
}

/// Levenshtein similarity of two char slices, 0–100.
fn ratio(a: &[char], b: &[char]) -> f32 {
    let max_len = a.len().max(b.len());
    if max_len == 0 {
        return 100.0;
    }
    let dist = levenshtein(a, b);
    (1.0 - dist as f32 / max_len as f32) * 100.0
}

/// Best ratio of the shorter slice against every same-length window of the
/// longer one.
fn partial_ratio(a: &[char], b: &[char]) -> f32 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut best: f32 = 0.0;
    for start in 0..=(long.len() - short.len()) {
        let window = &long[start..start + short.len()];
        best = best.max(ratio(short, window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

/// Two-row Levenshtein distance over chars.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

// ── Term-frequency cosine ───────────────────────────────────────────

/// Term-frequency cosine scorer.
///
/// Case-folds, splits on non-alphanumeric boundaries, and measures the
/// cosine of the two term-count vectors, scaled to 0–100 (a 0.6 cosine
/// reads as 60 against the threshold).
#[derive(Debug, Default, Clone, Copy)]
pub struct TermOverlap;

#[async_trait]
impl SimilarityScorer for TermOverlap {
    fn name(&self) -> &str {
        "terms"
    }

    async fn score(&self, input: &str, candidate: &str) -> Result<f32, ScoreError> {
        Ok(term_cosine(input, candidate))
    }
}

fn term_counts(text: &str) -> HashMap<String, f32> {
    let mut counts = HashMap::new();
    for term in text
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        *counts.entry(term.to_string()).or_insert(0.0) += 1.0;
    }
    counts
}

fn term_cosine(a: &str, b: &str) -> f32 {
    let a = term_counts(a);
    let b = term_counts(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let dot: f32 = a
        .iter()
        .filter_map(|(term, &count)| b.get(term).map(|&other| count * other))
        .sum();
    let norm_a = a.values().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b = b.values().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)) * 100.0
}
