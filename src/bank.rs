//! The curated question bank.
//!
//! The bank is a JSON document mapping question text to per-language
//! answers, loaded once at startup and immutable afterwards:
//!
//! ```json
//! {
//!   "fever": { "en": "Rest and hydrate.", "hi": "आराम करें..." },
//!   "headache": { "en": "Drink water and rest in a dark room." }
//! }
//! ```
//!
//! Document order is preserved because the approximate tier breaks score
//! ties in favor of the earliest entry. Lookup keys are matched after
//! trimming and case-folding.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use serde::Deserialize;
use serde::de::{Deserializer, MapAccess, Visitor};

use crate::error::BankError;
use crate::lang::Lang;

/// One curated question with its per-language answers.
#[derive(Debug, Clone)]
pub struct QuestionEntry {
    question: String,
    answers: HashMap<Lang, String>,
}

impl QuestionEntry {
    /// Canonical question text as written in the bank document.
    pub fn question(&self) -> &str {
        &self.question
    }

    /// The answer for `lang`, falling back to English when no variant in
    /// that language exists. Returns the language the text actually is, so
    /// callers can tell a native answer from a pivot answer that still
    /// needs translating.
    pub fn answer(&self, lang: Lang) -> (Lang, &str) {
        match self.answers.get(&lang) {
            Some(text) => (lang, text.as_str()),
            None => (
                Lang::En,
                // Validated at load: every entry carries an "en" answer.
                self.answers
                    .get(&Lang::En)
                    .map(String::as_str)
                    .unwrap_or_default(),
            ),
        }
    }
}

/// The full bank: entries in document order plus a case-folded key index.
#[derive(Debug, Clone)]
pub struct QuestionBank {
    entries: Vec<QuestionEntry>,
    index: HashMap<String, usize>,
}

impl QuestionBank {
    /// Load and validate a bank document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BankError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Parse and validate a bank document.
    pub fn from_json_str(raw: &str) -> Result<Self, BankError> {
        let RawBank(pairs) = serde_json::from_str(raw)?;
        Self::from_pairs(pairs)
    }

    fn from_pairs(pairs: Vec<(String, HashMap<String, String>)>) -> Result<Self, BankError> {
        if pairs.is_empty() {
            return Err(BankError::Empty);
        }

        let mut entries = Vec::with_capacity(pairs.len());
        let mut index = HashMap::with_capacity(pairs.len());

        for (question, raw_answers) in pairs {
            let folded = fold_key(&question);
            if folded.is_empty() {
                return Err(BankError::BlankKey);
            }
            if index.contains_key(&folded) {
                return Err(BankError::DuplicateKey { key: question });
            }

            let mut answers = HashMap::with_capacity(raw_answers.len());
            for (code, text) in raw_answers {
                let lang = Lang::parse(&code).ok_or_else(|| BankError::UnknownLanguage {
                    key: question.clone(),
                    code,
                })?;
                answers.insert(lang, text);
            }
            if !answers.contains_key(&Lang::En) {
                return Err(BankError::MissingPivot { key: question });
            }

            index.insert(folded, entries.len());
            entries.push(QuestionEntry { question, answers });
        }

        Ok(QuestionBank { entries, index })
    }

    /// Case-insensitive exact lookup.
    pub fn exact(&self, text: &str) -> Option<&QuestionEntry> {
        self.index.get(&fold_key(text)).map(|&i| &self.entries[i])
    }

    /// All entries in document order.
    pub fn entries(&self) -> &[QuestionEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn fold_key(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Raw document shape: (question, { code: answer }) pairs in document order.
///
/// serde_json's default map type does not keep key order, so the bank
/// deserializes through a map visitor that pushes pairs as they appear.
struct RawBank(Vec<(String, HashMap<String, String>)>);

impl<'de> Deserialize<'de> for RawBank {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct RawBankVisitor;

        impl<'de> Visitor<'de> for RawBankVisitor {
            type Value = RawBank;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of question text to per-language answers")
            }

            fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some(pair) =
                    access.next_entry::<String, HashMap<String, String>>()?
                {
                    pairs.push(pair);
                }
                Ok(RawBank(pairs))
            }
        }

        deserializer.deserialize_map(RawBankVisitor)
    }
}
