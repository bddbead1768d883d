//! Language codes the bot understands.
//!
//! Detection and translation backends speak ISO 639-1 codes; everything the
//! pipeline does internally happens in the English pivot. The one rule that
//! keeps the rest of the codebase simple lives here: a code we do not
//! recognize is treated as English.

use std::fmt;

/// A supported language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    En,
    Es,
    Fr,
    Pt,
    De,
    Ar,
    Hi,
    Bn,
    Ta,
    Sw,
}

impl Lang {
    /// The pivot language all matching runs in.
    pub const PIVOT: Lang = Lang::En;

    /// Strict parse of an ISO 639-1 code. Case-insensitive.
    pub fn parse(code: &str) -> Option<Lang> {
        match code.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Lang::En),
            "es" => Some(Lang::Es),
            "fr" => Some(Lang::Fr),
            "pt" => Some(Lang::Pt),
            "de" => Some(Lang::De),
            "ar" => Some(Lang::Ar),
            "hi" => Some(Lang::Hi),
            "bn" => Some(Lang::Bn),
            "ta" => Some(Lang::Ta),
            "sw" => Some(Lang::Sw),
            _ => None,
        }
    }

    /// Lenient parse: unrecognized codes fall back to English.
    pub fn from_code(code: &str) -> Lang {
        Lang::parse(code).unwrap_or(Lang::En)
    }

    /// The lowercase ISO 639-1 code.
    pub fn as_code(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Es => "es",
            Lang::Fr => "fr",
            Lang::Pt => "pt",
            Lang::De => "de",
            Lang::Ar => "ar",
            Lang::Hi => "hi",
            Lang::Bn => "bn",
            Lang::Ta => "ta",
            Lang::Sw => "sw",
        }
    }
}

impl fmt::Display for Lang {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_code())
    }
}
