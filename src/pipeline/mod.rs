//! Message resolution pipeline.
//!
//! Every inbound message flows through:
//! 1. `LanguageEnvelope::detect` + `normalize` to English pivot text
//! 2. `Matcher::resolve` over the greeting, exact, and approximate tiers
//! 3. `FallbackResponder::resolve` for a constrained generative answer
//!    when no tier matched, seeded with the user's last topic
//! 4. `LanguageEnvelope::denormalize` back into the sender's language
//!
//! **No failing path exists.** Every backend failure degrades to a polite
//! reply; a message in always produces a reply out.

pub mod matcher;
pub mod resolver;
pub mod scorer;
pub mod types;
