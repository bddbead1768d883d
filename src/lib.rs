//! CareLine, a health Q&A bot for text messaging channels.

pub mod bank;
pub mod config;
pub mod context;
pub mod error;
pub mod fallback;
pub mod lang;
pub mod pipeline;
pub mod translate;
pub mod webhook;
