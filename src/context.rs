//! Per-user topic memory.
//!
//! The bot remembers one thing per user: the topic of their last resolved
//! interaction. The fallback responder reads it to seed follow-up questions
//! ("what should I eat" after "fever"). Entries live for a configurable TTL
//! and are evicted lazily on read; nothing persists across restarts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

/// What the bot remembers about one user.
#[derive(Debug, Clone)]
pub struct ContextEntry {
    pub last_topic: String,
    pub last_update: DateTime<Utc>,
}

/// Storage seam for topic memory.
///
/// Concurrent writes for the same user race; the last writer wins. Reads
/// never error: an expired or missing entry is simply `None`.
#[async_trait]
pub trait ContextStore: Send + Sync {
    /// The unexpired entry for `user_id`, if any.
    async fn get(&self, user_id: &str) -> Option<ContextEntry>;

    /// Record `topic` as the user's latest topic, stamping it with now.
    async fn put(&self, user_id: &str, topic: &str);
}

/// Process-local store backed by a `RwLock`ed map.
pub struct InMemoryContextStore {
    ttl: chrono::Duration,
    entries: RwLock<HashMap<String, ContextEntry>>,
}

impl InMemoryContextStore {
    pub fn new(ttl_secs: u64) -> Arc<Self> {
        // TTLs past chrono's representable range clamp to never-expiring.
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX);
        Arc::new(Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        })
    }
}

#[async_trait]
impl ContextStore for InMemoryContextStore {
    // Takes the write lock even on the read path: expiry evicts in place.
    async fn get(&self, user_id: &str) -> Option<ContextEntry> {
        let mut entries = self.entries.write().await;
        let expired = match entries.get(user_id) {
            Some(entry) => {
                if Utc::now() - entry.last_update < self.ttl {
                    return Some(entry.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            entries.remove(user_id);
            debug!(user = user_id, "evicted expired context entry");
        }
        None
    }

    async fn put(&self, user_id: &str, topic: &str) {
        let mut entries = self.entries.write().await;
        entries.insert(
            user_id.to_string(),
            ContextEntry {
                last_topic: topic.to_string(),
                last_update: Utc::now(),
            },
        );
    }
}
