//! Conversation session storage
//!
//! Provides:
//! - A session-keyed conversation history interface
//! - A bounded in-memory implementation with idle TTL
//! - A Redis implementation for sessions shared across gateway instances
//!
//! The pipeline itself never touches the store; the HTTP layer loads
//! history before a turn and appends the exchange afterwards.

use crate::config::ConversationConfig;
use crate::errors::Result;
use crate::metrics;
use crate::models::ConversationTurn;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

mod redis_store;

pub use redis_store::RedisConversationStore;

/// Trait for conversation history storage
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Stored turns for a session, oldest first. `None` if unknown or expired.
    async fn load(&self, session_id: &str) -> Result<Option<Vec<ConversationTurn>>>;

    /// Append turns, creating the session if needed
    async fn append(&self, session_id: &str, turns: Vec<ConversationTurn>) -> Result<()>;

    /// Forget a session. Returns whether it existed.
    async fn clear(&self, session_id: &str) -> Result<bool>;

    /// Check that the backing store answers
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

struct Session {
    turns: Vec<ConversationTurn>,
    touched: Instant,
}

/// In-process store; sessions expire after an idle period
pub struct InMemoryConversationStore {
    sessions: RwLock<HashMap<String, Session>>,
    ttl: Duration,
    max_turns: usize,
}

impl InMemoryConversationStore {
    pub fn new(ttl: Duration, max_turns: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
            max_turns: max_turns.max(1),
        }
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(Duration::from_secs(config.session_ttl_secs), config.max_stored_turns)
    }

    /// Drop idle sessions. Returns how many were removed.
    pub async fn purge_expired(&self) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.touched.elapsed() < self.ttl);
        let removed = before - sessions.len();
        metrics::record_sessions(sessions.len());
        if removed > 0 {
            debug!(removed = removed, "Expired conversation sessions purged");
        }
        removed
    }

    /// Number of stored sessions, expired ones included until purged
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn load(&self, session_id: &str) -> Result<Option<Vec<ConversationTurn>>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(session_id)
            .filter(|session| session.touched.elapsed() < self.ttl)
            .map(|session| session.turns.clone()))
    }

    async fn append(&self, session_id: &str, turns: Vec<ConversationTurn>) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let ttl = self.ttl;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                turns: Vec::new(),
                touched: Instant::now(),
            });

        if session.touched.elapsed() >= ttl {
            session.turns.clear();
        }

        session.turns.extend(turns);
        let overflow = session.turns.len().saturating_sub(self.max_turns);
        session.turns.drain(..overflow);
        session.touched = Instant::now();

        metrics::record_sessions(sessions.len());
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<bool> {
        let mut sessions = self.sessions.write().await;
        let existed = sessions.remove(session_id).is_some();
        metrics::record_sessions(sessions.len());
        Ok(existed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_append_and_load() {
        let store = InMemoryConversationStore::new(Duration::from_secs(60), 10);
        store
            .append(
                "s1",
                vec![
                    ConversationTurn::user("gaming laptop"),
                    ConversationTurn::assistant("Here are some options", vec![]),
                ],
            )
            .await
            .unwrap();

        let turns = store.load("s1").await.unwrap().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "gaming laptop");
        assert!(store.load("other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_oldest_turns_are_dropped() {
        let store = InMemoryConversationStore::new(Duration::from_secs(60), 3);
        for i in 0..5 {
            store
                .append("s1", vec![ConversationTurn::user(i.to_string())])
                .await
                .unwrap();
        }
        let turns = store.load("s1").await.unwrap().unwrap();
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, vec!["2", "3", "4"]);
    }

    #[tokio::test]
    async fn test_expired_sessions_are_invisible_and_purged() {
        let store = InMemoryConversationStore::new(Duration::from_millis(20), 10);
        store
            .append("s1", vec![ConversationTurn::user("hi")])
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert!(store.load("s1").await.unwrap().is_none());
        assert_eq!(store.purge_expired().await, 1);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_clear_reports_existence() {
        let store = InMemoryConversationStore::new(Duration::from_secs(60), 10);
        store
            .append("s1", vec![ConversationTurn::user("hi")])
            .await
            .unwrap();
        assert!(store.clear("s1").await.unwrap());
        assert!(!store.clear("s1").await.unwrap());
    }
}
