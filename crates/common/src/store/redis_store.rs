//! Redis-backed conversation store
//!
//! A session is a Redis list of JSON-encoded turns plus a marker key. Both
//! carry the idle TTL and every append refreshes it. The marker lets a
//! session exist before its first turn.

use super::ConversationStore;
use crate::config::ConversationConfig;
use crate::errors::{AppError, Result};
use crate::models::ConversationTurn;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use std::fmt::Display;
use tracing::debug;

/// Key builders
pub mod keys {
    /// List holding the session's turns, oldest first
    pub fn turns(prefix: &str, session_id: &str) -> String {
        format!("{}:session:{}:turns", prefix, session_id)
    }

    /// Marker whose presence means the session exists
    pub fn marker(prefix: &str, session_id: &str) -> String {
        format!("{}:session:{}", prefix, session_id)
    }
}

fn unavailable(action: &str, e: impl Display) -> AppError {
    AppError::StoreUnavailable {
        message: format!("{}: {}", action, e),
    }
}

fn encode_turns(turns: &[ConversationTurn]) -> Result<Vec<String>> {
    turns
        .iter()
        .map(|turn| serde_json::to_string(turn).map_err(AppError::from))
        .collect()
}

fn decode_turns(raw: Vec<String>) -> Result<Vec<ConversationTurn>> {
    raw.iter()
        .map(|json| {
            serde_json::from_str(json).map_err(|e| unavailable("Failed to parse stored turn", e))
        })
        .collect()
}

/// Sessions in Redis, shared by every gateway instance
pub struct RedisConversationStore {
    connection: ConnectionManager,
    key_prefix: String,
    ttl_secs: u64,
    max_turns: usize,
}

impl RedisConversationStore {
    /// Connect to `url` with TTL and turn limits from `config`
    pub async fn connect(url: &str, config: &ConversationConfig) -> Result<Self> {
        let client =
            Client::open(url).map_err(|e| unavailable("Failed to create Redis client", e))?;

        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| unavailable("Failed to connect to Redis", e))?;

        Ok(Self {
            connection,
            key_prefix: config.key_prefix.clone(),
            ttl_secs: config.session_ttl_secs.max(1),
            max_turns: config.max_stored_turns.max(1),
        })
    }
}

#[async_trait]
impl ConversationStore for RedisConversationStore {
    async fn load(&self, session_id: &str) -> Result<Option<Vec<ConversationTurn>>> {
        let mut conn = self.connection.clone();
        let (exists, raw): (bool, Vec<String>) = redis::pipe()
            .exists(keys::marker(&self.key_prefix, session_id))
            .lrange(keys::turns(&self.key_prefix, session_id), 0, -1)
            .query_async(&mut conn)
            .await
            .map_err(|e| unavailable("Failed to load session", e))?;

        if !exists {
            debug!(session_id = %session_id, "Session miss");
            return Ok(None);
        }
        decode_turns(raw).map(Some)
    }

    async fn append(&self, session_id: &str, turns: Vec<ConversationTurn>) -> Result<()> {
        let turns_key = keys::turns(&self.key_prefix, session_id);
        let encoded = encode_turns(&turns)?;

        let mut pipe = redis::pipe();
        pipe.atomic()
            .set_ex(keys::marker(&self.key_prefix, session_id), 1, self.ttl_secs)
            .ignore();
        if !encoded.is_empty() {
            pipe.rpush(&turns_key, encoded)
                .ignore()
                .ltrim(&turns_key, -(self.max_turns as isize), -1)
                .ignore();
        }
        pipe.expire(&turns_key, self.ttl_secs as i64).ignore();

        let mut conn = self.connection.clone();
        pipe.query_async::<()>(&mut conn)
            .await
            .map_err(|e| unavailable("Failed to append turns", e))?;

        debug!(session_id = %session_id, appended = turns.len(), "Session updated");
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<bool> {
        let mut conn = self.connection.clone();
        let removed: usize = conn
            .del(vec![
                keys::turns(&self.key_prefix, session_id),
                keys::marker(&self.key_prefix, session_id),
            ])
            .await
            .map_err(|e| unavailable("Failed to delete session", e))?;
        Ok(removed > 0)
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .map_err(|e| unavailable("Redis ping failed", e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorCode;

    #[test]
    fn test_key_builders() {
        assert_eq!(keys::marker("cc", "s1"), "cc:session:s1");
        assert_eq!(keys::turns("cc", "s1"), "cc:session:s1:turns");
    }

    #[test]
    fn test_turns_survive_encoding() {
        let turns = vec![
            ConversationTurn::user("gaming laptop"),
            ConversationTurn::assistant("Here you go", vec![]),
        ];
        let decoded = decode_turns(encode_turns(&turns).unwrap()).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].content, "gaming laptop");
        assert_eq!(decoded[1].role, turns[1].role);
    }

    #[test]
    fn test_corrupt_turn_is_store_failure() {
        let err = decode_turns(vec!["not json".to_string()]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
    }

    #[tokio::test]
    async fn test_bad_url_is_store_failure() {
        let result = RedisConversationStore::connect("not a url", &ConversationConfig::default()).await;
        assert!(matches!(result, Err(AppError::StoreUnavailable { .. })));
    }
}
