//! Conversation turns as supplied by the caller

use super::item::CatalogItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message in a conversation. Assistant turns that displayed results
/// carry the items that were shown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<CatalogItem>>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            items: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, items: Vec<CatalogItem>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            items: (!items.is_empty()).then_some(items),
            timestamp: Utc::now(),
        }
    }

    /// Items displayed with this turn, if any
    pub fn shown_items(&self) -> &[CatalogItem] {
        self.items.as_deref().unwrap_or_default()
    }
}

/// The most recent `size` turns, oldest first. Older turns are never
/// consulted.
pub fn recent_window(history: &[ConversationTurn], size: usize) -> &[ConversationTurn] {
    let start = history.len().saturating_sub(size);
    &history[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recent_window_keeps_tail() {
        let history: Vec<_> = (0..6).map(|i| ConversationTurn::user(i.to_string())).collect();
        let window = recent_window(&history, 4);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].content, "2");
        assert_eq!(recent_window(&history, 10).len(), 6);
    }

    #[test]
    fn test_assistant_without_items_has_none() {
        let turn = ConversationTurn::assistant("Hello!", vec![]);
        assert!(turn.items.is_none());
        assert!(turn.shown_items().is_empty());
    }

    #[test]
    fn test_timestamp_defaults_when_missing() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role":"user","content":"hi"}"#).unwrap();
        assert_eq!(turn.role, Role::User);
    }
}
