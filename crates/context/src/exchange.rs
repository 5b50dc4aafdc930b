//! Request and response shapes of the pipeline

use concommerce_common::context::{InfeasibleBudget, RouteKind};
use concommerce_common::models::{
    CatalogItem, ConversationTurn, EmbeddingSpace, FilterState, GenerationBackend,
};
use serde::{Deserialize, Serialize};

/// One chat message with everything needed to answer it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,

    /// Preferred generation backend; the other one is the fallback
    #[serde(default)]
    pub provider: Option<GenerationBackend>,

    /// Embedding space (and so index partition) to search
    #[serde(default)]
    pub embedding_model: Option<EmbeddingSpace>,

    /// Filters set by the user
    #[serde(default)]
    pub filters: FilterState,

    /// Conversation so far, oldest first
    #[serde(default)]
    pub history: Vec<ConversationTurn>,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Non-error condition worth surfacing next to the reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notice {
    /// Budget below the realism floor; retrieval was skipped
    InfeasibleBudget(InfeasibleBudget),
    /// Retrieval succeeded but nothing matched
    NoResults,
    /// Reply carried no usable selection; items are an intent-keyed slice
    SelectionFallback { reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseMetadata {
    /// Backend that produced the reply (none for canned replies)
    pub provider: Option<GenerationBackend>,
    pub model: Option<String>,

    /// The preferred backend failed and the fallback answered
    #[serde(default)]
    pub provider_fell_back: bool,

    /// Candidates handed to generation
    pub items_found_before_selection: usize,

    /// Items displayed
    pub selection_size: usize,

    pub route: RouteKind,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notice: Option<Notice>,
}

/// Reply to one chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Reply text, selection object removed
    pub narrative: String,

    /// Items to display, in the order the reply declared them
    pub items: Vec<CatalogItem>,

    pub metadata: ResponseMetadata,
}

impl ChatResponse {
    /// A reply made without any generation call
    pub fn canned(narrative: impl Into<String>, route: RouteKind, notice: Option<Notice>) -> Self {
        Self {
            narrative: narrative.into(),
            items: Vec::new(),
            metadata: ResponseMetadata {
                provider: None,
                model: None,
                provider_fell_back: false,
                items_found_before_selection: 0,
                selection_size: 0,
                route,
                notice,
            },
        }
    }

    /// Turns to append to a stored conversation
    pub fn turns(&self, message: &str) -> Vec<ConversationTurn> {
        vec![
            ConversationTurn::user(message),
            ConversationTurn::assistant(self.narrative.clone(), self.items.clone()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: ChatRequest = serde_json::from_str(r#"{"message":"hello"}"#).unwrap();
        assert_eq!(request.message, "hello");
        assert!(request.provider.is_none());
        assert!(request.history.is_empty());
        assert!(!request.filters.price.is_active());
    }

    #[test]
    fn test_request_selectors() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"message":"x","provider":"gemini","embedding_model":"huggingface"}"#,
        )
        .unwrap();
        assert_eq!(request.provider, Some(GenerationBackend::Gemini));
        assert_eq!(request.embedding_model, Some(EmbeddingSpace::HuggingFace));
    }

    #[test]
    fn test_notice_is_tagged() {
        let notice = Notice::InfeasibleBudget(InfeasibleBudget {
            class: "laptop".into(),
            requested_max: 15_000,
            floor: 25_000,
            suggested_budgets: vec![25_000, 40_000, 50_000],
        });
        let json = serde_json::to_value(&notice).unwrap();
        assert_eq!(json["kind"], "infeasible_budget");
        assert_eq!(json["floor"], 25_000);

        let json = serde_json::to_value(Notice::NoResults).unwrap();
        assert_eq!(json["kind"], "no_results");
    }

    #[test]
    fn test_canned_response_has_no_items() {
        let response = ChatResponse::canned("Hi!", RouteKind::Casual, None);
        assert!(response.items.is_empty());
        assert_eq!(response.metadata.selection_size, 0);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["metadata"]["route"], "casual");
        assert!(json["metadata"].get("notice").is_none());
    }

    #[test]
    fn test_turns_attach_items_to_assistant() {
        let response = ChatResponse::canned("Hi!", RouteKind::Casual, None);
        let turns = response.turns("hello");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "hello");
        assert!(turns[1].shown_items().is_empty());
    }
}
