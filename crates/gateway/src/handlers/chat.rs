//! Chat handler

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use concommerce_common::{
    errors::{AppError, Result},
    models::{ConversationTurn, EmbeddingSpace, FilterState, GenerationBackend},
};
use concommerce_context::{ChatRequest, ChatResponse};

/// Chat request body
#[derive(Debug, Deserialize, Validate)]
pub struct ChatBody {
    #[validate(length(min = 1, max = 2000))]
    pub message: String,

    #[serde(default)]
    pub provider: Option<GenerationBackend>,

    #[serde(default)]
    pub embedding_model: Option<EmbeddingSpace>,

    #[serde(default)]
    pub filters: FilterState,

    /// Conversation held by the client; takes precedence over a stored session
    #[serde(default)]
    pub history: Vec<ConversationTurn>,

    /// Server-side session to read history from and append to
    #[validate(length(min = 1, max = 128))]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatReply {
    #[serde(flatten)]
    pub response: ChatResponse,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// Answer one chat message
pub async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatBody>,
) -> Result<Json<ChatReply>> {
    body.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: None,
    })?;

    let history = match (&body.session_id, body.history.is_empty()) {
        (Some(session_id), true) => state.store.load(session_id).await?.unwrap_or_default(),
        _ => body.history,
    };

    let message = body.message;
    let response = state
        .pipeline
        .handle(ChatRequest {
            message: message.clone(),
            provider: body.provider,
            embedding_model: body.embedding_model,
            filters: body.filters,
            history,
        })
        .await?;

    if let Some(session_id) = &body.session_id {
        if let Err(e) = state.store.append(session_id, response.turns(&message)).await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to store conversation turns");
        }
    }

    Ok(Json(ChatReply {
        response,
        session_id: body.session_id,
    }))
}
