//! Conversation session handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use concommerce_common::{
    errors::{AppError, Result},
    models::ConversationTurn,
};

/// Create session response
#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub ttl_secs: u64,
}

/// Stored conversation
#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub turn_count: usize,
    pub turns: Vec<ConversationTurn>,
}

/// Start an empty session
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<CreateSessionResponse>)> {
    let session_id = Uuid::new_v4().to_string();
    state.store.append(&session_id, Vec::new()).await?;

    tracing::info!(session_id = %session_id, "Session created");

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id,
            ttl_secs: state.config.conversation.session_ttl_secs,
        }),
    ))
}

/// Get a stored conversation
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionResponse>> {
    let turns = state
        .store
        .load(&session_id)
        .await?
        .ok_or_else(|| AppError::SessionNotFound {
            id: session_id.clone(),
        })?;

    Ok(Json(SessionResponse {
        session_id,
        turn_count: turns.len(),
        turns,
    }))
}

/// Forget a stored conversation
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode> {
    if !state.store.clear(&session_id).await? {
        return Err(AppError::SessionNotFound { id: session_id });
    }

    tracing::info!(session_id = %session_id, "Session cleared");
    Ok(StatusCode::NO_CONTENT)
}
