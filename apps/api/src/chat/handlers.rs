//! Axum route handlers for the Chat API.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::chat::relay::ChatTurn;
use crate::errors::AppError;
use crate::extract::{ApiJson, ApiQuery};
use crate::llm_client::frames::{encode_delta, DONE_SENTINEL};
use crate::llm_client::{GatewayMessage, LlmError};
use crate::models::chat::ChatMessageRow;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<GatewayMessage>,
    #[serde(rename = "userId")]
    pub user_id: Option<Uuid>,
    #[serde(rename = "consultationId")]
    pub consultation_id: Option<Uuid>,
}

impl ChatRequest {
    /// Splits the body into prior history and the new user text.
    fn into_turn(self) -> Result<ChatTurn, AppError> {
        let mut messages = self.messages;
        if let Some(bad) = messages
            .iter()
            .find(|m| m.role != "user" && m.role != "assistant")
        {
            return Err(AppError::Validation(format!(
                "unsupported message role '{}'",
                bad.role
            )));
        }
        let last = messages
            .pop()
            .ok_or_else(|| AppError::Validation("messages must not be empty".to_string()))?;
        if last.role != "user" {
            return Err(AppError::Validation(
                "the last message must come from the user".to_string(),
            ));
        }

        Ok(ChatTurn {
            user_id: self.user_id,
            consultation_id: self.consultation_id,
            history: messages,
            new_user_text: last.content,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub user_id: Uuid,
    pub consultation_id: Option<Uuid>,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/chat
pub async fn handle_chat(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ChatRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, LlmError>>>, AppError> {
    info!(
        "Chat request received from user {:?} (consultation {:?})",
        req.user_id, req.consultation_id
    );
    let user_id = req.user_id.ok_or(AppError::Unauthenticated)?;
    let turn = req.into_turn()?;

    let deltas = state.chat_relay().handle_turn(turn).await?;
    info!("Relaying chat stream to user {user_id}");

    let events = deltas
        .map(|delta| delta.map(|text| Event::default().data(encode_delta(&text))))
        .chain(stream::once(async {
            Ok(Event::default().data(DONE_SENTINEL))
        }));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// GET /api/v1/chat/history
pub async fn handle_chat_history(
    State(state): State<AppState>,
    ApiQuery(params): ApiQuery<HistoryQuery>,
) -> Result<Json<Vec<ChatMessageRow>>, AppError> {
    let rows = state
        .store
        .list_chat_messages(params.user_id, params.consultation_id)
        .await?;
    Ok(Json(rows))
}
