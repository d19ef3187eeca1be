use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

/// A message as the caller sees it while a conversation is in progress.
/// Assistant messages are mutated in place as deltas arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: Uuid,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn new(role: ChatRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Append-only persisted chat row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessageRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub consultation_id: Option<Uuid>,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessageRow {
    /// Converts a stored row back into a conversation message. Unknown roles yield `None`.
    pub fn into_message(self) -> Option<ChatMessage> {
        let role = match self.role.as_str() {
            "user" => ChatRole::User,
            "assistant" => ChatRole::Assistant,
            _ => return None,
        };
        Some(ChatMessage {
            id: self.id,
            role,
            content: self.content,
            timestamp: self.created_at,
        })
    }
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub user_id: Uuid,
    pub consultation_id: Option<Uuid>,
    pub role: ChatRole,
    pub content: String,
}
