//! Client side of the chat relay.
//!
//! `ChatConsumer` keeps the caller's view of a conversation. It posts the
//! conversation to the relay, feeds the event stream through the same
//! `FrameDecoder` the relay uses on the gateway, and grows the assistant
//! message in place as deltas arrive.

use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::{QUOTA_NOTICE, RATE_LIMIT_NOTICE};
use crate::llm_client::frames::FrameDecoder;
use crate::models::chat::{ChatMessage, ChatMessageRow, ChatRole};

#[derive(Debug, Error)]
pub enum ConsumerError {
    #[error("Please sign in to chat")]
    Unauthenticated,

    #[error("{}", RATE_LIMIT_NOTICE)]
    RateLimited,

    #[error("{}", QUOTA_NOTICE)]
    QuotaExhausted,

    #[error("Failed to get response (status {status})")]
    Relay { status: u16 },

    #[error("Failed to send message: {0}")]
    Http(#[from] reqwest::Error),
}

pub struct ChatConsumer {
    http: Client,
    base_url: String,
    user_id: Option<Uuid>,
    messages: Vec<ChatMessage>,
}

impl ChatConsumer {
    pub fn new(base_url: impl Into<String>, user_id: Option<Uuid>) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_id,
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Sends one user message and streams the reply into the conversation.
    /// `on_update` sees the assistant message after every applied delta.
    pub async fn send_message<F>(
        &mut self,
        content: &str,
        consultation_id: Option<Uuid>,
        mut on_update: F,
    ) -> Result<(), ConsumerError>
    where
        F: FnMut(&ChatMessage),
    {
        let user_id = self.user_id.ok_or(ConsumerError::Unauthenticated)?;
        self.messages.push(ChatMessage::new(ChatRole::User, content));

        let conversation: Vec<_> = self
            .messages
            .iter()
            .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
            .collect();

        let response = self
            .http
            .post(format!("{}/api/v1/chat", self.base_url))
            .json(&json!({
                "messages": conversation,
                "userId": user_id,
                "consultationId": consultation_id,
            }))
            .send()
            .await?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(ConsumerError::RateLimited),
            StatusCode::PAYMENT_REQUIRED => return Err(ConsumerError::QuotaExhausted),
            status if !status.is_success() => {
                return Err(ConsumerError::Relay {
                    status: status.as_u16(),
                })
            }
            _ => {}
        }

        let mut body = response.bytes_stream();
        let mut decoder = FrameDecoder::new();
        let mut reply = None;
        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            if let Some(message) = self.apply_chunk(&mut decoder, &mut reply, &chunk) {
                on_update(message);
            }
        }

        let dropped = decoder.finish();
        if dropped > 0 {
            debug!("Discarded {dropped} bytes of unterminated relay data");
        }
        Ok(())
    }

    /// Replaces the conversation with the stored history.
    pub async fn load_history(&mut self, consultation_id: Option<Uuid>) -> Result<(), ConsumerError> {
        let Some(user_id) = self.user_id else {
            return Ok(());
        };

        let mut query = vec![("user_id", user_id.to_string())];
        if let Some(id) = consultation_id {
            query.push(("consultation_id", id.to_string()));
        }

        let response = self
            .http
            .get(format!("{}/api/v1/chat/history", self.base_url))
            .query(&query)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ConsumerError::Relay {
                status: response.status().as_u16(),
            });
        }

        let rows: Vec<ChatMessageRow> = response.json().await?;
        self.replace_with_history(rows);
        Ok(())
    }

    fn replace_with_history(&mut self, rows: Vec<ChatMessageRow>) {
        let total = rows.len();
        self.messages = rows.into_iter().filter_map(ChatMessageRow::into_message).collect();
        if self.messages.len() < total {
            warn!(
                "Skipped {} history rows with unknown roles",
                total - self.messages.len()
            );
        }
    }

    /// Applies one read to the in-progress reply. The assistant placeholder is
    /// created on the first delta; returns it when it changed.
    fn apply_chunk(
        &mut self,
        decoder: &mut FrameDecoder,
        reply: &mut Option<usize>,
        chunk: &[u8],
    ) -> Option<&ChatMessage> {
        let deltas = decoder.feed(chunk);
        if deltas.is_empty() {
            return None;
        }

        let index = *reply.get_or_insert_with(|| {
            self.messages.push(ChatMessage::new(ChatRole::Assistant, ""));
            self.messages.len() - 1
        });
        let message = &mut self.messages[index];
        for delta in deltas {
            message.content.push_str(&delta);
        }
        Some(&*message)
    }
}
