//! Chat relay: one conversation turn against the streaming gateway.
//!
//! Flow: persist user message → open gateway stream → decode frames →
//!       forward each delta → persist the assembled assistant message.
//!
//! The returned stream owns the gateway body. Dropping it (client disconnect)
//! releases the upstream connection and the partial turn is never persisted.

use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::chat::prompts::CHAT_SYSTEM;
use crate::errors::AppError;
use crate::llm_client::frames::FrameDecoder;
use crate::llm_client::{CompletionGateway, GatewayMessage, LlmError};
use crate::models::chat::{ChatRole, NewChatMessage};
use crate::store::RelayStore;

/// Content deltas in source order. An `Err` item ends the turn.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub user_id: Option<Uuid>,
    pub consultation_id: Option<Uuid>,
    /// Prior conversation, oldest first. Roles are `user` or `assistant`.
    pub history: Vec<GatewayMessage>,
    pub new_user_text: String,
}

#[derive(Clone)]
pub struct ChatRelay {
    store: Arc<dyn RelayStore>,
    gateway: Arc<dyn CompletionGateway>,
}

impl ChatRelay {
    pub fn new(store: Arc<dyn RelayStore>, gateway: Arc<dyn CompletionGateway>) -> Self {
        Self { store, gateway }
    }

    /// Persists the user message and opens the gateway stream.
    ///
    /// Errors before the first delta (no identity, rate limit, quota) are
    /// returned directly. The assistant message is written once the returned
    /// stream has been fully drained.
    pub async fn handle_turn(&self, turn: ChatTurn) -> Result<DeltaStream, AppError> {
        let user_id = turn.user_id.ok_or(AppError::Unauthenticated)?;
        let consultation_id = turn.consultation_id;

        self.store
            .insert_chat_message(NewChatMessage {
                user_id,
                consultation_id,
                role: ChatRole::User,
                content: turn.new_user_text.clone(),
            })
            .await?;

        let mut messages = Vec::with_capacity(turn.history.len() + 2);
        messages.push(GatewayMessage::system(CHAT_SYSTEM));
        messages.extend(turn.history);
        messages.push(GatewayMessage::user(&turn.new_user_text));

        let mut body = self.gateway.stream(&messages).await?;
        info!("Streaming chat turn for user {user_id}");

        let store = self.store.clone();
        let stream = async_stream::stream! {
            let mut guard = TurnGuard { user_id, completed: false };
            let mut decoder = FrameDecoder::new();
            let mut assistant = String::new();

            while let Some(chunk) = body.next().await {
                match chunk {
                    Ok(bytes) => {
                        for delta in decoder.feed(&bytes) {
                            assistant.push_str(&delta);
                            yield Ok(delta);
                        }
                    }
                    Err(e) => {
                        error!("Gateway stream failed for user {user_id}: {e}");
                        guard.completed = true;
                        yield Err(e);
                        return;
                    }
                }
            }

            let dropped = decoder.finish();
            if dropped > 0 {
                debug!("Discarded {dropped} bytes of unterminated stream data");
            }
            guard.completed = true;

            let reply = NewChatMessage {
                user_id,
                consultation_id,
                role: ChatRole::Assistant,
                content: assistant,
            };
            if let Err(e) = store.insert_chat_message(reply).await {
                error!("Failed to persist assistant message for user {user_id}: {e}");
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Notes a turn abandoned before the gateway stream closed.
struct TurnGuard {
    user_id: Uuid,
    completed: bool,
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if !self.completed {
            debug!(
                "Chat turn for user {} dropped before completion; assistant reply not saved",
                self.user_id
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::frames::encode_delta;
    use crate::llm_client::testing::{Script, ScriptedGateway};
    use crate::store::memory::MemoryStore;
    use bytes::Bytes;

    fn frame(content: &str) -> String {
        format!("data: {}\n\n", encode_delta(content))
    }

    fn turn(user_id: Option<Uuid>) -> ChatTurn {
        ChatTurn {
            user_id,
            consultation_id: None,
            history: vec![
                GatewayMessage::user("I have a headache"),
                GatewayMessage {
                    role: "assistant".to_string(),
                    content: "How long has it lasted?".to_string(),
                },
            ],
            new_user_text: "Two days".to_string(),
        }
    }

    async fn collect(stream: DeltaStream) -> Vec<Result<String, LlmError>> {
        stream.collect().await
    }

    #[tokio::test]
    async fn test_missing_identity_makes_no_calls() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::chunks(&[]));
        let relay = ChatRelay::new(store.clone(), gateway.clone());

        let result = relay.handle_turn(turn(None)).await;

        assert!(matches!(result, Err(AppError::Unauthenticated)));
        assert_eq!(gateway.call_count(), 0);
        store.with(|t| assert!(t.chat_messages.is_empty()));
    }

    #[tokio::test]
    async fn test_deltas_arrive_in_order_and_reply_is_saved() {
        let store = Arc::new(MemoryStore::new());
        let first = frame("Two days ");
        let second = frame("of headache");
        let (head, tail) = second.split_at(17);
        let chunks = [first.as_str(), head, tail, "data: [DONE]\n\n"];
        let gateway = Arc::new(ScriptedGateway::chunks(&chunks));
        let relay = ChatRelay::new(store.clone(), gateway.clone());
        let user_id = Uuid::new_v4();

        let stream = relay.handle_turn(turn(Some(user_id))).await.unwrap();
        let deltas: Vec<String> = collect(stream)
            .await
            .into_iter()
            .map(Result::unwrap)
            .collect();

        assert_eq!(deltas, vec!["Two days ", "of headache"]);
        store.with(|t| {
            assert_eq!(t.chat_messages.len(), 2);
            assert_eq!(t.chat_messages[0].role, "user");
            assert_eq!(t.chat_messages[0].content, "Two days");
            assert_eq!(t.chat_messages[1].role, "assistant");
            assert_eq!(t.chat_messages[1].content, "Two days of headache");
            assert!(t.chat_messages.iter().all(|m| m.user_id == user_id));
        });
    }

    #[tokio::test]
    async fn test_gateway_receives_system_prompt_then_history() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::chunks(&["data: [DONE]\n"]));
        let relay = ChatRelay::new(store, gateway.clone());

        let stream = relay.handle_turn(turn(Some(Uuid::new_v4()))).await.unwrap();
        collect(stream).await;

        let calls = gateway.calls.lock().unwrap();
        let (messages, options) = &calls[0];
        assert!(options.stream);
        let roles: Vec<_> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "user"]);
        assert_eq!(messages[0].content, CHAT_SYSTEM);
        assert_eq!(messages[3].content, "Two days");
    }

    #[tokio::test]
    async fn test_rate_limit_keeps_user_message_only() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::failing(LlmError::RateLimited));
        let relay = ChatRelay::new(store.clone(), gateway);

        let result = relay.handle_turn(turn(Some(Uuid::new_v4()))).await;

        assert!(matches!(result, Err(AppError::RateLimited)));
        store.with(|t| {
            assert_eq!(t.chat_messages.len(), 1);
            assert_eq!(t.chat_messages[0].role, "user");
        });
    }

    #[tokio::test]
    async fn test_quota_exhausted_is_surfaced() {
        let store = Arc::new(MemoryStore::new());
        let gateway = Arc::new(ScriptedGateway::failing(LlmError::QuotaExhausted));
        let relay = ChatRelay::new(store, gateway);

        let result = relay.handle_turn(turn(Some(Uuid::new_v4()))).await;
        assert!(matches!(result, Err(AppError::QuotaExhausted)));
    }

    #[tokio::test]
    async fn test_reply_save_failure_still_delivers_deltas() {
        let store = Arc::new(MemoryStore::new().fail_chat_role(ChatRole::Assistant));
        let hello = frame("Hello");
        let gateway = Arc::new(ScriptedGateway::chunks(&[hello.as_str()]));
        let relay = ChatRelay::new(store.clone(), gateway);

        let stream = relay.handle_turn(turn(Some(Uuid::new_v4()))).await.unwrap();
        let deltas = collect(stream).await;

        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[0].as_deref().unwrap(), "Hello");
        store.with(|t| assert_eq!(t.chat_messages.len(), 1));
    }

    #[tokio::test]
    async fn test_mid_stream_failure_ends_turn_without_reply() {
        let store = Arc::new(MemoryStore::new());
        let partial = frame("Par");
        let gateway = Arc::new(ScriptedGateway::new(Script::Chunks(vec![
            Ok(Bytes::from(partial)),
            Err(LlmError::Gateway {
                status: 502,
                body: "connection reset".to_string(),
            }),
        ])));
        let relay = ChatRelay::new(store.clone(), gateway);

        let stream = relay.handle_turn(turn(Some(Uuid::new_v4()))).await.unwrap();
        let items = collect(stream).await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_deref().unwrap(), "Par");
        assert!(items[1].is_err());
        store.with(|t| {
            assert_eq!(t.chat_messages.len(), 1);
            assert_eq!(t.chat_messages[0].role, "user");
        });
    }

    #[tokio::test]
    async fn test_dropped_stream_saves_no_reply() {
        let store = Arc::new(MemoryStore::new());
        let a = frame("A");
        let b = frame("B");
        let gateway = Arc::new(ScriptedGateway::chunks(&[a.as_str(), b.as_str()]));
        let relay = ChatRelay::new(store.clone(), gateway);

        let mut stream = relay.handle_turn(turn(Some(Uuid::new_v4()))).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        drop(stream);

        assert_eq!(first, "A");
        store.with(|t| assert_eq!(t.chat_messages.len(), 1));
    }

    #[tokio::test]
    async fn test_user_message_save_failure_skips_gateway() {
        let store = Arc::new(MemoryStore::new().fail_chat_role(ChatRole::User));
        let gateway = Arc::new(ScriptedGateway::chunks(&[]));
        let relay = ChatRelay::new(store, gateway.clone());

        let result = relay.handle_turn(turn(Some(Uuid::new_v4()))).await;

        assert!(matches!(result, Err(AppError::Store(_))));
        assert_eq!(gateway.call_count(), 0);
    }
}
