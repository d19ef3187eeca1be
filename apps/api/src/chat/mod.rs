// Streaming chat relay and its client-side consumer.
// All LLM calls go through llm_client.

pub mod consumer;
pub mod handlers;
pub mod prompts;
pub mod relay;
