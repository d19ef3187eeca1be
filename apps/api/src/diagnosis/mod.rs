// Structured diagnosis relay.
// One JSON-mode gateway call per request; results persist row by row.
// All LLM calls go through llm_client.

pub mod handlers;
pub mod prompts;
pub mod relay;
pub mod schema;
