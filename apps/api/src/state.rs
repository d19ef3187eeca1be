use std::sync::Arc;

use crate::chat::relay::ChatRelay;
use crate::diagnosis::relay::DiagnosisRelay;
use crate::llm_client::CompletionGateway;
use crate::store::RelayStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Persistence seam. Production: `PgStore`.
    pub store: Arc<dyn RelayStore>,
    /// Gateway seam. Production: `LlmClient`, configured once at startup.
    pub gateway: Arc<dyn CompletionGateway>,
}

impl AppState {
    pub fn new(store: Arc<dyn RelayStore>, gateway: Arc<dyn CompletionGateway>) -> Self {
        Self { store, gateway }
    }

    pub fn chat_relay(&self) -> ChatRelay {
        ChatRelay::new(self.store.clone(), self.gateway.clone())
    }

    pub fn diagnosis_relay(&self) -> DiagnosisRelay {
        DiagnosisRelay::new(self.store.clone(), self.gateway.clone())
    }
}
