pub mod health;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::chat::handlers as chat;
use crate::diagnosis::handlers as diagnosis;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Chat relay
        .route("/api/v1/chat", post(chat::handle_chat))
        .route("/api/v1/chat/history", get(chat::handle_chat_history))
        // Consultations + diagnosis relay
        .route(
            "/api/v1/consultations",
            post(diagnosis::handle_create_consultation).get(diagnosis::handle_list_consultations),
        )
        .route("/api/v1/diagnosis", post(diagnosis::handle_diagnosis))
        .route("/api/v1/feedback", post(diagnosis::handle_submit_feedback))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        // Informational endpoints; any origin may call them.
        .layer(CorsLayer::permissive())
}
