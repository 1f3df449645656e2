use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::auth::{self, AppState};
use crate::middleware::require_auth;
use crate::{conversations, history, messages};

/// All routes, without CORS or tracing layers (the binary adds those).
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/chat/send", post(messages::send_message))
        .route("/chat", post(messages::send_message))
        .route("/chat/history", get(history::history))
        .route("/chat/{conversation_id}/messages", get(messages::get_messages))
        .route("/conversations", get(conversations::list_conversations))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
