//! Server library - espone i moduli principali per i test

pub mod core;
pub mod dtos;
pub mod entities;
pub mod fanout;
pub mod monitoring;
pub mod registry;
pub mod repositories;
pub mod services;
pub mod storage;
pub mod ws;

// Re-export dei tipi principali per facilitare l'import
pub use crate::core::{AppError, AppState, Config, auth};

use axum::{
    Router, middleware,
    routing::{any, delete, get, patch, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Health check per load balancer e probe.
async fn health() -> &'static str {
    "OK"
}

/// Crea il router principale dell'applicazione
pub fn create_router(state: Arc<AppState>) -> Router {
    use ws::ws_handler;

    Router::new()
        .route("/", get(health))
        .nest("/chat", configure_chat_routes(state.clone()))
        // La rotta ws NON passa dal middleware: l'autenticazione avviene
        // dentro il socket, così il client riceve un evento `error` leggibile.
        .route("/ws", any(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Configura le routes del dominio conversazioni, tutte autenticate.
fn configure_chat_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    use crate::core::auth::authentication_middleware;
    use crate::services::{chat, status, upload};

    Router::new()
        .route("/conversations", get(chat::get_conversations))
        .route("/conversations/{conversation_id}", get(chat::get_conversation))
        .route(
            "/conversations/user/{user_id}",
            post(chat::get_or_create_conversation),
        )
        .route(
            "/conversations/{conversation_id}/messages",
            get(chat::get_messages),
        )
        .route(
            "/conversations/{conversation_id}/read",
            patch(chat::mark_conversation_read),
        )
        .route("/messages", post(chat::send_message))
        .route("/messages/{message_id}", delete(chat::delete_message))
        .route("/online-status/bulk", post(status::get_online_status_bulk))
        .route("/online-status/{user_id}", get(status::get_online_status))
        .route("/unread-count", get(status::get_unread_count))
        .route("/upload", post(upload::upload_attachment))
        .layer(middleware::from_fn_with_state(
            state,
            authentication_middleware,
        ))
}
