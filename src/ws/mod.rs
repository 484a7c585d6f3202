//! WebSocket Module - Gateway real-time
//!
//! Gestisce l'upgrade HTTP -> WebSocket, l'handshake di autenticazione
//! dentro il socket, le due metà della connessione (listen/write) e il
//! dispatch degli eventi client. La consegna passa sempre dai gruppi
//! per-utente (`UserMap`); le stanze di conversazione (`RoomMap`) servono
//! solo agli eventi di stanza.

pub mod connection;
pub mod event_handlers;
pub mod roommap;
pub mod usermap;

pub use connection::handle_socket;
pub use roommap::RoomMap;
pub use usermap::UserMap;

use crate::core::AppState;
use axum::{
    extract::{Query, State, ws::WebSocketUpgrade},
    http,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;

/// Chiusura della connessione dopo questo periodo senza frame dal client.
pub const TIMEOUT_DURATION_SECONDS: u64 = 300;
/// Intervallo minimo tra eventi client consecutivi.
pub const RATE_LIMITER_MILLIS: u64 = 50;

#[derive(Deserialize)]
pub struct WsQuery {
    token: Option<String>,
}

/// Entry point per l'upgrade WebSocket. La rotta NON sta dietro il
/// middleware di autenticazione: il token viaggia nell'header
/// Authorization o nella query string e viene verificato dentro il socket,
/// così il client riceve un evento `error` leggibile invece di un 401 nudo
/// sull'handshake.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<WsQuery>,
    headers: http::HeaderMap,
) -> Response {
    let token = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| {
            h.strip_prefix("Bearer ")
                .or_else(|| h.strip_prefix("bearer "))
        })
        .map(str::to_string)
        .or(query.token);

    ws.on_upgrade(move |socket| handle_socket(socket, state, token))
}
