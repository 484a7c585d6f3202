//! WebSocket Connection Management - Gestione connessioni del gateway
//!
//! Ogni connessione vive in due task: `listen_ws` consuma i frame del
//! client (con timeout di inattività e rate limiting), `write_ws` scrive
//! gli eventi accodati sul gruppo per-utente e fa da heartbeat di presenza.
//! La cleanup avviene nel task di ascolto, qualunque sia la causa della
//! disconnessione.

use crate::core::{AppState, auth::verify_token};
use crate::dtos::ServerEvent;
use crate::ws::{RATE_LIMITER_MILLIS, TIMEOUT_DURATION_SECONDS, event_handlers::process_event};
use axum::extract::ws::{Message, Utf8Bytes, WebSocket};
use chrono::Utc;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::{Duration, interval, timeout};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[instrument(skip(ws, state, token))]
pub async fn handle_socket(ws: WebSocket, state: Arc<AppState>, token: Option<String>) {
    // Handshake di autenticazione dentro il socket: su fallimento il client
    // riceve un evento `error` e la connessione viene chiusa pulita.
    let user = match token {
        Some(token) => verify_token(&state, &token).await,
        None => {
            warn!("WebSocket connection without token");
            reject(ws, "Missing authentication token").await;
            return;
        }
    };
    let user = match user {
        Ok(user) => user,
        Err(e) => {
            warn!("WebSocket authentication failed");
            reject(ws, e.message()).await;
            return;
        }
    };
    let user_id = user.user_id;
    info!(user_id, "WebSocket connection established");

    let (ws_tx, ws_rx) = ws.split();
    let (int_tx, int_rx) = unbounded_channel::<ServerEvent>();

    state.users_online.register(user_id, int_tx.clone());

    let connection_handle = Uuid::new_v4().to_string();
    if let Err(e) = state.presence.set_online(user_id, &connection_handle).await {
        warn!(user_id, "Failed to record presence: {:?}", e);
    }

    // Passaggio globale: tutto il backlog SENT indirizzato all'utente
    // diventa DELIVERED ora che c'è una connessione a riceverlo.
    if let Err(e) = state.messaging.mark_user_messages_delivered(user_id).await {
        warn!(user_id, "Delivered pass failed: {:?}", e);
    }

    if let Err(e) = state
        .fanout
        .broadcast(&ServerEvent::UserOnline { user_id })
        .await
    {
        warn!(user_id, "Failed to broadcast online transition: {:?}", e);
    }

    tokio::spawn(write_ws(user_id, ws_tx, int_rx, state.clone()));
    tokio::spawn(listen_ws(user_id, ws_rx, int_tx, state));
}

async fn reject(mut ws: WebSocket, message: &str) {
    let event = ServerEvent::Error {
        code: 401,
        message: message.to_string(),
    };
    if let Ok(json) = serde_json::to_string(&event) {
        let _ = ws.send(Message::Text(Utf8Bytes::from(json))).await;
    }
    let _ = ws.close().await;
}

/// Task di scrittura: serializza gli eventi accodati e fa heartbeat sul
/// registro di presenza a metà TTL.
#[instrument(skip(websocket_tx, internal_rx, state), fields(user_id = %user_id))]
pub async fn write_ws(
    user_id: i64,
    mut websocket_tx: SplitSink<WebSocket, Message>,
    mut internal_rx: UnboundedReceiver<ServerEvent>,
    state: Arc<AppState>,
) {
    info!("Write task started");

    let mut heartbeat = interval(state.presence_ttl / 2);
    heartbeat.tick().await; // primo tick immediato

    loop {
        tokio::select! {
            event = internal_rx.recv() => {
                match event {
                    Some(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!("Failed to serialize event: {:?}", e);
                                continue;
                            }
                        };
                        if let Err(e) = websocket_tx.send(Message::Text(Utf8Bytes::from(json))).await {
                            warn!("Failed to send event, closing write task: {:?}", e);
                            break;
                        }
                    }
                    None => {
                        debug!("Internal channel closed");
                        break;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if let Err(e) = state.presence.refresh(user_id).await {
                    warn!("Presence heartbeat failed: {:?}", e);
                }
            }
        }
    }

    info!("Write task terminated");
}

/// Task di ascolto: timeout di inattività, rate limiting e dispatch degli
/// eventi client. Alla fine esegue la cleanup della connessione.
#[instrument(skip(websocket_rx, internal_tx, state), fields(user_id = %user_id))]
pub async fn listen_ws(
    user_id: i64,
    mut websocket_rx: SplitStream<WebSocket>,
    internal_tx: UnboundedSender<ServerEvent>,
    state: Arc<AppState>,
) {
    info!("Listen task started");

    let mut rate_limiter = interval(Duration::from_millis(RATE_LIMITER_MILLIS));
    let timeout_duration = Duration::from_secs(TIMEOUT_DURATION_SECONDS);

    loop {
        match timeout(timeout_duration, websocket_rx.next()).await {
            Ok(Some(msg_result)) => {
                rate_limiter.tick().await;

                let msg = match msg_result {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("WebSocket error: {:?}", e);
                        break;
                    }
                };

                match msg {
                    Message::Text(text) => match serde_json::from_str(&text) {
                        Ok(event) => {
                            process_event(&state, user_id, event, &internal_tx).await;
                        }
                        Err(e) => {
                            debug!("Unrecognized client event: {:?}", e);
                            let _ = internal_tx.send(ServerEvent::Error {
                                code: 400,
                                message: String::from("Unrecognized event"),
                            });
                        }
                    },
                    Message::Close(_) => {
                        info!("Close message received");
                        break;
                    }
                    _ => {}
                }
            }
            Ok(None) => {
                info!("WebSocket stream ended");
                break;
            }
            Err(_) => {
                warn!(
                    timeout_secs = TIMEOUT_DURATION_SECONDS,
                    "Connection idle timeout"
                );
                break;
            }
        }
    }

    cleanup(&state, user_id, &internal_tx).await;
    info!("Listen task terminated");
}

/// Smonta la connessione: gruppo per-utente, stanze, presenza, broadcast
/// della transizione offline.
async fn cleanup(state: &AppState, user_id: i64, internal_tx: &UnboundedSender<ServerEvent>) {
    info!(user_id, "Cleaning up connection");
    state.users_online.unregister(user_id, internal_tx);
    state.rooms.leave_all(user_id);

    if let Err(e) = state.presence.set_offline(user_id).await {
        warn!(user_id, "Failed to clear presence: {:?}", e);
    }

    let event = ServerEvent::UserOffline {
        user_id,
        last_seen: Utc::now(),
    };
    if let Err(e) = state.fanout.broadcast(&event).await {
        warn!(user_id, "Failed to broadcast offline transition: {:?}", e);
    }
}
