//! WebSocket Event Handlers - Dispatch degli eventi client
//!
//! Ogni evento passa dallo stesso orchestratore usato dall'API HTTP: il
//! gateway aggiunge solo la traduzione errore -> evento. Un errore non
//! disconnette mai il socket.

use crate::core::{AppError, AppState};
use crate::dtos::{ClientEvent, OnlineStatusDTO, ServerEvent};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, instrument, warn};

#[instrument(skip(state, event, caller_tx), fields(user_id = %user_id))]
pub async fn process_event(
    state: &AppState,
    user_id: i64,
    event: ClientEvent,
    caller_tx: &UnboundedSender<ServerEvent>,
) {
    match event {
        ClientEvent::SendMessage(request) => {
            let temp_id = request.temp_id.clone();
            if let Err(e) = state.messaging.send_message(user_id, request).await {
                debug!("send_message rejected: {:?}", e);
                let _ = caller_tx.send(ServerEvent::MessageError {
                    error: e.message().to_string(),
                    temp_id,
                });
            }
            // Su successo l'orchestratore ha già emesso `receive_message`
            // (eco con temp_id compresa) e `conversation_updated`.
        }

        ClientEvent::TypingStart { conversation_id } => {
            relay_typing(state, user_id, conversation_id, true, caller_tx).await;
        }

        ClientEvent::TypingStop { conversation_id } => {
            relay_typing(state, user_id, conversation_id, false, caller_tx).await;
        }

        ClientEvent::MarkRead { conversation_id } => {
            if let Err(e) = state
                .messaging
                .mark_conversation_read(user_id, conversation_id)
                .await
            {
                send_error(caller_tx, &e);
            }
        }

        ClientEvent::JoinConversation { conversation_id } => {
            // Solo i partecipanti possono entrare nella stanza.
            match state.messaging.get_conversation(user_id, conversation_id).await {
                Ok(_) => state.rooms.join(conversation_id, user_id),
                Err(e) => send_error(caller_tx, &e),
            }
        }

        ClientEvent::LeaveConversation { conversation_id } => {
            state.rooms.leave(conversation_id, user_id);
        }

        ClientEvent::GetOnlineStatus { user_ids } => {
            match state.presence.get_many(&user_ids).await {
                Ok(online) => {
                    let statuses = user_ids
                        .iter()
                        .map(|&id| OnlineStatusDTO {
                            user_id: id,
                            is_online: online.get(&id).copied().unwrap_or(false),
                        })
                        .collect();
                    let _ = caller_tx.send(ServerEvent::OnlineStatus { statuses });
                }
                Err(e) => send_error(caller_tx, &e),
            }
        }
    }
}

/// Aggiorna il registro typing e inoltra `user_typing` all'altro
/// partecipante. Il flag è effimero: nessuna persistenza, nessuna history.
async fn relay_typing(
    state: &AppState,
    user_id: i64,
    conversation_id: i64,
    is_typing: bool,
    caller_tx: &UnboundedSender<ServerEvent>,
) {
    let conversation = match state.messaging.get_conversation(user_id, conversation_id).await {
        Ok(conversation) => conversation,
        Err(e) => {
            send_error(caller_tx, &e);
            return;
        }
    };

    if let Err(e) = state
        .typing
        .set_typing(conversation_id, user_id, is_typing)
        .await
    {
        warn!("Failed to update typing registry: {:?}", e);
    }

    if let Some(other) = conversation.other_participant(user_id) {
        let event = ServerEvent::UserTyping {
            conversation_id,
            user_id,
            is_typing,
        };
        if let Err(e) = state.fanout.to_user(other, &event).await {
            warn!("Failed to relay typing event: {:?}", e);
        }
    }
}

fn send_error(caller_tx: &UnboundedSender<ServerEvent>, error: &AppError) {
    let _ = caller_tx.send(ServerEvent::Error {
        code: error.status().as_u16(),
        message: error.message().to_string(),
    });
}
