//! Messaging service - Orchestratore unico del dominio conversazioni
//!
//! Entrambi gli ingressi (REST e gateway real-time) passano da qui: la
//! semantica di invio, lettura e paginazione è identica qualunque sia la
//! porta d'ingresso. Le emissioni real-time sono best-effort: un fallimento
//! del fanout non fa mai fallire l'operazione durevole.

use crate::core::AppError;
use crate::dtos::{
    ConversationPage, ConversationSummaryDTO, MessageDTO, MessagePage, PeerDTO, SendMessageRequest,
    ServerEvent,
};
use crate::entities::{Conversation, Message, MessageType, UserAccount};
use crate::fanout::Fanout;
use crate::registry::PresenceStore;
use crate::repositories::{ConversationStore, MessageStore, NewMessage, UserDirectory};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use validator::Validate;

/// Lunghezza massima del riassunto denormalizzato `last_message`.
const PREVIEW_CHARS: usize = 100;

#[derive(Clone)]
pub struct MessagingService {
    conversations: Arc<dyn ConversationStore>,
    messages: Arc<dyn MessageStore>,
    users: Arc<dyn UserDirectory>,
    presence: Arc<dyn PresenceStore>,
    fanout: Arc<dyn Fanout>,
}

/// Esito di un invio: il messaggio persistito e la conversazione aggiornata.
#[derive(Debug)]
pub struct SentMessage {
    pub message: MessageDTO,
    pub conversation: Conversation,
}

/// Esito della marcatura di lettura.
#[derive(Debug)]
pub struct ReadReceipt {
    pub conversation_id: i64,
    pub message_ids: Vec<i64>,
    pub read_at: DateTime<Utc>,
}

impl MessagingService {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        messages: Arc<dyn MessageStore>,
        users: Arc<dyn UserDirectory>,
        presence: Arc<dyn PresenceStore>,
        fanout: Arc<dyn Fanout>,
    ) -> Self {
        Self {
            conversations,
            messages,
            users,
            presence,
            fanout,
        }
    }

    /// Trova o crea la conversazione tra il chiamante e `other_user_id`.
    /// Chiamate concorrenti per la stessa coppia convergono sulla stessa riga.
    #[instrument(skip(self), fields(caller_id = %caller_id, other_user_id = %other_user_id))]
    pub async fn get_or_create_conversation(
        &self,
        caller_id: i64,
        other_user_id: i64,
    ) -> Result<Conversation, AppError> {
        if other_user_id == caller_id {
            return Err(AppError::bad_request(
                "You cannot open a conversation with yourself",
            ));
        }
        self.require_usable_user(other_user_id).await?;
        let conversation = self
            .conversations
            .get_or_create_pair(caller_id, other_user_id)
            .await?;
        debug!(
            conversation_id = conversation.conversation_id,
            "Conversation resolved"
        );
        Ok(conversation)
    }

    /// Carica la conversazione e verifica che il chiamante ne sia partecipante.
    #[instrument(skip(self), fields(caller_id = %caller_id, conversation_id = %conversation_id))]
    pub async fn get_conversation(
        &self,
        caller_id: i64,
        conversation_id: i64,
    ) -> Result<Conversation, AppError> {
        let conversation = self
            .conversations
            .find_by_id(conversation_id, false)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation not found"))?;
        if !conversation.is_participant(caller_id) {
            warn!("Access to a conversation of other users denied");
            return Err(AppError::forbidden(
                "You are not a participant of this conversation",
            ));
        }
        Ok(conversation)
    }

    /// Riassunto di una singola conversazione, annotato come le voci di lista.
    #[instrument(skip(self), fields(caller_id = %caller_id, conversation_id = %conversation_id))]
    pub async fn conversation_summary(
        &self,
        caller_id: i64,
        conversation_id: i64,
    ) -> Result<ConversationSummaryDTO, AppError> {
        let conversation = self.get_conversation(caller_id, conversation_id).await?;
        let peer_id = conversation.other_participant(caller_id).unwrap_or(0);
        let peer = match self.users.find_by_id(peer_id).await? {
            Some(account) => {
                let is_online = self.presence.is_online(peer_id).await?;
                PeerDTO::from_account(&account, is_online)
            }
            None => PeerDTO::unknown(peer_id),
        };
        Ok(ConversationSummaryDTO::annotate(
            &conversation,
            caller_id,
            peer,
        ))
    }

    /// Lista conversazioni del chiamante, più recenti prima, annotata con il
    /// riassunto dell'altro partecipante e il suo stato online.
    #[instrument(skip(self), fields(caller_id = %caller_id, page = %page, limit = %limit))]
    pub async fn list_conversations(
        &self,
        caller_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<ConversationPage, AppError> {
        let offset = page.saturating_sub(1).saturating_mul(limit);
        let mut rows = self
            .conversations
            .list_for_user(caller_id, offset, limit + 1, false)
            .await?;
        let has_more = rows.len() as i64 > limit;
        rows.truncate(limit as usize);

        let peer_ids: Vec<i64> = rows
            .iter()
            .filter_map(|c| c.other_participant(caller_id))
            .collect();
        let accounts: HashMap<i64, UserAccount> = self
            .users
            .find_summaries(&peer_ids)
            .await?
            .into_iter()
            .map(|u| (u.user_id, u))
            .collect();
        let online = self.presence.get_many(&peer_ids).await?;

        let conversations = rows
            .iter()
            .map(|conversation| {
                let peer_id = conversation.other_participant(caller_id).unwrap_or(0);
                let peer = match accounts.get(&peer_id) {
                    Some(account) => PeerDTO::from_account(
                        account,
                        online.get(&peer_id).copied().unwrap_or(false),
                    ),
                    None => PeerDTO::unknown(peer_id),
                };
                ConversationSummaryDTO::annotate(conversation, caller_id, peer)
            })
            .collect();

        let total_unread = self.conversations.total_unread(caller_id).await?;
        Ok(ConversationPage {
            conversations,
            total_unread,
            page,
            limit,
            has_more,
        })
    }

    /// Pagina di messaggi in ordine cronologico. La pagina 1 contiene i
    /// messaggi più recenti; lo store li serve più recenti prima e qui
    /// vengono rovesciati per la lettura.
    #[instrument(skip(self), fields(caller_id = %caller_id, conversation_id = %conversation_id))]
    pub async fn list_messages(
        &self,
        caller_id: i64,
        conversation_id: i64,
        page: i64,
        limit: i64,
    ) -> Result<MessagePage, AppError> {
        self.get_conversation(caller_id, conversation_id).await?;

        let offset = page.saturating_sub(1).saturating_mul(limit);
        let mut rows = self
            .messages
            .list_paginated(conversation_id, offset, limit + 1, false)
            .await?;
        let has_more = rows.len() as i64 > limit;
        rows.truncate(limit as usize);
        rows.reverse();

        Ok(MessagePage {
            messages: rows.into_iter().map(MessageDTO::from).collect(),
            page,
            limit,
            has_more,
        })
    }

    /// Invio di un messaggio: persiste, aggiorna il riassunto della
    /// conversazione e poi emette gli eventi real-time. Usato sia da
    /// POST /chat/messages sia dall'evento `send_message` del gateway.
    #[instrument(skip(self, request), fields(sender_id = %sender_id, receiver_id = %request.receiver_id))]
    pub async fn send_message(
        &self,
        sender_id: i64,
        request: SendMessageRequest,
    ) -> Result<SentMessage, AppError> {
        request.validate()?;

        if request.receiver_id == sender_id {
            return Err(AppError::bad_request("You cannot message yourself"));
        }

        let message_type = request.message_type.unwrap_or_default();
        let content = request.content.unwrap_or_default();
        if message_type == MessageType::Text && content.trim().is_empty() {
            return Err(AppError::bad_request("Message content cannot be empty"));
        }

        self.require_usable_user(request.receiver_id).await?;

        let conversation = match request.conversation_id {
            Some(conversation_id) => {
                let conversation = self.get_conversation(sender_id, conversation_id).await?;
                if conversation.other_participant(sender_id) != Some(request.receiver_id) {
                    return Err(AppError::bad_request(
                        "Receiver is not a participant of this conversation",
                    ));
                }
                conversation
            }
            None => {
                self.conversations
                    .get_or_create_pair(sender_id, request.receiver_id)
                    .await?
            }
        };

        let message = self
            .messages
            .insert(&NewMessage {
                conversation_id: conversation.conversation_id,
                sender_id,
                receiver_id: request.receiver_id,
                content,
                message_type,
                metadata: request.metadata,
            })
            .await?;

        self.conversations
            .record_message(
                conversation.conversation_id,
                sender_id,
                request.receiver_id,
                &preview(&message.content),
                message.created_at,
            )
            .await?;

        // Rilettura per i contatori aggiornati dal record atomico.
        let conversation = self
            .conversations
            .find_by_id(conversation.conversation_id, false)
            .await?
            .ok_or_else(|| AppError::not_found("Conversation not found"))?;

        info!(
            message_id = message.message_id,
            conversation_id = conversation.conversation_id,
            "Message persisted"
        );

        self.emit_message_events(&message, &conversation, sender_id, request.temp_id.clone())
            .await;

        Ok(SentMessage {
            message: MessageDTO::from(message),
            conversation,
        })
    }

    /// Porta a READ i messaggi ricevuti dal chiamante nella conversazione e
    /// azzera il suo contatore. Idempotente: una seconda chiamata non tocca
    /// nulla e non emette ricevute.
    #[instrument(skip(self), fields(reader_id = %reader_id, conversation_id = %conversation_id))]
    pub async fn mark_conversation_read(
        &self,
        reader_id: i64,
        conversation_id: i64,
    ) -> Result<ReadReceipt, AppError> {
        let conversation = self.get_conversation(reader_id, conversation_id).await?;

        let read_at = Utc::now();
        let message_ids = self
            .messages
            .mark_conversation_read(conversation_id, reader_id, read_at)
            .await?;
        self.conversations
            .reset_unread(conversation_id, reader_id)
            .await?;

        // Eventi solo se qualcosa è effettivamente cambiato: una rilettura
        // idempotente non genera traffico real-time.
        if !message_ids.is_empty() {
            if let Some(other) = conversation.other_participant(reader_id) {
                self.emit_to_user(
                    other,
                    &ServerEvent::MessagesRead {
                        conversation_id,
                        read_by: reader_id,
                        read_at,
                        message_ids: message_ids.clone(),
                    },
                )
                .await;
            }
            self.emit_to_user(
                reader_id,
                &ServerEvent::UnreadCount {
                    conversation_id,
                    unread_count: 0,
                },
            )
            .await;
        }

        Ok(ReadReceipt {
            conversation_id,
            message_ids,
            read_at,
        })
    }

    /// Passaggio globale alla connessione: ogni messaggio SENT indirizzato
    /// all'utente diventa DELIVERED, su tutte le conversazioni.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn mark_user_messages_delivered(&self, user_id: i64) -> Result<u64, AppError> {
        let updated = self
            .messages
            .mark_delivered_for_receiver(user_id, Utc::now())
            .await?;
        if updated > 0 {
            info!(updated, "Pending messages marked as delivered");
        }
        Ok(updated)
    }

    /// Soft-delete di un proprio messaggio.
    #[instrument(skip(self), fields(caller_id = %caller_id, message_id = %message_id))]
    pub async fn delete_message(&self, caller_id: i64, message_id: i64) -> Result<(), AppError> {
        if self.messages.soft_delete(message_id, caller_id).await? {
            return Ok(());
        }
        match self.messages.find_by_id(message_id, false).await? {
            Some(_) => Err(AppError::forbidden(
                "You can only delete your own messages",
            )),
            None => Err(AppError::not_found("Message not found")),
        }
    }

    pub async fn total_unread(&self, user_id: i64) -> Result<i64, AppError> {
        self.conversations.total_unread(user_id).await
    }

    async fn require_usable_user(&self, user_id: i64) -> Result<UserAccount, AppError> {
        let user = self
            .users
            .find_by_id(user_id)
            .await?
            .filter(UserAccount::is_usable)
            .ok_or_else(|| AppError::not_found("User not found"))?;
        Ok(user)
    }

    /// Eventi post-invio: copia del messaggio al ricevente, eco al mittente
    /// con il suo `temp_id`, riassunto aggiornato a entrambi i lati (il lato
    /// mittente vede sempre 0 non-letti per il proprio invio).
    async fn emit_message_events(
        &self,
        message: &Message,
        conversation: &Conversation,
        sender_id: i64,
        temp_id: Option<String>,
    ) {
        let dto = MessageDTO::from(message.clone());
        self.emit_to_user(
            message.receiver_id,
            &ServerEvent::ReceiveMessage {
                message: dto.clone(),
                temp_id: None,
            },
        )
        .await;
        self.emit_to_user(
            sender_id,
            &ServerEvent::ReceiveMessage {
                message: dto,
                temp_id,
            },
        )
        .await;

        self.emit_to_user(
            message.receiver_id,
            &ServerEvent::ConversationUpdated {
                conversation_id: conversation.conversation_id,
                last_message: conversation.last_message.clone(),
                last_message_at: conversation.last_message_at,
                unread_count: conversation.unread_for(message.receiver_id),
            },
        )
        .await;
        self.emit_to_user(
            sender_id,
            &ServerEvent::ConversationUpdated {
                conversation_id: conversation.conversation_id,
                last_message: conversation.last_message.clone(),
                last_message_at: conversation.last_message_at,
                unread_count: 0,
            },
        )
        .await;
    }

    async fn emit_to_user(&self, user_id: i64, event: &ServerEvent) {
        if let Err(e) = self.fanout.to_user(user_id, event).await {
            warn!(user_id, "Realtime emission failed: {:?}", e);
        }
    }
}

/// Riassunto troncato per il campo denormalizzato della conversazione.
fn preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_CHARS {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", truncated)
    }
}
