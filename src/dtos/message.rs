//! Message DTOs - Data Transfer Objects per messaggi

use crate::entities::{Message, MessageStatus, MessageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Rappresentazione esterna di un messaggio.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MessageDTO {
    pub message_id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub message_type: MessageType,
    pub status: MessageStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<Message> for MessageDTO {
    fn from(value: Message) -> Self {
        Self {
            message_id: value.message_id,
            conversation_id: value.conversation_id,
            sender_id: value.sender_id,
            receiver_id: value.receiver_id,
            content: value.content,
            message_type: value.message_type,
            status: value.status,
            delivered_at: value.delivered_at,
            read_at: value.read_at,
            metadata: value.metadata,
            created_at: value.created_at,
        }
    }
}

/// Richiesta di invio, condivisa tra POST /chat/messages e l'evento
/// `send_message` del gateway (stesso comportamento da entrambi gli ingressi).
#[derive(Serialize, Deserialize, Debug, Clone, Validate)]
pub struct SendMessageRequest {
    pub conversation_id: Option<i64>,
    pub receiver_id: i64,

    #[validate(length(max = 5000, message = "Message content must be at most 5000 characters"))]
    pub content: Option<String>,

    pub message_type: Option<MessageType>,
    pub metadata: Option<serde_json::Value>,

    /// Id locale ottimistico del client, rimandato indietro per riconciliare.
    pub temp_id: Option<String>,
}

#[derive(Serialize, Debug, Clone)]
pub struct MarkReadResponse {
    pub conversation_id: i64,
    pub count: usize,
}

#[derive(Serialize, Debug, Clone)]
pub struct MessagePage {
    pub messages: Vec<MessageDTO>,
    pub page: i64,
    pub limit: i64,
    pub has_more: bool,
}
