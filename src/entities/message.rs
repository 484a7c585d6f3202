use super::{MessageStatus, MessageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unità di comunicazione: contenuto immutabile, stato di consegna mutabile.
///
/// `created_at` è assegnato dallo store al momento della scrittura ed è la
/// chiave di ordinamento all'interno della conversazione.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Message {
    pub message_id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub message_type: MessageType,
    pub status: MessageStatus,
    pub delivered_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub metadata: Option<serde_json::Value>,
    pub is_deleted: bool,
    pub created_at: DateTime<Utc>,
}
