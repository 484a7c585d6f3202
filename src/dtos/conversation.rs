//! Conversation DTOs - Data Transfer Objects per conversazioni

use crate::entities::{Conversation, UserAccount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Riassunto dell'altro partecipante, con stato online best-effort
/// (annotazione dal registro presenze, non un campo critico).
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PeerDTO {
    pub user_id: i64,
    pub username: String,
    pub display_name: Option<String>,
    pub is_online: bool,
}

impl PeerDTO {
    pub fn from_account(account: &UserAccount, is_online: bool) -> Self {
        Self {
            user_id: account.user_id,
            username: account.username.clone(),
            display_name: account.display_name.clone(),
            is_online,
        }
    }

    /// Il collaboratore identità può non conoscere più l'utente (cancellato):
    /// il thread resta leggibile con un segnaposto.
    pub fn unknown(user_id: i64) -> Self {
        Self {
            user_id,
            username: String::from("unknown"),
            display_name: None,
            is_online: false,
        }
    }
}

/// Voce della lista conversazioni, annotata dal punto di vista del chiamante.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ConversationSummaryDTO {
    pub conversation_id: i64,
    pub peer: PeerDTO,
    pub last_message: Option<String>,
    pub last_message_sender_id: Option<i64>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: i64,
    pub created_at: DateTime<Utc>,
}

impl ConversationSummaryDTO {
    pub fn annotate(conversation: &Conversation, viewer_id: i64, peer: PeerDTO) -> Self {
        Self {
            conversation_id: conversation.conversation_id,
            peer,
            last_message: conversation.last_message.clone(),
            last_message_sender_id: conversation.last_message_sender_id,
            last_message_at: conversation.last_message_at,
            unread_count: conversation.unread_for(viewer_id),
            created_at: conversation.created_at,
        }
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct ConversationPage {
    pub conversations: Vec<ConversationSummaryDTO>,
    pub total_unread: i64,
    pub page: i64,
    pub limit: i64,
    pub has_more: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct UnreadTotal {
    pub total_unread: i64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct OnlineStatusDTO {
    pub user_id: i64,
    pub is_online: bool,
}
