//! WebSocket Event DTOs - Vocabolario eventi del gateway real-time
//!
//! Tagged union serializzata come `{ "event": "...", "data": { ... } }`.
//! La consegna è at-most-once e non ordinata tra TIPI di evento diversi:
//! i consumer non devono assumere che `conversation_updated` arrivi prima o
//! dopo `receive_message` per lo stesso invio.

use crate::dtos::{MessageDTO, OnlineStatusDTO};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Eventi in ingresso dal client.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    SendMessage(crate::dtos::SendMessageRequest),
    TypingStart {
        conversation_id: i64,
    },
    TypingStop {
        conversation_id: i64,
    },
    MarkRead {
        conversation_id: i64,
    },
    JoinConversation {
        conversation_id: i64,
    },
    LeaveConversation {
        conversation_id: i64,
    },
    GetOnlineStatus {
        user_ids: Vec<i64>,
    },
}

/// Eventi in uscita verso i client. Devono poter attraversare il broker di
/// fanout come JSON, quindi sono anche deserializzabili.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ReceiveMessage {
        message: MessageDTO,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
    },
    ConversationUpdated {
        conversation_id: i64,
        last_message: Option<String>,
        last_message_at: Option<DateTime<Utc>>,
        unread_count: i64,
    },
    MessageError {
        error: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        temp_id: Option<String>,
    },
    UserTyping {
        conversation_id: i64,
        user_id: i64,
        is_typing: bool,
    },
    MessagesRead {
        conversation_id: i64,
        read_by: i64,
        read_at: DateTime<Utc>,
        message_ids: Vec<i64>,
    },
    UnreadCount {
        conversation_id: i64,
        unread_count: i64,
    },
    UserOnline {
        user_id: i64,
    },
    UserOffline {
        user_id: i64,
        last_seen: DateTime<Utc>,
    },
    OnlineStatus {
        statuses: Vec<OnlineStatusDTO>,
    },
    Error {
        code: u16,
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_event_wire_format() {
        let json = r#"{"event":"typing_start","data":{"conversation_id":42}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::TypingStart { conversation_id } => assert_eq!(conversation_id, 42),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn server_event_uses_snake_case_tags() {
        let event = ServerEvent::UserOnline { user_id: 7 };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "user_online");
        assert_eq!(json["data"]["user_id"], 7);
    }

    #[test]
    fn server_event_roundtrips_through_json() {
        // Il fanout ripubblica gli eventi ricevuti dal broker: la
        // deserializzazione deve riprodurre esattamente l'evento.
        let event = ServerEvent::MessagesRead {
            conversation_id: 3,
            read_by: 2,
            read_at: Utc::now(),
            message_ids: vec![10, 11],
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: ServerEvent = serde_json::from_str(&json).unwrap();
        match back {
            ServerEvent::MessagesRead { message_ids, .. } => {
                assert_eq!(message_ids, vec![10, 11])
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn send_message_event_accepts_optional_fields() {
        let json = r#"{"event":"send_message","data":{"receiver_id":2,"content":"ciao","temp_id":"tmp-1"}}"#;
        let event: ClientEvent = serde_json::from_str(json).unwrap();
        match event {
            ClientEvent::SendMessage(req) => {
                assert_eq!(req.receiver_id, 2);
                assert_eq!(req.temp_id.as_deref(), Some("tmp-1"));
                assert!(req.conversation_id.is_none());
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
