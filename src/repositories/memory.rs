//! MemoryBackend - Store in memoria con lo stesso contratto di atomicità
//!
//! Backend alternativo a MySQL per deploy single-process e per la suite di
//! test: ogni mutazione composta avviene sotto un unico lock, quindi le
//! garanzie (incremento atomico dei non-letti, find-or-create senza
//! duplicati, transizioni di stato solo in avanti) sono le stesse.

use super::traits::{ConversationStore, MessageStore, NewMessage, UserDirectory};
use crate::core::AppError;
use crate::entities::{Conversation, Message, MessageStatus, UserAccount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct Inner {
    next_user_id: i64,
    next_conversation_id: i64,
    next_message_id: i64,
    users: HashMap<i64, UserAccount>,
    conversations: HashMap<i64, Conversation>,
    messages: HashMap<i64, Message>,
}

#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registra un utente attivo (seed per test e deploy single-process).
    pub fn add_user(&self, username: &str) -> UserAccount {
        self.add_user_with(username, true, false)
    }

    pub fn add_user_with(&self, username: &str, is_active: bool, is_deleted: bool) -> UserAccount {
        let mut inner = self.lock();
        inner.next_user_id += 1;
        let user = UserAccount {
            user_id: inner.next_user_id,
            username: username.to_string(),
            display_name: None,
            is_active,
            is_deleted,
        };
        inner.users.insert(user.user_id, user.clone());
        user
    }
}

#[async_trait]
impl ConversationStore for MemoryBackend {
    async fn find_pair(
        &self,
        a: i64,
        b: i64,
        include_deleted: bool,
    ) -> Result<Option<Conversation>, AppError> {
        let (low, high) = Conversation::normalize_pair(a, b);
        let inner = self.lock();
        Ok(inner
            .conversations
            .values()
            .find(|c| {
                c.user_low_id == low
                    && c.user_high_id == high
                    && (include_deleted || !c.is_deleted)
            })
            .cloned())
    }

    async fn get_or_create_pair(&self, a: i64, b: i64) -> Result<Conversation, AppError> {
        let (low, high) = Conversation::normalize_pair(a, b);
        let mut inner = self.lock();

        if let Some(id) = inner
            .conversations
            .values()
            .find(|c| c.user_low_id == low && c.user_high_id == high)
            .map(|c| c.conversation_id)
        {
            let conversation = inner
                .conversations
                .get_mut(&id)
                .ok_or_else(|| AppError::not_found("Conversation not found"))?;
            conversation.is_deleted = false;
            return Ok(conversation.clone());
        }

        inner.next_conversation_id += 1;
        let conversation = Conversation {
            conversation_id: inner.next_conversation_id,
            user_low_id: low,
            user_high_id: high,
            last_message: None,
            last_message_sender_id: None,
            last_message_at: None,
            unread_low: 0,
            unread_high: 0,
            is_deleted: false,
            created_at: Utc::now(),
        };
        inner
            .conversations
            .insert(conversation.conversation_id, conversation.clone());
        Ok(conversation)
    }

    async fn find_by_id(
        &self,
        conversation_id: i64,
        include_deleted: bool,
    ) -> Result<Option<Conversation>, AppError> {
        let inner = self.lock();
        Ok(inner
            .conversations
            .get(&conversation_id)
            .filter(|c| include_deleted || !c.is_deleted)
            .cloned())
    }

    async fn list_for_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
        include_deleted: bool,
    ) -> Result<Vec<Conversation>, AppError> {
        let inner = self.lock();
        let mut list: Vec<Conversation> = inner
            .conversations
            .values()
            .filter(|c| c.is_participant(user_id) && (include_deleted || !c.is_deleted))
            .cloned()
            .collect();
        // Più recenti prima; id come spareggio per ordinamento stabile.
        list.sort_by_key(|c| {
            let at = c.last_message_at.unwrap_or(c.created_at);
            (std::cmp::Reverse(at), std::cmp::Reverse(c.conversation_id))
        });
        Ok(list
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn record_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        receiver_id: i64,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut inner = self.lock();
        let conversation = inner
            .conversations
            .get_mut(&conversation_id)
            .ok_or_else(|| AppError::not_found("Conversation not found"))?;
        conversation.last_message = Some(preview.to_string());
        conversation.last_message_sender_id = Some(sender_id);
        conversation.last_message_at = Some(at);
        if conversation.user_low_id == receiver_id {
            conversation.unread_low += 1;
        } else if conversation.user_high_id == receiver_id {
            conversation.unread_high += 1;
        }
        Ok(())
    }

    async fn reset_unread(&self, conversation_id: i64, user_id: i64) -> Result<(), AppError> {
        let mut inner = self.lock();
        if let Some(conversation) = inner.conversations.get_mut(&conversation_id) {
            if conversation.user_low_id == user_id {
                conversation.unread_low = 0;
            } else if conversation.user_high_id == user_id {
                conversation.unread_high = 0;
            }
        }
        Ok(())
    }

    async fn total_unread(&self, user_id: i64) -> Result<i64, AppError> {
        let inner = self.lock();
        Ok(inner
            .conversations
            .values()
            .filter(|c| !c.is_deleted && c.is_participant(user_id))
            .map(|c| c.unread_for(user_id))
            .sum())
    }
}

#[async_trait]
impl MessageStore for MemoryBackend {
    async fn insert(&self, data: &NewMessage) -> Result<Message, AppError> {
        let mut inner = self.lock();
        inner.next_message_id += 1;
        let message = Message {
            message_id: inner.next_message_id,
            conversation_id: data.conversation_id,
            sender_id: data.sender_id,
            receiver_id: data.receiver_id,
            content: data.content.clone(),
            message_type: data.message_type,
            status: MessageStatus::Sent,
            delivered_at: None,
            read_at: None,
            metadata: data.metadata.clone(),
            is_deleted: false,
            created_at: Utc::now(),
        };
        inner.messages.insert(message.message_id, message.clone());
        Ok(message)
    }

    async fn find_by_id(
        &self,
        message_id: i64,
        include_deleted: bool,
    ) -> Result<Option<Message>, AppError> {
        let inner = self.lock();
        Ok(inner
            .messages
            .get(&message_id)
            .filter(|m| include_deleted || !m.is_deleted)
            .cloned())
    }

    async fn list_paginated(
        &self,
        conversation_id: i64,
        offset: i64,
        limit: i64,
        include_deleted: bool,
    ) -> Result<Vec<Message>, AppError> {
        let inner = self.lock();
        let mut list: Vec<Message> = inner
            .messages
            .values()
            .filter(|m| {
                m.conversation_id == conversation_id && (include_deleted || !m.is_deleted)
            })
            .cloned()
            .collect();
        list.sort_by_key(|m| (std::cmp::Reverse(m.created_at), std::cmp::Reverse(m.message_id)));
        Ok(list
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn mark_conversation_read(
        &self,
        conversation_id: i64,
        reader_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<i64>, AppError> {
        let mut inner = self.lock();
        let mut transitioned = Vec::new();
        for message in inner.messages.values_mut() {
            if message.conversation_id == conversation_id
                && message.receiver_id == reader_id
                && message.status != MessageStatus::Read
                && !message.is_deleted
            {
                message.status = MessageStatus::Read;
                message.read_at = Some(at);
                transitioned.push(message.message_id);
            }
        }
        transitioned.sort_unstable();
        Ok(transitioned)
    }

    async fn mark_delivered_for_receiver(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError> {
        let mut inner = self.lock();
        let mut count = 0;
        for message in inner.messages.values_mut() {
            if message.receiver_id == user_id
                && message.status == MessageStatus::Sent
                && !message.is_deleted
            {
                message.status = MessageStatus::Delivered;
                message.delivered_at = Some(at);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn soft_delete(&self, message_id: i64, sender_id: i64) -> Result<bool, AppError> {
        let mut inner = self.lock();
        match inner.messages.get_mut(&message_id) {
            Some(message) if message.sender_id == sender_id && !message.is_deleted => {
                message.is_deleted = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl UserDirectory for MemoryBackend {
    async fn find_by_id(&self, user_id: i64) -> Result<Option<UserAccount>, AppError> {
        let inner = self.lock();
        Ok(inner.users.get(&user_id).cloned())
    }

    async fn find_summaries(&self, user_ids: &[i64]) -> Result<Vec<UserAccount>, AppError> {
        let inner = self.lock();
        Ok(user_ids
            .iter()
            .filter_map(|id| inner.users.get(id).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::MessageType;

    fn new_message(conversation_id: i64, sender_id: i64, receiver_id: i64) -> NewMessage {
        NewMessage {
            conversation_id,
            sender_id,
            receiver_id,
            content: "hello".to_string(),
            message_type: MessageType::Text,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn get_or_create_is_order_independent() {
        let backend = MemoryBackend::new();
        let first = backend.get_or_create_pair(2, 1).await.unwrap();
        let second = backend.get_or_create_pair(1, 2).await.unwrap();
        assert_eq!(first.conversation_id, second.conversation_id);
    }

    #[tokio::test]
    async fn revives_soft_deleted_pair_instead_of_duplicating() {
        let backend = MemoryBackend::new();
        let conv = backend.get_or_create_pair(1, 2).await.unwrap();
        backend
            .lock()
            .conversations
            .get_mut(&conv.conversation_id)
            .unwrap()
            .is_deleted = true;

        let revived = backend.get_or_create_pair(1, 2).await.unwrap();
        assert_eq!(revived.conversation_id, conv.conversation_id);
        assert!(!revived.is_deleted);
    }

    #[tokio::test]
    async fn mark_read_is_idempotent_and_returns_ids_once() {
        let backend = MemoryBackend::new();
        let conv = backend.get_or_create_pair(1, 2).await.unwrap();
        backend.insert(&new_message(conv.conversation_id, 1, 2)).await.unwrap();
        backend.insert(&new_message(conv.conversation_id, 1, 2)).await.unwrap();

        let first = backend
            .mark_conversation_read(conv.conversation_id, 2, Utc::now())
            .await
            .unwrap();
        assert_eq!(first.len(), 2);

        let second = backend
            .mark_conversation_read(conv.conversation_id, 2, Utc::now())
            .await
            .unwrap();
        assert!(second.is_empty());
    }

    #[tokio::test]
    async fn delivered_pass_skips_already_read_messages() {
        let backend = MemoryBackend::new();
        let conv = backend.get_or_create_pair(1, 2).await.unwrap();
        let msg = backend.insert(&new_message(conv.conversation_id, 1, 2)).await.unwrap();
        backend
            .mark_conversation_read(conv.conversation_id, 2, Utc::now())
            .await
            .unwrap();

        // READ non regredisce mai a DELIVERED.
        let count = backend.mark_delivered_for_receiver(2, Utc::now()).await.unwrap();
        assert_eq!(count, 0);
        let stored = MessageStore::find_by_id(&backend, msg.message_id, false)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, MessageStatus::Read);
    }

    #[tokio::test]
    async fn soft_delete_requires_sender() {
        let backend = MemoryBackend::new();
        let conv = backend.get_or_create_pair(1, 2).await.unwrap();
        let msg = backend.insert(&new_message(conv.conversation_id, 1, 2)).await.unwrap();

        assert!(!backend.soft_delete(msg.message_id, 2).await.unwrap());
        assert!(backend.soft_delete(msg.message_id, 1).await.unwrap());
        assert!(
            MessageStore::find_by_id(&backend, msg.message_id, false)
                .await
                .unwrap()
                .is_none()
        );
    }
}
