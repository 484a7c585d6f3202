//! Registri in memoria - Variante single-process dei registri a TTL
//!
//! Stessa semantica della variante Redis: le voci scadono e la scadenza è
//! osservata in lettura (lazy expiry), così `tokio::time::pause` rende il
//! comportamento testabile in modo deterministico.

use super::{PresenceRecord, PresenceStore, TypingStore};
use crate::core::AppError;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::time::{Duration, Instant};

struct PresenceEntry {
    record: PresenceRecord,
    expires_at: Instant,
}

pub struct MemoryPresence {
    entries: DashMap<i64, PresenceEntry>,
    ttl: Duration,
}

impl MemoryPresence {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    fn live(&self, user_id: i64) -> bool {
        // La scadenza viene copiata fuori: il Ref sullo shard deve essere
        // rilasciato prima della remove, altrimenti si blocca sullo stesso lock.
        let expires_at = match self.entries.get(&user_id) {
            Some(entry) => entry.expires_at,
            None => return false,
        };
        if expires_at > Instant::now() {
            return true;
        }
        self.entries
            .remove_if(&user_id, |_, entry| entry.expires_at <= Instant::now());
        false
    }
}

#[async_trait]
impl PresenceStore for MemoryPresence {
    async fn set_online(&self, user_id: i64, connection_handle: &str) -> Result<(), AppError> {
        self.entries.insert(
            user_id,
            PresenceEntry {
                record: PresenceRecord {
                    online: true,
                    connection_handle: connection_handle.to_string(),
                    last_seen: Utc::now(),
                },
                expires_at: Instant::now() + self.ttl,
            },
        );
        Ok(())
    }

    async fn refresh(&self, user_id: i64) -> Result<(), AppError> {
        if let Some(mut entry) = self.entries.get_mut(&user_id) {
            entry.expires_at = Instant::now() + self.ttl;
            entry.record.last_seen = Utc::now();
        }
        Ok(())
    }

    async fn set_offline(&self, user_id: i64) -> Result<(), AppError> {
        self.entries.remove(&user_id);
        Ok(())
    }

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError> {
        Ok(self.live(user_id))
    }

    async fn get_many(&self, user_ids: &[i64]) -> Result<HashMap<i64, bool>, AppError> {
        Ok(user_ids.iter().map(|&id| (id, self.live(id))).collect())
    }
}

pub struct MemoryTyping {
    entries: DashMap<(i64, i64), Instant>,
    ttl: Duration,
}

impl MemoryTyping {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }
}

#[async_trait]
impl TypingStore for MemoryTyping {
    async fn set_typing(
        &self,
        conversation_id: i64,
        user_id: i64,
        is_typing: bool,
    ) -> Result<(), AppError> {
        let key = (conversation_id, user_id);
        if is_typing {
            self.entries.insert(key, Instant::now() + self.ttl);
        } else {
            self.entries.remove(&key);
        }
        Ok(())
    }

    async fn is_typing(&self, conversation_id: i64, user_id: i64) -> Result<bool, AppError> {
        let key = (conversation_id, user_id);
        // Come in MemoryPresence::live: niente remove con il Ref ancora vivo.
        let deadline = match self.entries.get(&key) {
            Some(deadline) => *deadline,
            None => return Ok(false),
        };
        if deadline > Instant::now() {
            return Ok(true);
        }
        self.entries
            .remove_if(&key, |_, deadline| *deadline <= Instant::now());
        Ok(false)
    }
}
