//! Registri Redis - Presence e typing condivisi tra processi
//!
//! Chiavi a TTL: `presence:{user_id}` e `typing:{conversation_id}:{user_id}`.
//! La scadenza è gestita dal broker (SET ... EX); un processo crashato lascia
//! voci stantie che si auto-eliminano senza riconciliazione.

use super::{PresenceRecord, PresenceStore, TypingStore};
use crate::core::AppError;
use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use tracing::{debug, instrument};

fn presence_key(user_id: i64) -> String {
    format!("presence:{}", user_id)
}

fn typing_key(conversation_id: i64, user_id: i64) -> String {
    format!("typing:{}:{}", conversation_id, user_id)
}

pub struct RedisPresence {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisPresence {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }
}

#[async_trait]
impl PresenceStore for RedisPresence {
    #[instrument(skip(self, connection_handle), fields(user_id = %user_id))]
    async fn set_online(&self, user_id: i64, connection_handle: &str) -> Result<(), AppError> {
        let record = PresenceRecord {
            online: true,
            connection_handle: connection_handle.to_string(),
            last_seen: Utc::now(),
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| AppError::internal_server_error("Presence encoding failed")
                .with_details(e.to_string()))?;
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(presence_key(user_id), json, self.ttl_secs)
            .await?;
        debug!("Presence record stored");
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn refresh(&self, user_id: i64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.expire::<_, ()>(presence_key(user_id), self.ttl_secs as i64)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn set_offline(&self, user_id: i64) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(presence_key(user_id)).await?;
        Ok(())
    }

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(presence_key(user_id)).await?;
        Ok(exists)
    }

    #[instrument(skip(self, user_ids))]
    async fn get_many(&self, user_ids: &[i64]) -> Result<HashMap<i64, bool>, AppError> {
        if user_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for &id in user_ids {
            pipe.exists(presence_key(id));
        }
        let flags: Vec<bool> = pipe.query_async(&mut conn).await?;
        Ok(user_ids.iter().copied().zip(flags).collect())
    }
}

pub struct RedisTyping {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisTyping {
    pub fn new(conn: ConnectionManager, ttl_secs: u64) -> Self {
        Self { conn, ttl_secs }
    }
}

#[async_trait]
impl TypingStore for RedisTyping {
    #[instrument(skip(self), fields(conversation_id = %conversation_id, user_id = %user_id))]
    async fn set_typing(
        &self,
        conversation_id: i64,
        user_id: i64,
        is_typing: bool,
    ) -> Result<(), AppError> {
        let mut conn = self.conn.clone();
        let key = typing_key(conversation_id, user_id);
        if is_typing {
            conn.set_ex::<_, _, ()>(key, "1", self.ttl_secs).await?;
        } else {
            // Stop esplicito: cancellazione immediata, il TTL è solo la rete
            // di sicurezza per le disconnessioni brusche.
            conn.del::<_, ()>(key).await?;
        }
        Ok(())
    }

    async fn is_typing(&self, conversation_id: i64, user_id: i64) -> Result<bool, AppError> {
        let mut conn = self.conn.clone();
        let exists: bool = conn.exists(typing_key(conversation_id, user_id)).await?;
        Ok(exists)
    }
}
