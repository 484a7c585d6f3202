//! Registry module - Stato effimero con scadenza (presence e typing)
//!
//! Due store chiave/valore a TTL dietro interfacce strette: l'assenza della
//! chiave equivale a "offline" / "non sta scrivendo". Persi per crash o
//! scadenza, si auto-riparano: nessuna riconciliazione manuale.

pub mod memory;
pub mod redis;

use crate::core::AppError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Record di presenza per un utente connesso.
/// Assunzione di singola connessione attiva: l'ultimo writer vince.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PresenceRecord {
    pub online: bool,
    pub connection_handle: String,
    pub last_seen: DateTime<Utc>,
}

#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Registra l'utente online con TTL; sovrascrive qualsiasi record precedente.
    async fn set_online(&self, user_id: i64, connection_handle: &str) -> Result<(), AppError>;

    /// Heartbeat: estende la scadenza del record corrente.
    async fn refresh(&self, user_id: i64) -> Result<(), AppError>;

    /// Cancella subito il record (disconnessione esplicita, niente attesa TTL).
    async fn set_offline(&self, user_id: i64) -> Result<(), AppError>;

    async fn is_online(&self, user_id: i64) -> Result<bool, AppError>;

    async fn get_many(&self, user_ids: &[i64]) -> Result<HashMap<i64, bool>, AppError>;
}

#[async_trait]
pub trait TypingStore: Send + Sync {
    /// `true` imposta un flag a TTL breve; `false` lo rimuove subito.
    async fn set_typing(
        &self,
        conversation_id: i64,
        user_id: i64,
        is_typing: bool,
    ) -> Result<(), AppError>;

    async fn is_typing(&self, conversation_id: i64, user_id: i64) -> Result<bool, AppError>;
}
