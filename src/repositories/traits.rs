//! Store traits - Interfacce strette verso lo store durevole
//!
//! I service e il gateway dipendono solo da questi trait: il backend MySQL e
//! quello in memoria sono intercambiabili senza toccare la logica applicativa.
//! Le mutazioni composte (incremento non-letti, transizioni di stato bulk)
//! sono atomiche DENTRO lo store, mai read-then-write a livello applicativo.

use crate::core::AppError;
use crate::entities::{Conversation, Message, MessageType, UserAccount};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Dati per l'inserimento di un nuovo messaggio. `message_id` e `created_at`
/// vengono assegnati dallo store al momento della scrittura.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub conversation_id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub message_type: MessageType,
    pub metadata: Option<serde_json::Value>,
}

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Cerca la conversazione per la coppia non ordinata (a, b).
    async fn find_pair(
        &self,
        a: i64,
        b: i64,
        include_deleted: bool,
    ) -> Result<Option<Conversation>, AppError>;

    /// Find-or-create race-safe: chiamate concorrenti per la stessa coppia
    /// convergono sulla stessa riga. Una riga soft-deleted viene ripristinata.
    async fn get_or_create_pair(&self, a: i64, b: i64) -> Result<Conversation, AppError>;

    async fn find_by_id(
        &self,
        conversation_id: i64,
        include_deleted: bool,
    ) -> Result<Option<Conversation>, AppError>;

    /// Conversazioni di cui `user_id` è partecipante, più recenti prima
    /// (per `last_message_at`). `limit + 1` righe richieste dal chiamante
    /// per calcolare `has_more`.
    async fn list_for_user(
        &self,
        user_id: i64,
        offset: i64,
        limit: i64,
        include_deleted: bool,
    ) -> Result<Vec<Conversation>, AppError>;

    /// Aggiorna il riassunto denormalizzato e incrementa di 1 il contatore
    /// non-letti del ricevente, in un'unica operazione atomica.
    async fn record_message(
        &self,
        conversation_id: i64,
        sender_id: i64,
        receiver_id: i64,
        preview: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Azzera atomicamente il contatore non-letti di `user_id`.
    async fn reset_unread(&self, conversation_id: i64, user_id: i64) -> Result<(), AppError>;

    /// Somma dei non-letti di `user_id` su tutte le conversazioni.
    async fn total_unread(&self, user_id: i64) -> Result<i64, AppError>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, data: &NewMessage) -> Result<Message, AppError>;

    async fn find_by_id(
        &self,
        message_id: i64,
        include_deleted: bool,
    ) -> Result<Option<Message>, AppError>;

    /// Pagina di messaggi della conversazione, più recenti prima.
    async fn list_paginated(
        &self,
        conversation_id: i64,
        offset: i64,
        limit: i64,
        include_deleted: bool,
    ) -> Result<Vec<Message>, AppError>;

    /// Porta a READ ogni messaggio non-READ indirizzato a `reader_id` nella
    /// conversazione. Idempotente: i già-letti non vengono toccati né contati.
    /// Ritorna gli id transitati (per notificare il lato mittente).
    async fn mark_conversation_read(
        &self,
        conversation_id: i64,
        reader_id: i64,
        at: DateTime<Utc>,
    ) -> Result<Vec<i64>, AppError>;

    /// Porta a DELIVERED ogni messaggio SENT con `receiver_id == user_id`,
    /// su TUTTE le conversazioni (passaggio globale alla connessione).
    /// No-op se non c'è nulla da transire.
    async fn mark_delivered_for_receiver(
        &self,
        user_id: i64,
        at: DateTime<Utc>,
    ) -> Result<u64, AppError>;

    /// Soft-delete da parte del mittente. Ritorna false se il messaggio non
    /// appartiene a `sender_id` (nessuna riga toccata).
    async fn soft_delete(&self, message_id: i64, sender_id: i64) -> Result<bool, AppError>;
}

/// Confine verso il servizio identità: sola lettura.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn find_by_id(&self, user_id: i64) -> Result<Option<UserAccount>, AppError>;

    async fn find_summaries(&self, user_ids: &[i64]) -> Result<Vec<UserAccount>, AppError>;
}
