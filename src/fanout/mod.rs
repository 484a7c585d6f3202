//! Fanout module - Distribuzione cross-process degli eventi real-time
//!
//! Un evento emesso su un processo deve raggiungere l'utente anche se la sua
//! connessione vive su un altro processo. La variante Redis pubblica su
//! canali condivisi e ogni processo ripubblica nei propri gruppi locali; la
//! variante locale consegna direttamente (modalità degradata o deploy
//! single-process). La consegna è at-most-once: la durabilità sta nello
//! store, mai nel trasporto.

pub mod local;
pub mod redis;

use crate::core::AppError;
use crate::dtos::ServerEvent;
use async_trait::async_trait;

#[async_trait]
pub trait Fanout: Send + Sync {
    /// Emette verso il gruppo per-utente.
    async fn to_user(&self, user_id: i64, event: &ServerEvent) -> Result<(), AppError>;

    /// Emette verso la stanza di una conversazione.
    async fn to_conversation(
        &self,
        conversation_id: i64,
        event: &ServerEvent,
    ) -> Result<(), AppError>;

    /// Emette a tutti i client connessi (es. transizioni online/offline).
    async fn broadcast(&self, event: &ServerEvent) -> Result<(), AppError>;
}
