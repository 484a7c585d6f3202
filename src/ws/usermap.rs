use crate::dtos::ServerEvent;
use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, instrument, warn};

/// Gruppo di broadcast per-utente: user_id -> canale di scrittura verso la
/// sua connessione WebSocket. Assunzione di singola connessione attiva:
/// una nuova registrazione sovrascrive (e quindi chiude) la precedente.
pub struct UserMap {
    users_online: DashMap<i64, UnboundedSender<ServerEvent>>,
}

impl UserMap {
    pub fn new() -> Self {
        UserMap {
            users_online: DashMap::new(),
        }
    }

    #[instrument(skip(self, tx), fields(user_id = %user_id))]
    pub fn register(&self, user_id: i64, tx: UnboundedSender<ServerEvent>) {
        info!("Registering user connection");
        self.users_online.insert(user_id, tx);
        info!("Total connected users: {}", self.users_online.len());
    }

    /// Rimuove la connessione solo se è ancora quella registrata: la cleanup
    /// di una connessione vecchia non deve buttare giù quella nuova.
    #[instrument(skip(self, tx), fields(user_id = %user_id))]
    pub fn unregister(&self, user_id: i64, tx: &UnboundedSender<ServerEvent>) {
        let removed = self
            .users_online
            .remove_if(&user_id, |_, current| current.same_channel(tx));
        if removed.is_some() {
            info!("User connection removed");
        } else {
            debug!("Connection already superseded, nothing to remove");
        }
    }

    /// Consegna locale best-effort. Ritorna true se l'evento è stato accodato.
    #[instrument(skip(self, event), fields(user_id = %user_id))]
    pub fn send(&self, user_id: i64, event: ServerEvent) -> bool {
        if let Some(entry) = self.users_online.get(&user_id) {
            if let Err(e) = entry.value().send(event) {
                warn!("Failed to queue event for user: {:?}", e);
                false
            } else {
                true
            }
        } else {
            debug!("User not connected locally, event not sent");
            false
        }
    }

    /// Invia l'evento a tutte le connessioni locali.
    pub fn send_all(&self, event: &ServerEvent) {
        for entry in self.users_online.iter() {
            let _ = entry.value().send(event.clone());
        }
    }

    pub fn is_connected(&self, user_id: i64) -> bool {
        self.users_online.contains_key(&user_id)
    }

    pub fn connected_count(&self) -> usize {
        self.users_online.len()
    }
}

impl Default for UserMap {
    fn default() -> Self {
        Self::new()
    }
}
