use dashmap::DashMap;
use std::collections::HashSet;
use tracing::{debug, info, instrument};

/// Stanze di conversazione: membership esplicita richiesta via
/// `join_conversation`. Le connessioni restano handle opachi, la consegna
/// passa sempre dalla UserMap.
pub struct RoomMap {
    rooms: DashMap<i64, HashSet<i64>>,
}

impl RoomMap {
    pub fn new() -> Self {
        RoomMap {
            rooms: DashMap::new(),
        }
    }

    #[instrument(skip(self), fields(conversation_id = %conversation_id, user_id = %user_id))]
    pub fn join(&self, conversation_id: i64, user_id: i64) {
        self.rooms
            .entry(conversation_id)
            .or_default()
            .insert(user_id);
        info!("User joined conversation room");
    }

    #[instrument(skip(self), fields(conversation_id = %conversation_id, user_id = %user_id))]
    pub fn leave(&self, conversation_id: i64, user_id: i64) {
        if let Some(mut members) = self.rooms.get_mut(&conversation_id) {
            members.remove(&user_id);
            if members.is_empty() {
                drop(members);
                self.rooms.remove_if(&conversation_id, |_, m| m.is_empty());
                debug!("Empty room removed");
            }
        }
    }

    /// Cleanup alla disconnessione: l'utente esce da tutte le stanze.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn leave_all(&self, user_id: i64) {
        let mut emptied = Vec::new();
        for mut entry in self.rooms.iter_mut() {
            entry.value_mut().remove(&user_id);
            if entry.value().is_empty() {
                emptied.push(*entry.key());
            }
        }
        for conversation_id in emptied {
            self.rooms.remove_if(&conversation_id, |_, m| m.is_empty());
        }
    }

    pub fn members(&self, conversation_id: i64) -> Vec<i64> {
        self.rooms
            .get(&conversation_id)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, conversation_id: i64, user_id: i64) -> bool {
        self.rooms
            .get(&conversation_id)
            .map(|m| m.contains(&user_id))
            .unwrap_or(false)
    }
}

impl Default for RoomMap {
    fn default() -> Self {
        Self::new()
    }
}
