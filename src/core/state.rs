use crate::fanout::Fanout;
use crate::registry::{PresenceStore, TypingStore};
use crate::repositories::UserDirectory;
use crate::services::MessagingService;
use crate::storage::FileStorage;
use crate::ws::{RoomMap, UserMap};
use std::sync::Arc;
use std::time::Duration;

/// Stato condiviso dell'applicazione, passato a handler e gateway.
///
/// Tutte le dipendenze verso store e broker sono dietro trait object: la
/// composizione concreta (MySQL + Redis, oppure tutto in memoria) avviene
/// solo in fase di bootstrap.
pub struct AppState {
    pub users: Arc<dyn UserDirectory>,
    pub messaging: MessagingService,
    pub presence: Arc<dyn PresenceStore>,
    pub typing: Arc<dyn TypingStore>,
    pub users_online: Arc<UserMap>,
    pub rooms: Arc<RoomMap>,
    pub fanout: Arc<dyn Fanout>,
    pub storage: Arc<dyn FileStorage>,
    pub jwt_secret: String,
    pub presence_ttl: Duration,
}

impl AppState {
    /// Composizione completamente in memoria: nessun MySQL né Redis.
    /// Usata dai test di integrazione e utile in sviluppo locale.
    pub fn in_memory(jwt_secret: impl Into<String>) -> (Arc<Self>, crate::repositories::MemoryBackend) {
        use crate::fanout::local::LocalFanout;
        use crate::registry::memory::{MemoryPresence, MemoryTyping};
        use crate::repositories::MemoryBackend;
        use crate::storage::MemoryStorage;

        let backend = MemoryBackend::new();
        let users_online = Arc::new(UserMap::new());
        let rooms = Arc::new(RoomMap::new());
        let fanout: Arc<dyn Fanout> =
            Arc::new(LocalFanout::new(users_online.clone(), rooms.clone()));

        let conversations: Arc<dyn crate::repositories::ConversationStore> =
            Arc::new(backend.clone());
        let messages: Arc<dyn crate::repositories::MessageStore> = Arc::new(backend.clone());
        let users: Arc<dyn UserDirectory> = Arc::new(backend.clone());
        let presence: Arc<dyn PresenceStore> =
            Arc::new(MemoryPresence::new(Duration::from_secs(60)));

        let messaging = MessagingService::new(
            conversations,
            messages,
            users.clone(),
            presence.clone(),
            fanout.clone(),
        );

        let state = Arc::new(AppState {
            users,
            messaging,
            presence,
            typing: Arc::new(MemoryTyping::new(Duration::from_secs(5))),
            users_online,
            rooms,
            fanout,
            storage: Arc::new(MemoryStorage),
            jwt_secret: jwt_secret.into(),
            presence_ttl: Duration::from_secs(60),
        });
        (state, backend)
    }
}
