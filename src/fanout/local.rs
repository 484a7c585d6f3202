use crate::core::AppError;
use crate::dtos::ServerEvent;
use crate::fanout::Fanout;
use crate::ws::{RoomMap, UserMap};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Fanout in-process: consegna direttamente attraverso le mappe locali.
/// Usato come backend quando Redis non è configurato o non raggiungibile,
/// e come ultimo miglio dal listener Redis.
pub struct LocalFanout {
    users: Arc<UserMap>,
    rooms: Arc<RoomMap>,
}

impl LocalFanout {
    pub fn new(users: Arc<UserMap>, rooms: Arc<RoomMap>) -> Self {
        LocalFanout { users, rooms }
    }

    pub(crate) fn deliver_user(&self, user_id: i64, event: &ServerEvent) {
        self.users.send(user_id, event.clone());
    }

    pub(crate) fn deliver_conversation(&self, conversation_id: i64, event: &ServerEvent) {
        let members = self.rooms.members(conversation_id);
        debug!(
            conversation_id,
            members = members.len(),
            "Delivering event to conversation room"
        );
        for user_id in members {
            self.users.send(user_id, event.clone());
        }
    }

    pub(crate) fn deliver_broadcast(&self, event: &ServerEvent) {
        self.users.send_all(event);
    }
}

#[async_trait]
impl Fanout for LocalFanout {
    #[instrument(skip(self, event), fields(user_id = %user_id))]
    async fn to_user(&self, user_id: i64, event: &ServerEvent) -> Result<(), AppError> {
        self.deliver_user(user_id, event);
        Ok(())
    }

    #[instrument(skip(self, event), fields(conversation_id = %conversation_id))]
    async fn to_conversation(
        &self,
        conversation_id: i64,
        event: &ServerEvent,
    ) -> Result<(), AppError> {
        self.deliver_conversation(conversation_id, event);
        Ok(())
    }

    async fn broadcast(&self, event: &ServerEvent) -> Result<(), AppError> {
        self.deliver_broadcast(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    fn setup() -> (Arc<UserMap>, Arc<RoomMap>, LocalFanout) {
        let users = Arc::new(UserMap::new());
        let rooms = Arc::new(RoomMap::new());
        let fanout = LocalFanout::new(users.clone(), rooms.clone());
        (users, rooms, fanout)
    }

    #[tokio::test]
    async fn to_user_reaches_only_that_user() {
        let (users, _rooms, fanout) = setup();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        users.register(1, tx1);
        users.register(2, tx2);

        fanout
            .to_user(1, &ServerEvent::UserOnline { user_id: 99 })
            .await
            .unwrap();

        assert!(rx1.recv().await.is_some());
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn to_conversation_reaches_every_member() {
        let (users, rooms, fanout) = setup();
        let (tx1, mut rx1) = unbounded_channel();
        let (tx2, mut rx2) = unbounded_channel();
        users.register(1, tx1);
        users.register(2, tx2);
        rooms.join(7, 1);
        rooms.join(7, 2);

        fanout
            .to_conversation(
                7,
                &ServerEvent::UserTyping {
                    conversation_id: 7,
                    user_id: 1,
                    is_typing: true,
                },
            )
            .await
            .unwrap();

        assert!(rx1.recv().await.is_some());
        assert!(rx2.recv().await.is_some());
    }

    #[tokio::test]
    async fn offline_member_is_skipped_silently() {
        let (users, rooms, fanout) = setup();
        let (tx1, mut rx1) = unbounded_channel();
        users.register(1, tx1);
        rooms.join(7, 1);
        rooms.join(7, 2); // user 2 ha la stanza ma nessuna connessione

        fanout
            .to_conversation(7, &ServerEvent::UserOnline { user_id: 1 })
            .await
            .unwrap();
        assert!(rx1.recv().await.is_some());
    }
}
