//! Fanout Redis - Pub/sub cross-process
//!
//! Ogni processo pubblica su canali condivisi e sottoscrive il pattern
//! `chat.*`: la consegna locale avviene sempre nel listener, anche per gli
//! eventi pubblicati dal processo stesso (il loopback del broker li riporta
//! indietro). Canali:
//!   - chat.user.{user_id}           eventi indirizzati a un utente
//!   - chat.conversation.{conv_id}   eventi di stanza
//!   - chat.broadcast                transizioni online/offline

use crate::core::AppError;
use crate::dtos::ServerEvent;
use crate::fanout::Fanout;
use crate::fanout::local::LocalFanout;
use async_trait::async_trait;
use futures::StreamExt;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

const USER_CHANNEL_PREFIX: &str = "chat.user.";
const CONVERSATION_CHANNEL_PREFIX: &str = "chat.conversation.";
const BROADCAST_CHANNEL: &str = "chat.broadcast";
const CHANNEL_PATTERN: &str = "chat.*";
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(5);

/// Apre client e connection manager verso Redis. Il manager gestisce le
/// riconnessioni sul lato publish; il listener tiene una connessione
/// dedicata perché una connessione in modalità pub/sub non può fare altro.
pub async fn connect(url: &str) -> Result<(redis::Client, ConnectionManager), AppError> {
    let client = redis::Client::open(url)
        .map_err(|e| AppError::service_unavailable("Invalid Redis URL").with_details(e.to_string()))?;
    let manager = ConnectionManager::new(client.clone()).await?;
    Ok((client, manager))
}

pub struct RedisFanout {
    conn: ConnectionManager,
}

impl RedisFanout {
    pub fn new(conn: ConnectionManager) -> Self {
        RedisFanout { conn }
    }

    async fn publish(&self, channel: String, event: &ServerEvent) -> Result<(), AppError> {
        let payload = serde_json::to_string(event).map_err(|e| {
            AppError::internal_server_error("Failed to serialize event").with_details(e.to_string())
        })?;
        let mut conn = self.conn.clone();
        let receivers: i64 = conn.publish(&channel, payload).await?;
        debug!(channel = %channel, receivers, "Event published");
        Ok(())
    }
}

#[async_trait]
impl Fanout for RedisFanout {
    #[instrument(skip(self, event), fields(user_id = %user_id))]
    async fn to_user(&self, user_id: i64, event: &ServerEvent) -> Result<(), AppError> {
        self.publish(format!("{}{}", USER_CHANNEL_PREFIX, user_id), event)
            .await
    }

    #[instrument(skip(self, event), fields(conversation_id = %conversation_id))]
    async fn to_conversation(
        &self,
        conversation_id: i64,
        event: &ServerEvent,
    ) -> Result<(), AppError> {
        self.publish(
            format!("{}{}", CONVERSATION_CHANNEL_PREFIX, conversation_id),
            event,
        )
        .await
    }

    async fn broadcast(&self, event: &ServerEvent) -> Result<(), AppError> {
        self.publish(BROADCAST_CHANNEL.to_string(), event).await
    }
}

/// Avvia il listener pub/sub in background. Su errore di sottoscrizione o
/// caduta dello stream riprova dopo un delay fisso, senza far cadere il
/// processo: nel frattempo il nodo resta in modalità locale.
pub fn spawn_listener(client: redis::Client, local: Arc<LocalFanout>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match listen(&client, &local).await {
                Ok(()) => warn!("Redis pub/sub stream ended, resubscribing"),
                Err(e) => error!("Redis pub/sub listener error: {:?}", e),
            }
            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
        }
    })
}

async fn listen(client: &redis::Client, local: &LocalFanout) -> Result<(), AppError> {
    let mut pubsub = client.get_async_pubsub().await?;
    pubsub.psubscribe(CHANNEL_PATTERN).await?;
    info!(pattern = CHANNEL_PATTERN, "Subscribed to fanout channels");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name().to_string();
        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                warn!(channel = %channel, "Unreadable pub/sub payload: {}", e);
                continue;
            }
        };
        dispatch(local, &channel, &payload);
    }
    Ok(())
}

/// Ripubblica un messaggio del broker nei gruppi locali.
fn dispatch(local: &LocalFanout, channel: &str, payload: &str) {
    let event: ServerEvent = match serde_json::from_str(payload) {
        Ok(e) => e,
        Err(e) => {
            warn!(channel = %channel, "Malformed event on fanout channel: {}", e);
            return;
        }
    };

    if let Some(id) = channel.strip_prefix(USER_CHANNEL_PREFIX) {
        match id.parse::<i64>() {
            Ok(user_id) => local.deliver_user(user_id, &event),
            Err(_) => warn!(channel = %channel, "Unparsable user channel"),
        }
    } else if let Some(id) = channel.strip_prefix(CONVERSATION_CHANNEL_PREFIX) {
        match id.parse::<i64>() {
            Ok(conversation_id) => local.deliver_conversation(conversation_id, &event),
            Err(_) => warn!(channel = %channel, "Unparsable conversation channel"),
        }
    } else if channel == BROADCAST_CHANNEL {
        local.deliver_broadcast(&event);
    } else {
        debug!(channel = %channel, "Ignoring event on unknown channel");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::{RoomMap, UserMap};
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn dispatch_routes_user_channel_to_local_group() {
        let users = Arc::new(UserMap::new());
        let rooms = Arc::new(RoomMap::new());
        let local = LocalFanout::new(users.clone(), rooms);
        let (tx, mut rx) = unbounded_channel();
        users.register(5, tx);

        let payload =
            serde_json::to_string(&ServerEvent::UserOnline { user_id: 9 }).unwrap();
        dispatch(&local, "chat.user.5", &payload);

        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn dispatch_ignores_malformed_payloads() {
        let users = Arc::new(UserMap::new());
        let rooms = Arc::new(RoomMap::new());
        let local = LocalFanout::new(users.clone(), rooms);
        let (tx, mut rx) = unbounded_channel();
        users.register(5, tx);

        dispatch(&local, "chat.user.5", "not json");
        dispatch(&local, "chat.user.not-a-number", "{}");
        assert!(rx.try_recv().is_err());
    }
}
