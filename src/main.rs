use sqlx::mysql::MySqlPoolOptions;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use wirechat::core::{AppState, Config};
use wirechat::fanout::local::LocalFanout;
use wirechat::fanout::{Fanout, redis::RedisFanout};
use wirechat::registry::memory::{MemoryPresence, MemoryTyping};
use wirechat::registry::redis::{RedisPresence, RedisTyping};
use wirechat::registry::{PresenceStore, TypingStore};
use wirechat::repositories::{
    ConversationRepository, ConversationStore, MessageRepository, MessageStore, UserDirectory,
    UserRepository,
};
use wirechat::services::MessagingService;
use wirechat::storage::{FileStorage, LocalDiskStorage};
use wirechat::ws::{RoomMap, UserMap};
use wirechat::{create_router, monitoring};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env()?;
    config.print_info();

    let pool = MySqlPoolOptions::new()
        .max_connections(config.max_connections)
        .max_lifetime(Duration::from_secs(config.connection_lifetime_secs))
        .connect(&config.database_url)
        .await?;
    info!("Database pool initialized");

    let users_online = Arc::new(UserMap::new());
    let rooms = Arc::new(RoomMap::new());
    let local_fanout = Arc::new(LocalFanout::new(users_online.clone(), rooms.clone()));

    // Con Redis: presence/typing condivisi e fanout cross-process.
    // Senza (o se irraggiungibile): modalità degradata, tutto locale.
    let (fanout, presence, typing): (
        Arc<dyn Fanout>,
        Arc<dyn PresenceStore>,
        Arc<dyn TypingStore>,
    ) = match &config.redis_url {
        Some(url) => match wirechat::fanout::redis::connect(url).await {
            Ok((client, manager)) => {
                info!("Redis connected, cross-process fanout enabled");
                wirechat::fanout::redis::spawn_listener(client, local_fanout.clone());
                (
                    Arc::new(RedisFanout::new(manager.clone())),
                    Arc::new(RedisPresence::new(manager.clone(), config.presence_ttl_secs)),
                    Arc::new(RedisTyping::new(manager, config.typing_ttl_secs)),
                )
            }
            Err(e) => {
                warn!("Redis unreachable, starting in local-only mode: {:?}", e);
                (
                    local_fanout.clone(),
                    Arc::new(MemoryPresence::new(Duration::from_secs(
                        config.presence_ttl_secs,
                    ))),
                    Arc::new(MemoryTyping::new(Duration::from_secs(
                        config.typing_ttl_secs,
                    ))),
                )
            }
        },
        None => {
            info!("No Redis configured, starting in local-only mode");
            (
                local_fanout.clone(),
                Arc::new(MemoryPresence::new(Duration::from_secs(
                    config.presence_ttl_secs,
                ))),
                Arc::new(MemoryTyping::new(Duration::from_secs(
                    config.typing_ttl_secs,
                ))),
            )
        }
    };

    let conversations: Arc<dyn ConversationStore> =
        Arc::new(ConversationRepository::new(pool.clone()));
    let messages: Arc<dyn MessageStore> = Arc::new(MessageRepository::new(pool.clone()));
    let users: Arc<dyn UserDirectory> = Arc::new(UserRepository::new(pool));
    let storage: Arc<dyn FileStorage> = Arc::new(LocalDiskStorage::new(&config.upload_dir));

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
        typing,
        users_online: users_online.clone(),
        rooms,
        fanout,
        storage,
        jwt_secret: config.jwt_secret.clone(),
        presence_ttl: Duration::from_secs(config.presence_ttl_secs),
    });

    monitoring::spawn_monitoring(monitoring::MonitorConfig::default(), users_online);

    let app = create_router(state);
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
