//! Helper condivisi dai test di integrazione.
//!
//! La suite gira interamente sul backend in memoria: stesso contratto di
//! atomicità dello store MySQL, nessun servizio esterno richiesto.

#![allow(dead_code)]

use axum_test::TestServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use wirechat::core::AppState;
use wirechat::entities::UserAccount;
use wirechat::repositories::MemoryBackend;

pub const TEST_JWT_SECRET: &str = "ilmiobellissimosegretochevaassolutamentecambiato";

/// Stato applicativo in memoria più il backend per il seeding diretto.
pub fn setup() -> (Arc<AppState>, MemoryBackend) {
    AppState::in_memory(TEST_JWT_SECRET)
}

pub fn create_test_server(state: Arc<AppState>) -> TestServer {
    let app = wirechat::create_router(state);
    TestServer::new(app).expect("Failed to create test server")
}

/// Token JWT valido 24 ore per l'utente dato.
pub fn create_test_jwt(user: &UserAccount) -> String {
    wirechat::auth::encode_jwt(user.username.clone(), user.user_id, TEST_JWT_SECRET)
        .expect("Failed to create JWT token")
}

/// Avvia il server su una porta effimera per i test WebSocket.
pub async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Failed to read local addr");
    let app = wirechat::create_router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Test server failed");
    });
    addr
}
