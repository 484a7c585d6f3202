//! Services module - Orchestrazione di dominio e handler HTTP
//!
//! `messaging` contiene la logica condivisa tra REST e gateway; gli altri
//! moduli espongono gli handler axum montati dal router.

pub mod chat;
pub mod messaging;
pub mod status;
pub mod upload;

pub use messaging::MessagingService;
