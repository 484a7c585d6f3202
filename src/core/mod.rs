//! Core module - Fondamenta condivise dell'applicazione
//!
//! Configurazione, autenticazione, errore applicativo uniforme e stato
//! condiviso. Tutto il resto del crate dipende da qui, mai il contrario.

pub mod auth;
pub mod config;
pub mod error;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use state::AppState;
