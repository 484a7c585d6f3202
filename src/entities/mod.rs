//! Entities module - Entità del dominio mappate sulle tabelle

pub mod conversation;
pub mod enums;
pub mod message;
pub mod user;

// Re-exports per facilitare l'import
pub use conversation::Conversation;
pub use enums::{MessageStatus, MessageType};
pub use message::Message;
pub use user::UserAccount;
