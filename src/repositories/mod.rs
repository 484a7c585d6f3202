//! Repositories module - Coordinatore per tutti gli store del progetto
//!
//! Ogni repository gestisce le operazioni di database per una specifica
//! entità. I service dipendono solo dai trait in `traits`: il backend MySQL
//! (`conversation`, `message`, `user`) e quello in memoria (`memory`) sono
//! intercambiabili.

pub mod conversation;
pub mod memory;
pub mod message;
pub mod traits;
pub mod user;

// Re-esportazione dei trait per facilitare l'import
pub use traits::{ConversationStore, MessageStore, NewMessage, UserDirectory};

// Re-esportazione delle struct dei repository per facilitare l'import
pub use conversation::ConversationRepository;
pub use memory::MemoryBackend;
pub use message::MessageRepository;
pub use user::UserRepository;
