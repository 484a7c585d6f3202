//! DTOs module - Data Transfer Objects
//!
//! I DTOs separano la rappresentazione esterna (API e gateway) dalla
//! rappresentazione interna (entities).

pub mod conversation;
pub mod message;
pub mod query;
pub mod ws_event;

// Re-exports per facilitare l'import
pub use conversation::{
    ConversationPage, ConversationSummaryDTO, OnlineStatusDTO, PeerDTO, UnreadTotal,
};
pub use message::{MarkReadResponse, MessageDTO, MessagePage, SendMessageRequest};
pub use query::{BulkStatusRequest, Pagination};
pub use ws_event::{ClientEvent, ServerEvent};
