//! chatterm-engine: Chat state and streaming transport for chatterm
//!
//! This crate is the collaborator the terminal widget talks to:
//! - Message model (roles and typed parts)
//! - UI message stream decoding (SSE framing, chunk assembly)
//! - HTTP transport for a streaming chat endpoint
//! - Chat session with observable conversation, status and error
//! - Configuration

pub mod config;
pub mod message;
pub mod session;
pub mod stream;
pub mod transport;

// Re-export commonly used types
pub use config::{ChatConfig, ConfigError, ThemeName, UiConfig, ENDPOINT_ENV};
pub use message::{generate_id, MessagePart, PartState, Role, UiMessage};
pub use session::{ChatController, ChatSession, ChatStatus, Conversation};
pub use stream::{parse_chunk, MessageAssembler, SseDecoder, SseEvent, StreamOutcome, UiStreamChunk};
pub use transport::{ChatError, ChatRequest, ChatTransport, ChunkStream, HttpChatTransport, Trigger};

/// Returns the engine version.
pub fn engine_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
