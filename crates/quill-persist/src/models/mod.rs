mod chat;
mod stream;

// Export database-agnostic models
pub use chat::{ChatMessage, Conversation, MessageRole, SentMessage};
pub use stream::StreamRecord;
