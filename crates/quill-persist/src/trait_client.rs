use async_trait::async_trait;
use quill_types::StreamId;

use crate::error::Result;
use crate::models::{ChatMessage, Conversation, SentMessage};

/// Conversation and message persistence consumed by the streaming core
///
/// Implementations provide database-specific storage. `mark_stream_complete`
/// must be idempotent since completion can be signalled more than once.
#[async_trait]
pub trait ChatPersistence: Send + Sync {
    /// Create a new conversation
    async fn create_conversation(&self, user_id: &str, title: &str) -> Result<Conversation>;

    /// Get a conversation by ID
    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    /// List conversations for a user, most recently active first
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>>;

    /// All messages of a conversation in creation order
    async fn messages_in_conversation(&self, conversation_id: &str) -> Result<Vec<ChatMessage>>;

    /// Store a user message and the streaming assistant message answering it
    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        stream_id: StreamId,
    ) -> Result<SentMessage>;

    /// The message bound to a stream, if any
    async fn message_by_stream_id(&self, stream_id: &StreamId) -> Result<Option<ChatMessage>>;

    /// Write the final text of a stream into its message and clear the streaming flag
    async fn mark_stream_complete(&self, message_id: &str, final_text: &str) -> Result<()>;
}
