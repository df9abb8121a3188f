use async_trait::async_trait;
use chrono::Utc;
use quill_types::StreamId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::error::{PersistError, Result};
use crate::models::{ChatMessage, Conversation, SentMessage};
use crate::trait_client::ChatPersistence;

#[derive(Default)]
struct ChatTables {
    conversations: HashMap<String, Conversation>,
    // Insertion order doubles as creation order
    messages: Vec<ChatMessage>,
}

/// In-process conversation and message storage
#[derive(Clone, Default)]
pub struct MemoryChatPersistence {
    tables: Arc<RwLock<ChatTables>>,
}

impl MemoryChatPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChatPersistence for MemoryChatPersistence {
    async fn create_conversation(&self, user_id: &str, title: &str) -> Result<Conversation> {
        let conversation = Conversation::new(user_id, title);
        let mut tables = self.tables.write().await;
        tables
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(conversation)
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let tables = self.tables.read().await;
        Ok(tables.conversations.get(conversation_id).cloned())
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let tables = self.tables.read().await;
        let mut conversations: Vec<Conversation> = tables
            .conversations
            .values()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect();
        conversations.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
        Ok(conversations)
    }

    async fn messages_in_conversation(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .filter(|m| m.conversation_id == conversation_id)
            .cloned()
            .collect())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        stream_id: StreamId,
    ) -> Result<SentMessage> {
        let mut tables = self.tables.write().await;

        let conversation = tables
            .conversations
            .get_mut(conversation_id)
            .ok_or_else(|| PersistError::ConversationNotFound(conversation_id.to_string()))?;
        conversation.last_message_at = Utc::now();

        let user_message = ChatMessage::user(conversation_id, content);
        let assistant_message = ChatMessage::streaming_assistant(conversation_id, stream_id.clone());

        let sent = SentMessage {
            user_message_id: user_message.id.clone(),
            assistant_message_id: assistant_message.id.clone(),
            stream_id,
        };

        tables.messages.push(user_message);
        tables.messages.push(assistant_message);
        Ok(sent)
    }

    async fn message_by_stream_id(&self, stream_id: &StreamId) -> Result<Option<ChatMessage>> {
        let tables = self.tables.read().await;
        Ok(tables
            .messages
            .iter()
            .find(|m| m.stream_id.as_ref() == Some(stream_id))
            .cloned())
    }

    async fn mark_stream_complete(&self, message_id: &str, final_text: &str) -> Result<()> {
        let mut tables = self.tables.write().await;
        let message = tables
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| PersistError::MessageNotFound(message_id.to_string()))?;
        message.complete(final_text);
        Ok(())
    }
}
