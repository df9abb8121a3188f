use async_trait::async_trait;
use bson::doc;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, IndexModel};
use quill_types::StreamId;

use crate::dbs::mongo::models::{MongoConversation, MongoMessage};
use crate::error::{PersistError, Result};
use crate::models::{ChatMessage, Conversation, SentMessage};
use crate::trait_client::ChatPersistence;

#[derive(Clone)]
pub struct MongoChatPersistence {
    conversations: Collection<MongoConversation>,
    messages: Collection<MongoMessage>,
}

impl MongoChatPersistence {
    pub fn new(client: &Client, db_name: &str) -> Self {
        let database = client.database(db_name);
        Self {
            conversations: database.collection("conversations"),
            messages: database.collection("messages"),
        }
    }

    /// Connect to MongoDB and create client
    pub async fn connect(mongodb_uri: &str, db_name: &str) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        Ok(Self::new(&client, db_name))
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        self.conversations
            .create_index(IndexModel::builder().keys(doc! { "user_id": 1 }).build())
            .await?;
        self.messages
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "conversation_id": 1, "seq": 1 })
                    .build(),
            )
            .await?;
        self.messages
            .create_index(IndexModel::builder().keys(doc! { "stream_id": 1 }).build())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ChatPersistence for MongoChatPersistence {
    async fn create_conversation(&self, user_id: &str, title: &str) -> Result<Conversation> {
        let conversation = Conversation::new(user_id, title);
        let document: MongoConversation = conversation.clone().into();
        self.conversations.insert_one(&document).await?;
        Ok(conversation)
    }

    async fn get_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>> {
        let document = self
            .conversations
            .find_one(doc! { "_id": conversation_id })
            .await?;
        Ok(document.map(Conversation::from))
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>> {
        let documents: Vec<MongoConversation> = self
            .conversations
            .find(doc! { "user_id": user_id })
            .sort(doc! { "last_message_at": -1 })
            .await?
            .try_collect()
            .await?;
        Ok(documents.into_iter().map(Conversation::from).collect())
    }

    async fn messages_in_conversation(&self, conversation_id: &str) -> Result<Vec<ChatMessage>> {
        let documents: Vec<MongoMessage> = self
            .messages
            .find(doc! { "conversation_id": conversation_id })
            .sort(MongoMessage::conversation_order())
            .await?
            .try_collect()
            .await?;
        Ok(documents.into_iter().map(ChatMessage::from).collect())
    }

    async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
        stream_id: StreamId,
    ) -> Result<SentMessage> {
        // Reserve two sequence numbers for the user and assistant messages
        let conversation = self
            .conversations
            .find_one_and_update(
                doc! { "_id": conversation_id },
                doc! {
                    "$set": { "last_message_at": bson::DateTime::from_chrono(Utc::now()) },
                    "$inc": { "message_count": 2_i64 },
                },
            )
            .return_document(ReturnDocument::After)
            .await?
            .ok_or_else(|| PersistError::ConversationNotFound(conversation_id.to_string()))?;
        let user_seq = conversation.message_count - 2;

        let user_message = ChatMessage::user(conversation_id, content);
        let assistant_message = ChatMessage::streaming_assistant(conversation_id, stream_id.clone());

        let sent = SentMessage {
            user_message_id: user_message.id.clone(),
            assistant_message_id: assistant_message.id.clone(),
            stream_id,
        };

        let documents = vec![
            MongoMessage::sequenced(user_message, user_seq),
            MongoMessage::sequenced(assistant_message, user_seq + 1),
        ];
        self.messages.insert_many(documents).await?;
        Ok(sent)
    }

    async fn message_by_stream_id(&self, stream_id: &StreamId) -> Result<Option<ChatMessage>> {
        let document = self
            .messages
            .find_one(doc! { "stream_id": stream_id.as_str() })
            .await?;
        Ok(document.map(ChatMessage::from))
    }

    async fn mark_stream_complete(&self, message_id: &str, final_text: &str) -> Result<()> {
        let result = self
            .messages
            .update_one(
                doc! { "_id": message_id },
                doc! { "$set": { "content": final_text, "is_streaming": false } },
            )
            .await?;
        if result.matched_count == 0 {
            return Err(PersistError::MessageNotFound(message_id.to_string()));
        }
        Ok(())
    }
}
