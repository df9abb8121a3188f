use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use quill_types::{StreamId, StreamStatus};
use serde::{Deserialize, Serialize};

use crate::models::{ChatMessage, Conversation, MessageRole, StreamRecord};

/// MongoDB-specific stream document
///
/// Counters are stored as i64 since BSON has no unsigned integers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStream {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: StreamStatus,
    pub text: String,
    pub generation: i64,
    pub offsets: Vec<i64>,
    pub rewritten: bool,
    pub claimed: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

/// MongoDB-specific conversation document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoConversation {
    #[serde(rename = "_id")]
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub last_message_at: DateTime<Utc>,
    /// Messages ever inserted, source of `MongoMessage::seq`
    #[serde(default)]
    pub message_count: i64,
}

/// MongoDB-specific message document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoMessage {
    #[serde(rename = "_id")]
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
    pub is_streaming: bool,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    /// Position in the conversation; breaks millisecond ties on `created_at`
    #[serde(default)]
    pub seq: i64,
}

impl MongoMessage {
    pub fn sequenced(message: ChatMessage, seq: i64) -> Self {
        Self {
            seq,
            ..MongoMessage::from(message)
        }
    }

    /// Sort order for listing a conversation
    pub fn conversation_order() -> Document {
        doc! { "seq": 1, "created_at": 1 }
    }
}

// Conversions between database-agnostic and MongoDB-specific models

impl From<StreamRecord> for MongoStream {
    fn from(record: StreamRecord) -> Self {
        Self {
            id: record.id.into_inner(),
            status: record.status,
            text: record.text,
            generation: record.generation as i64,
            offsets: record.offsets.into_iter().map(|o| o as i64).collect(),
            rewritten: record.rewritten,
            claimed: record.claimed,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<MongoStream> for StreamRecord {
    fn from(doc: MongoStream) -> Self {
        Self {
            id: StreamId::from(doc.id),
            status: doc.status,
            text: doc.text,
            generation: doc.generation.max(0) as u64,
            offsets: doc.offsets.into_iter().map(|o| o.max(0) as usize).collect(),
            rewritten: doc.rewritten,
            claimed: doc.claimed,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

impl From<Conversation> for MongoConversation {
    fn from(conversation: Conversation) -> Self {
        Self {
            id: conversation.id,
            user_id: conversation.user_id,
            title: conversation.title,
            last_message_at: conversation.last_message_at,
            message_count: 0,
        }
    }
}

impl From<MongoConversation> for Conversation {
    fn from(doc: MongoConversation) -> Self {
        Self {
            id: doc.id,
            user_id: doc.user_id,
            title: doc.title,
            last_message_at: doc.last_message_at,
        }
    }
}

impl From<ChatMessage> for MongoMessage {
    fn from(message: ChatMessage) -> Self {
        Self {
            id: message.id,
            conversation_id: message.conversation_id,
            role: message.role,
            content: message.content,
            stream_id: message.stream_id.map(StreamId::into_inner),
            is_streaming: message.is_streaming,
            created_at: message.created_at,
            seq: 0,
        }
    }
}

impl From<MongoMessage> for ChatMessage {
    fn from(doc: MongoMessage) -> Self {
        Self {
            id: doc.id,
            conversation_id: doc.conversation_id,
            role: doc.role,
            content: doc.content,
            stream_id: doc.stream_id.map(StreamId::from),
            is_streaming: doc.is_streaming,
            created_at: doc.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_millisecond_messages_keep_send_order() {
        let stream_id = StreamId::new();
        let user = ChatMessage::user("c1", "Hello");
        let mut assistant = ChatMessage::streaming_assistant("c1", stream_id);
        assistant.created_at = user.created_at;

        let mut documents = vec![
            MongoMessage::sequenced(assistant, 1),
            MongoMessage::sequenced(user, 0),
        ];
        documents.sort_by_key(|d| (d.seq, d.created_at));

        assert_eq!(documents[0].role, MessageRole::User);
        assert_eq!(documents[1].role, MessageRole::Assistant);
        assert_eq!(
            MongoMessage::conversation_order().keys().next().map(String::as_str),
            Some("seq")
        );
    }

    #[test]
    fn test_legacy_message_without_seq_deserializes() {
        let document = doc! {
            "_id": "m1",
            "conversation_id": "c1",
            "role": "user",
            "content": "Hi",
            "is_streaming": false,
            "created_at": bson::DateTime::now(),
        };

        let message: MongoMessage = bson::from_document(document).unwrap();
        assert_eq!(message.seq, 0);
    }
}
