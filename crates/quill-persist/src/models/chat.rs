use chrono::{DateTime, Utc};
use quill_types::{StreamId, StreamStatus};
use serde::{Deserialize, Serialize};

/// Database-agnostic conversation model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub last_message_at: DateTime<Utc>,
}

impl Conversation {
    pub fn new(user_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.into(),
            title: title.into(),
            last_message_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

/// Database-agnostic chat message model
///
/// While `stream_id` points at a live stream, the stream text is the
/// authoritative content. `content` is the final snapshot written once the
/// stream completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub stream_id: Option<StreamId>,
    pub is_streaming: bool,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(conversation_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role: MessageRole::User,
            content: content.into(),
            stream_id: None,
            is_streaming: false,
            created_at: Utc::now(),
        }
    }

    /// Empty assistant message bound to a stream that has not produced anything yet
    pub fn streaming_assistant(conversation_id: impl Into<String>, stream_id: StreamId) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            role: MessageRole::Assistant,
            content: String::new(),
            stream_id: Some(stream_id),
            is_streaming: true,
            created_at: Utc::now(),
        }
    }

    /// Text to show for this message given the live stream state, if any
    ///
    /// Live text wins only while the stream is actually streaming and has
    /// produced something; otherwise the stored content is used.
    pub fn display_text<'a>(&'a self, live: Option<(&'a str, StreamStatus)>) -> &'a str {
        match live {
            Some((text, StreamStatus::Streaming)) if !text.is_empty() => text,
            _ => &self.content,
        }
    }

    /// Record the final stream text and clear the streaming flag
    pub fn complete(&mut self, final_text: &str) {
        self.content = final_text.to_string();
        self.is_streaming = false;
    }
}

/// Ids produced by sending a user message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentMessage {
    pub user_message_id: String,
    pub assistant_message_id: String,
    pub stream_id: StreamId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_text_prefers_live_stream() {
        let message = ChatMessage::streaming_assistant("c1", StreamId::from("s1"));

        assert_eq!(message.display_text(Some(("Hel", StreamStatus::Streaming))), "Hel");
        assert_eq!(message.display_text(Some(("", StreamStatus::Pending))), "");
        assert_eq!(message.display_text(None), "");
    }

    #[test]
    fn test_display_text_uses_content_once_complete() {
        let mut message = ChatMessage::streaming_assistant("c1", StreamId::from("s1"));
        message.complete("Hi!");

        assert!(!message.is_streaming);
        assert_eq!(message.display_text(Some(("Hi", StreamStatus::Done))), "Hi!");
    }
}
