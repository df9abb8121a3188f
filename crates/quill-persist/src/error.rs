use quill_types::{StreamId, StreamStatus};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    #[cfg(feature = "mongodb")]
    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Stream not found: {0}")]
    StreamNotFound(StreamId),

    #[error("Stream {id} is {status} and no longer accepts chunks")]
    InvalidState { id: StreamId, status: StreamStatus },

    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PersistError {
    /// Unknown stream, conversation or message
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            PersistError::StreamNotFound(_)
                | PersistError::ConversationNotFound(_)
                | PersistError::MessageNotFound(_)
        )
    }

    /// A write raced a terminal transition (duplicate producer or late chunk)
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, PersistError::InvalidState { .. })
    }
}

pub type Result<T> = std::result::Result<T, PersistError>;
