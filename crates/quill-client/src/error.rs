use quill_types::StreamId;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Stream not found: {0}")]
    NotFound(StreamId),

    #[error("Server responded with {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Failed to decode event: {0}")]
    Decode(String),

    #[error("Connection closed before the stream finished")]
    Disconnected,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ClientError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ClientError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
