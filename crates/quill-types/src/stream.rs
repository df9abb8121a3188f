use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque, immutable identifier of a stream
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    /// Allocate a fresh random id
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Default for StreamId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for StreamId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for StreamId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Lifecycle of a stream: `pending → streaming → {done, error}`
///
/// `pending → {done, error}` is allowed when the producer fails before its
/// first chunk. Nothing ever leaves a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Pending,
    Streaming,
    Done,
    Error,
}

impl StreamStatus {
    /// `done` or `error`
    pub fn is_terminal(self) -> bool {
        matches!(self, StreamStatus::Done | StreamStatus::Error)
    }

    /// Still accepting chunks
    pub fn is_active(self) -> bool {
        !self.is_terminal()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StreamStatus::Pending => "pending",
            StreamStatus::Streaming => "streaming",
            StreamStatus::Done => "done",
            StreamStatus::Error => "error",
        }
    }

    /// Whether `self → next` is a legal lifecycle step
    pub fn can_transition_to(self, next: StreamStatus) -> bool {
        match (self, next) {
            (StreamStatus::Pending, _) => next != StreamStatus::Pending,
            (StreamStatus::Streaming, StreamStatus::Done | StreamStatus::Error) => true,
            _ => false,
        }
    }
}

impl fmt::Display for StreamStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(StreamStatus::Pending),
            "streaming" => Ok(StreamStatus::Streaming),
            "done" => Ok(StreamStatus::Done),
            "error" => Ok(StreamStatus::Error),
            other => Err(format!("Unknown stream status: {}", other)),
        }
    }
}

/// Terminal outcome passed to `finalize`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamOutcome {
    Done,
    Error,
}

impl From<StreamOutcome> for StreamStatus {
    fn from(outcome: StreamOutcome) -> Self {
        match outcome {
            StreamOutcome::Done => StreamStatus::Done,
            StreamOutcome::Error => StreamStatus::Error,
        }
    }
}

/// Full point-in-time view of a stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamSnapshot {
    pub id: StreamId,
    pub text: String,
    pub status: StreamStatus,
    pub generation: u64,
}

/// Result of a read
///
/// When `is_delta` is true, `text` only holds what was appended after the
/// generation the reader asked for. Otherwise it is the whole text and the
/// reader must replace whatever it had.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamRead {
    pub text: String,
    pub status: StreamStatus,
    pub generation: u64,
    pub is_delta: bool,
}

/// Published on every change so followers know when to read again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamCursor {
    pub generation: u64,
    pub status: StreamStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_transitions() {
        assert!(StreamStatus::Pending.can_transition_to(StreamStatus::Streaming));
        assert!(StreamStatus::Pending.can_transition_to(StreamStatus::Error));
        assert!(StreamStatus::Streaming.can_transition_to(StreamStatus::Done));
        assert!(!StreamStatus::Streaming.can_transition_to(StreamStatus::Pending));
        assert!(!StreamStatus::Done.can_transition_to(StreamStatus::Error));
        assert!(!StreamStatus::Error.can_transition_to(StreamStatus::Streaming));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&StreamStatus::Streaming).unwrap();
        assert_eq!(json, "\"streaming\"");

        let parsed: StreamStatus = "done".parse().unwrap();
        assert_eq!(parsed, StreamStatus::Done);
        assert!("finished".parse::<StreamStatus>().is_err());
    }

    #[test]
    fn test_stream_id_is_transparent() {
        let id = StreamId::from("abc");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"abc\"");
        assert_ne!(StreamId::new(), StreamId::new());
    }

    #[test]
    fn test_read_uses_camel_case() {
        let read = StreamRead {
            text: "Hi".to_string(),
            status: StreamStatus::Streaming,
            generation: 2,
            is_delta: false,
        };

        let json = serde_json::to_string(&read).unwrap();
        assert!(json.contains("\"isDelta\":false"));
    }
}
