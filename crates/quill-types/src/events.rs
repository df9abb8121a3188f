use serde::{Deserialize, Serialize};

use crate::stream::{StreamRead, StreamStatus};

/// Event sent to an attached client
///
/// `Snapshot` and the terminal variants always carry the full text and replace
/// whatever the client holds. `Chunk` carries only the text appended between
/// `base_generation` and `generation`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Whole text accumulated so far (sent on attach and after a rewrite)
    Snapshot {
        text: String,
        status: StreamStatus,
        generation: u64,
    },

    /// Text appended since `base_generation`
    Chunk {
        text: String,
        generation: u64,
        #[serde(rename = "baseGeneration")]
        base_generation: u64,
    },

    /// Stream finished successfully, `text` is the frozen final text
    Done {
        text: String,
        generation: u64,
    },

    /// Producer failed, `text` is the user-facing error text
    Error {
        text: String,
        generation: u64,
    },
}

impl StreamEvent {
    /// Full-replacement event for a non-delta read
    pub fn from_full_read(read: StreamRead) -> Self {
        let StreamRead { text, status, generation, .. } = read;
        match status {
            StreamStatus::Done => StreamEvent::Done { text, generation },
            StreamStatus::Error => StreamEvent::Error { text, generation },
            _ => StreamEvent::Snapshot { text, status, generation },
        }
    }

    /// SSE event name
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::Snapshot { .. } => "snapshot",
            StreamEvent::Chunk { .. } => "chunk",
            StreamEvent::Done { .. } => "done",
            StreamEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
