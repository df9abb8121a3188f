use chrono::{DateTime, Utc};
use quill_types::{StreamCursor, StreamId, StreamOutcome, StreamRead, StreamSnapshot, StreamStatus};
use serde::{Deserialize, Serialize};

/// Database-agnostic stream record
///
/// Holds the lifecycle rules shared by every backend. `offsets[g]` is the byte
/// length of `text` after generation `g`, so `offsets[0]` is always 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    pub id: StreamId,
    pub status: StreamStatus,
    pub text: String,
    pub generation: u64,
    pub offsets: Vec<usize>,
    /// Final text differs from the streamed text, suffix reads are invalid
    pub rewritten: bool,
    /// A producer has been started for this stream
    pub claimed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StreamRecord {
    pub fn new(id: StreamId) -> Self {
        let now = Utc::now();
        Self {
            id,
            status: StreamStatus::Pending,
            text: String::new(),
            generation: 0,
            offsets: vec![0],
            rewritten: false,
            claimed: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Take the single producer slot. Only a pending, unclaimed stream can be claimed.
    pub fn claim(&mut self) -> bool {
        if self.status != StreamStatus::Pending || self.claimed {
            return false;
        }
        self.claimed = true;
        self.updated_at = Utc::now();
        true
    }

    /// Append a chunk, returning the new generation
    ///
    /// Fails with the current status when the stream is terminal; the record
    /// is left untouched in that case.
    pub fn append(&mut self, chunk: &str) -> std::result::Result<u64, StreamStatus> {
        if self.status.is_terminal() {
            return Err(self.status);
        }

        self.status = StreamStatus::Streaming;
        self.text.push_str(chunk);
        self.generation += 1;
        self.offsets.push(self.text.len());
        self.updated_at = Utc::now();
        Ok(self.generation)
    }

    /// Move to a terminal status and freeze the text
    ///
    /// Returns false (and changes nothing) when the stream is already terminal.
    pub fn finalize(&mut self, final_text: &str, outcome: StreamOutcome) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        if self.text != final_text {
            self.rewritten = true;
            self.text = final_text.to_string();
        }
        self.status = outcome.into();
        self.updated_at = Utc::now();
        true
    }

    /// Read the whole text, or only the suffix after `from_generation` when it can be served
    pub fn read(&self, from_generation: Option<u64>) -> StreamRead {
        if let Some(from) = from_generation {
            if let Some(start) = self.suffix_start(from) {
                return StreamRead {
                    text: self.text[start..].to_string(),
                    status: self.status,
                    generation: self.generation,
                    is_delta: true,
                };
            }
        }

        StreamRead {
            text: self.text.clone(),
            status: self.status,
            generation: self.generation,
            is_delta: false,
        }
    }

    fn suffix_start(&self, from: u64) -> Option<usize> {
        if self.rewritten || from > self.generation {
            return None;
        }
        let start = *self.offsets.get(usize::try_from(from).ok()?)?;
        // Offsets are chunk boundaries, so this only fails on a corrupted record
        self.text.is_char_boundary(start).then_some(start)
    }

    pub fn snapshot(&self) -> StreamSnapshot {
        StreamSnapshot {
            id: self.id.clone(),
            text: self.text.clone(),
            status: self.status,
            generation: self.generation,
        }
    }

    pub fn cursor(&self) -> StreamCursor {
        StreamCursor {
            generation: self.generation,
            status: self.status,
        }
    }
}
