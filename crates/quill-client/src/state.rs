use quill_types::{StreamEvent, StreamStatus};

/// What a client currently shows for one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientState {
    pub text: String,
    pub status: StreamStatus,
    pub generation: u64,
    /// Chunk events received over every connection of one `attach`, applied or not
    pub chunk_events: u64,
    /// A chunk arrived that does not continue the local text
    pub needs_resync: bool,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            text: String::new(),
            status: StreamStatus::Pending,
            generation: 0,
            chunk_events: 0,
            needs_resync: false,
        }
    }
}

impl ClientState {
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Fold one server event into the local state
    ///
    /// Full-text events replace the text. A chunk is appended only when its
    /// base matches the local generation; chunks already covered are dropped,
    /// and a chunk from further ahead flags the state for a full resync.
    /// A terminal state is final.
    pub fn apply(&mut self, event: &StreamEvent) {
        if self.is_terminal() {
            return;
        }

        match event {
            StreamEvent::Snapshot {
                text,
                status,
                generation,
            } => {
                self.text.clone_from(text);
                self.status = *status;
                self.generation = *generation;
                self.needs_resync = false;
            }
            StreamEvent::Chunk {
                text,
                generation,
                base_generation,
            } => {
                self.chunk_events += 1;
                if *generation <= self.generation {
                    return;
                }
                if *base_generation != self.generation {
                    self.needs_resync = true;
                    return;
                }
                self.text.push_str(text);
                self.generation = *generation;
                self.status = StreamStatus::Streaming;
            }
            StreamEvent::Done { text, generation } => {
                self.finish(text, *generation, StreamStatus::Done);
            }
            StreamEvent::Error { text, generation } => {
                self.finish(text, *generation, StreamStatus::Error);
            }
        }
    }

    fn finish(&mut self, text: &str, generation: u64, status: StreamStatus) {
        self.text = text.to_string();
        self.generation = generation;
        self.status = status;
        self.needs_resync = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, base: u64, generation: u64) -> StreamEvent {
        StreamEvent::Chunk {
            text: text.to_string(),
            generation,
            base_generation: base,
        }
    }

    #[test]
    fn test_chunks_extend_snapshot() {
        let mut state = ClientState::default();
        state.apply(&StreamEvent::Snapshot {
            text: "He".to_string(),
            status: StreamStatus::Streaming,
            generation: 2,
        });
        state.apply(&chunk("l", 2, 3));
        state.apply(&chunk("lo", 3, 5));

        assert_eq!(state.text, "Hello");
        assert_eq!(state.generation, 5);
        assert_eq!(state.status, StreamStatus::Streaming);
        assert!(!state.needs_resync);
    }

    #[test]
    fn test_duplicate_chunk_is_not_appended_twice() {
        let mut state = ClientState::default();
        state.apply(&chunk("H", 0, 1));
        state.apply(&chunk("H", 0, 1));

        assert_eq!(state.text, "H");
        assert_eq!(state.chunk_events, 2);
    }

    #[test]
    fn test_gap_requests_resync_without_appending() {
        let mut state = ClientState::default();
        state.apply(&chunk("H", 0, 1));
        state.apply(&chunk("!", 2, 3));

        assert_eq!(state.text, "H");
        assert!(state.needs_resync);

        state.apply(&StreamEvent::Snapshot {
            text: "Hi!".to_string(),
            status: StreamStatus::Streaming,
            generation: 3,
        });
        assert_eq!(state.text, "Hi!");
        assert!(!state.needs_resync);
    }

    #[test]
    fn test_terminal_event_replaces_text_and_sticks() {
        let mut state = ClientState::default();
        state.apply(&chunk("Hel", 0, 1));
        state.apply(&StreamEvent::Error {
            text: "Sorry".to_string(),
            generation: 1,
        });
        state.apply(&chunk("lo", 1, 2));

        assert_eq!(state.text, "Sorry");
        assert_eq!(state.status, StreamStatus::Error);
        assert!(state.is_terminal());
    }
}
