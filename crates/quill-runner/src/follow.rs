use futures::Stream;
use quill_persist::{ChangeFeed, StreamStore};
use quill_types::{StreamEvent, StreamId};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowMode {
    /// Emit what is there now and stop
    Snapshot,
    /// Keep emitting appended text until the stream is terminal
    Live,
}

/// Turn a stream's stored state into events for one attached reader
///
/// The first event is a `Snapshot` (or a `Chunk` when the reader resumes from
/// a generation the store can still serve as a suffix). Later reads are
/// incremental from the last generation emitted, so each chunk reaches the
/// reader once per attachment. A terminal stream always ends with a `Done` or
/// `Error` event carrying the full final text.
///
/// `feed` must be obtained before this is called so no change between
/// subscribing and the first read is missed. Dropping the returned stream
/// only releases this reader.
pub fn follow_stream(
    streams: Arc<dyn StreamStore>,
    stream_id: StreamId,
    mut feed: ChangeFeed,
    from_generation: Option<u64>,
    mode: FollowMode,
) -> impl Stream<Item = StreamEvent> + Send + 'static {
    async_stream::stream! {
        let mut seen = from_generation;

        loop {
            let read = match streams.read(&stream_id, seen).await {
                Ok(read) => read,
                Err(e) => {
                    tracing::warn!(stream_id = %stream_id, error = %e, "Stream read failed, detaching reader");
                    break;
                }
            };

            if read.status.is_terminal() {
                let full = if read.is_delta {
                    match streams.read(&stream_id, None).await {
                        Ok(full) => full,
                        Err(e) => {
                            tracing::warn!(stream_id = %stream_id, error = %e, "Stream read failed, detaching reader");
                            break;
                        }
                    }
                } else {
                    read
                };
                yield StreamEvent::from_full_read(full);
                break;
            }

            match seen {
                Some(base) if read.is_delta => {
                    if read.generation > base {
                        yield StreamEvent::Chunk {
                            text: read.text,
                            generation: read.generation,
                            base_generation: base,
                        };
                    }
                }
                _ => yield StreamEvent::from_full_read(read.clone()),
            }
            seen = Some(read.generation);

            if mode == FollowMode::Snapshot {
                break;
            }

            if !feed.changed().await {
                tracing::debug!(stream_id = %stream_id, "Change feed closed, detaching reader");
                break;
            }
        }
    }
}
