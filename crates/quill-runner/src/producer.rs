use anyhow::Result;
use async_trait::async_trait;
use quill_persist::{ChatPersistence, StreamStore};
use quill_types::StreamId;
use std::sync::Arc;

/// Everything a producer may look at while generating
#[derive(Clone)]
pub struct ProduceContext {
    pub stream_id: StreamId,
    /// Opaque request payload forwarded by the transport
    pub payload: serde_json::Value,
    /// Read access to conversations and messages
    pub chat: Arc<dyn ChatPersistence>,
}

/// Hands produced chunks to the stream store
#[derive(Clone)]
pub struct ChunkAppender {
    streams: Arc<dyn StreamStore>,
    stream_id: StreamId,
}

impl ChunkAppender {
    pub fn new(streams: Arc<dyn StreamStore>, stream_id: StreamId) -> Self {
        Self { streams, stream_id }
    }

    /// Append one chunk, returning the stream generation after it
    ///
    /// Fails with `InvalidState` if the stream was finalized underneath the
    /// producer; producers should stop on any error.
    pub async fn append(&self, chunk: &str) -> quill_persist::Result<u64> {
        self.streams.append_chunk(&self.stream_id, chunk).await
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }
}

/// Content generator driven by the runner
///
/// Calls `appender.append` as many times as it likes, with any chunk size and
/// pacing, and returns the final text. The final text may differ from the
/// concatenated chunks (trimmed, normalized). Returning an error finalizes the
/// stream as failed.
#[async_trait]
pub trait Producer: Send + Sync {
    async fn produce(&self, ctx: ProduceContext, appender: ChunkAppender) -> Result<String>;

    /// Short name used in logs
    fn name(&self) -> &str {
        "producer"
    }
}
