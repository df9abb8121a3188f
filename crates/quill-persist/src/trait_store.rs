use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_types::{StreamCursor, StreamId, StreamOutcome, StreamRead, StreamSnapshot};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Interval, MissedTickBehavior};

use crate::error::Result;

/// Durable, concurrency-safe storage for streams
///
/// Writes are serialized per stream id. Readers always get a consistent
/// snapshot and never wait on a producer.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Allocate a new pending stream with empty text
    async fn create_stream(&self) -> Result<StreamId>;

    /// Atomically take the producer slot of a pending stream
    ///
    /// Returns false when the stream is no longer pending or was already claimed.
    async fn claim(&self, id: &StreamId) -> Result<bool>;

    /// Append a chunk and return the new generation
    ///
    /// Fails with `InvalidState` once the stream is terminal.
    async fn append_chunk(&self, id: &StreamId, chunk: &str) -> Result<u64>;

    /// Freeze the stream with its final text and outcome
    ///
    /// Finalizing an already terminal stream is a no-op returning the existing state.
    async fn finalize(
        &self,
        id: &StreamId,
        final_text: &str,
        outcome: StreamOutcome,
    ) -> Result<StreamSnapshot>;

    /// Current text (or suffix after `from_generation`), status and generation
    async fn read(&self, id: &StreamId, from_generation: Option<u64>) -> Result<StreamRead>;

    /// Change notifications for long-lived readers
    async fn subscribe(&self, id: &StreamId) -> Result<ChangeFeed>;

    /// Non-terminal streams not touched since `idle_since`
    async fn list_stale(&self, idle_since: DateTime<Utc>) -> Result<Vec<StreamId>>;
}

/// Wakes a follower when a stream may have changed
///
/// Backends with in-process notification push cursors through a watch
/// channel; the others are polled on a fixed interval.
pub enum ChangeFeed {
    Push(watch::Receiver<StreamCursor>),
    Poll(Interval),
}

impl ChangeFeed {
    pub fn poll(every: Duration) -> Self {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ChangeFeed::Poll(interval)
    }

    /// Wait for the next change. Returns false once the feed is closed.
    pub async fn changed(&mut self) -> bool {
        match self {
            ChangeFeed::Push(rx) => rx.changed().await.is_ok(),
            ChangeFeed::Poll(interval) => {
                interval.tick().await;
                true
            }
        }
    }
}
