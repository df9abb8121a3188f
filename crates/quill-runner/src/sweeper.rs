use chrono::Utc;
use quill_persist::{ChatPersistence, PersistError, StreamStore};
use quill_types::StreamOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::runner::notify_completion;

/// Finalizes streams nobody is producing anymore
///
/// A stream can be left pending when no driver ever attaches, or streaming
/// when the process running its producer dies. Any active stream idle for
/// longer than `stale_after` is finalized as an error.
pub struct StreamSweeper {
    streams: Arc<dyn StreamStore>,
    chat: Arc<dyn ChatPersistence>,
    stale_after: Duration,
    interval: Duration,
    error_text: String,
}

impl StreamSweeper {
    pub fn new(
        streams: Arc<dyn StreamStore>,
        chat: Arc<dyn ChatPersistence>,
        stale_after: Duration,
        interval: Duration,
        error_text: impl Into<String>,
    ) -> Self {
        Self {
            streams,
            chat,
            stale_after,
            interval,
            error_text: error_text.into(),
        }
    }

    /// Run one pass, returning how many streams were finalized
    pub async fn sweep_once(&self) -> Result<usize, PersistError> {
        let stale_after = chrono::Duration::from_std(self.stale_after)
            .map_err(|e| PersistError::Internal(format!("Invalid stale_after: {}", e)))?;
        let cutoff = Utc::now() - stale_after;

        let stale = self.streams.list_stale(cutoff).await?;
        let mut swept = 0;

        for id in stale {
            let snapshot = self
                .streams
                .finalize(&id, &self.error_text, StreamOutcome::Error)
                .await?;
            tracing::warn!(
                stream_id = %id,
                status = %snapshot.status,
                generation = snapshot.generation,
                "Finalized stale stream"
            );
            notify_completion(self.chat.as_ref(), &snapshot).await;
            swept += 1;
        }

        Ok(swept)
    }

    /// Sweep on a fixed interval until the returned handle is aborted
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::info!(
                stale_after_secs = self.stale_after.as_secs(),
                interval_secs = self.interval.as_secs(),
                "Stream sweeper started"
            );

            loop {
                ticker.tick().await;
                match self.sweep_once().await {
                    Ok(0) => {}
                    Ok(count) => tracing::info!(count, "Swept stale streams"),
                    Err(e) => tracing::error!(error = %e, "Stream sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quill_persist::{MemoryChatPersistence, MemoryStreamStore};
    use quill_types::StreamStatus;

    #[tokio::test]
    async fn test_sweep_finalizes_idle_streams_and_completes_message() {
        let streams = Arc::new(MemoryStreamStore::new());
        let chat = Arc::new(MemoryChatPersistence::new());

        let conversation = chat.create_conversation("u1", "Test").await.unwrap();
        let stream_id = streams.create_stream().await.unwrap();
        let sent = chat
            .send_message(&conversation.id, "hi", stream_id.clone())
            .await
            .unwrap();
        streams.append_chunk(&stream_id, "Hel").await.unwrap();

        let sweeper = StreamSweeper::new(
            streams.clone(),
            chat.clone(),
            Duration::ZERO,
            Duration::from_secs(60),
            "Sorry",
        );
        // Let updated_at fall strictly behind the cutoff
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert_eq!(sweeper.sweep_once().await.unwrap(), 1);

        let read = streams.read(&stream_id, None).await.unwrap();
        assert_eq!(read.status, StreamStatus::Error);
        assert_eq!(read.text, "Sorry");

        let message = chat.message_by_stream_id(&stream_id).await.unwrap().unwrap();
        assert_eq!(message.id, sent.assistant_message_id);
        assert_eq!(message.content, "Sorry");
        assert!(!message.is_streaming);

        // Terminal streams are not swept again
        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_leaves_recent_streams_alone() {
        let streams = Arc::new(MemoryStreamStore::new());
        let chat = Arc::new(MemoryChatPersistence::new());
        let stream_id = streams.create_stream().await.unwrap();

        let sweeper = StreamSweeper::new(
            streams.clone(),
            chat,
            Duration::from_secs(600),
            Duration::from_secs(60),
            "Sorry",
        );

        assert_eq!(sweeper.sweep_once().await.unwrap(), 0);
        let read = streams.read(&stream_id, None).await.unwrap();
        assert_eq!(read.status, StreamStatus::Pending);
    }
}
