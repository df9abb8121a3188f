use quill_persist::{ChatPersistence, PersistError, StreamStore};
use quill_types::{StreamId, StreamOutcome, StreamSnapshot};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

use crate::error::RunError;
use crate::producer::{ChunkAppender, ProduceContext, Producer};

pub const DEFAULT_ERROR_TEXT: &str = "Sorry, something went wrong while generating this response.";

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Upper bound for one producer run
    pub producer_timeout: Duration,
    /// Final text written to streams whose producer failed
    pub error_text: String,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            producer_timeout: Duration::from_secs(120),
            error_text: DEFAULT_ERROR_TEXT.to_string(),
        }
    }
}

/// Result of a finished run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub snapshot: StreamSnapshot,
    pub duration_ms: u64,
}

/// What `start` did
#[derive(Debug)]
pub enum RunStart {
    /// This call claimed the stream; the run continues in the background
    Started(JoinHandle<Result<RunReport, RunError>>),
    /// Another caller already owns the stream's producer
    AlreadyClaimed,
}

impl RunStart {
    pub fn is_started(&self) -> bool {
        matches!(self, RunStart::Started(_))
    }
}

/// Bridges a `Producer` to the stream store
///
/// A run is owned by its own task, not by the request that started it, so a
/// client disconnect never stops production. Every run ends with a
/// `finalize`, whatever the producer does.
pub struct StreamProducerRunner {
    streams: Arc<dyn StreamStore>,
    chat: Arc<dyn ChatPersistence>,
    producer: Arc<dyn Producer>,
    config: RunnerConfig,
}

impl StreamProducerRunner {
    pub fn new(
        streams: Arc<dyn StreamStore>,
        chat: Arc<dyn ChatPersistence>,
        producer: Arc<dyn Producer>,
        config: RunnerConfig,
    ) -> Self {
        Self {
            streams,
            chat,
            producer,
            config,
        }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Claim the stream and spawn its producer
    ///
    /// Only the caller that wins the claim starts a run; everyone else gets
    /// `AlreadyClaimed` and should read the stream instead.
    pub async fn start(
        &self,
        stream_id: &StreamId,
        payload: serde_json::Value,
    ) -> Result<RunStart, PersistError> {
        if !self.streams.claim(stream_id).await? {
            tracing::debug!(stream_id = %stream_id, "Stream already claimed, not starting a producer");
            return Ok(RunStart::AlreadyClaimed);
        }

        tracing::info!(
            stream_id = %stream_id,
            producer = self.producer.name(),
            "Starting producer"
        );

        let handle = tokio::spawn(Self::execute(
            Arc::clone(&self.streams),
            Arc::clone(&self.chat),
            Arc::clone(&self.producer),
            self.config.clone(),
            stream_id.clone(),
            payload,
        ));

        Ok(RunStart::Started(handle))
    }

    async fn execute(
        streams: Arc<dyn StreamStore>,
        chat: Arc<dyn ChatPersistence>,
        producer: Arc<dyn Producer>,
        config: RunnerConfig,
        stream_id: StreamId,
        payload: serde_json::Value,
    ) -> Result<RunReport, RunError> {
        let start_time = Instant::now();

        let ctx = ProduceContext {
            stream_id: stream_id.clone(),
            payload,
            chat: Arc::clone(&chat),
        };
        let appender = ChunkAppender::new(Arc::clone(&streams), stream_id.clone());

        let (final_text, outcome) =
            match Self::drive_producer(producer, ctx, appender, config.producer_timeout).await {
                Ok(text) => (text, StreamOutcome::Done),
                Err(e) => {
                    if e.is_invalid_state() {
                        // Somebody else finalized this stream while we were producing
                        tracing::error!(
                            stream_id = %stream_id,
                            error = %e,
                            "Append rejected on a terminal stream, possible duplicate producer"
                        );
                    } else {
                        tracing::warn!(stream_id = %stream_id, error = %e, "Producer failed");
                    }
                    (config.error_text.clone(), StreamOutcome::Error)
                }
            };

        let snapshot = streams.finalize(&stream_id, &final_text, outcome).await?;
        notify_completion(chat.as_ref(), &snapshot).await;

        let duration_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(
            stream_id = %stream_id,
            status = %snapshot.status,
            generation = snapshot.generation,
            duration_ms,
            "Run finished"
        );

        Ok(RunReport {
            snapshot,
            duration_ms,
        })
    }

    /// Run the producer in its own task so panics and timeouts are contained
    async fn drive_producer(
        producer: Arc<dyn Producer>,
        ctx: ProduceContext,
        appender: ChunkAppender,
        timeout: Duration,
    ) -> Result<String, RunError> {
        let mut task = tokio::spawn(async move { producer.produce(ctx, appender).await });

        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(Ok(text))) => Ok(text),
            Ok(Ok(Err(e))) => Err(RunError::Producer(e)),
            Ok(Err(join_error)) if join_error.is_panic() => Err(RunError::Panicked),
            Ok(Err(_)) => Err(RunError::Cancelled),
            Err(_) => {
                // Stop appending before the stream is finalized as failed
                task.abort();
                Err(RunError::TimedOut(timeout))
            }
        }
    }
}

/// Write the final text back to the message bound to the stream
///
/// Failures are logged and not retried here: the call is idempotent and the
/// sweeper or a later completion may repeat it.
pub(crate) async fn notify_completion(chat: &dyn ChatPersistence, snapshot: &StreamSnapshot) {
    match chat.message_by_stream_id(&snapshot.id).await {
        Ok(Some(message)) => {
            if let Err(e) = chat.mark_stream_complete(&message.id, &snapshot.text).await {
                tracing::error!(
                    stream_id = %snapshot.id,
                    message_id = %message.id,
                    error = %e,
                    "Failed to mark message complete"
                );
            }
        }
        Ok(None) => {
            tracing::warn!(stream_id = %snapshot.id, "No message bound to stream");
        }
        Err(e) => {
            tracing::error!(stream_id = %snapshot.id, error = %e, "Failed to look up message for stream");
        }
    }
}
