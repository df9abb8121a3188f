use anyhow::{anyhow, Result};
use async_trait::async_trait;
use quill_persist::{ChatPersistence, MemoryChatPersistence, MemoryStreamStore, StreamStore};
use quill_runner::{
    ChunkAppender, ProduceContext, Producer, RunError, RunStart, RunnerConfig,
    StreamProducerRunner,
};
use quill_types::{StreamId, StreamStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const APOLOGY: &str = "Sorry, the answer could not be generated.";

/// Appends fixed chunks, then returns a (possibly different) final text
struct ScriptedProducer {
    chunks: Vec<&'static str>,
    final_text: &'static str,
}

#[async_trait]
impl Producer for ScriptedProducer {
    async fn produce(&self, _ctx: ProduceContext, appender: ChunkAppender) -> Result<String> {
        for chunk in &self.chunks {
            appender.append(chunk).await?;
        }
        Ok(self.final_text.to_string())
    }
}

struct FailingProducer;

#[async_trait]
impl Producer for FailingProducer {
    async fn produce(&self, _ctx: ProduceContext, appender: ChunkAppender) -> Result<String> {
        appender.append("Hel").await?;
        Err(anyhow!("model backend unavailable"))
    }
}

struct PanickingProducer;

#[async_trait]
impl Producer for PanickingProducer {
    async fn produce(&self, _ctx: ProduceContext, appender: ChunkAppender) -> Result<String> {
        appender.append("H").await?;
        panic!("producer bug");
    }
}

struct SlowProducer;

#[async_trait]
impl Producer for SlowProducer {
    async fn produce(&self, _ctx: ProduceContext, appender: ChunkAppender) -> Result<String> {
        appender.append("H").await?;
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok("never".to_string())
    }
}

struct CountingProducer {
    calls: AtomicUsize,
}

#[async_trait]
impl Producer for CountingProducer {
    async fn produce(&self, _ctx: ProduceContext, appender: ChunkAppender) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        appender.append("ok").await?;
        Ok("ok".to_string())
    }
}

struct Fixture {
    streams: Arc<MemoryStreamStore>,
    chat: Arc<MemoryChatPersistence>,
    stream_id: StreamId,
    assistant_message_id: String,
}

async fn fixture() -> Fixture {
    let streams = Arc::new(MemoryStreamStore::new());
    let chat = Arc::new(MemoryChatPersistence::new());
    let conversation = chat.create_conversation("user-1", "Test").await.unwrap();
    let stream_id = streams.create_stream().await.unwrap();
    let sent = chat
        .send_message(&conversation.id, "Hi", stream_id.clone())
        .await
        .unwrap();

    Fixture {
        streams,
        chat,
        stream_id,
        assistant_message_id: sent.assistant_message_id,
    }
}

fn runner(fx: &Fixture, producer: Arc<dyn Producer>, timeout: Duration) -> StreamProducerRunner {
    StreamProducerRunner::new(
        fx.streams.clone(),
        fx.chat.clone(),
        producer,
        RunnerConfig {
            producer_timeout: timeout,
            error_text: APOLOGY.to_string(),
        },
    )
}

async fn run_to_end(runner: &StreamProducerRunner, id: &StreamId) -> quill_runner::RunReport {
    match runner.start(id, serde_json::Value::Null).await.unwrap() {
        RunStart::Started(handle) => handle.await.unwrap().unwrap(),
        RunStart::AlreadyClaimed => panic!("Expected to win the claim"),
    }
}

#[tokio::test]
async fn test_successful_run_finalizes_done_and_completes_message() {
    let fx = fixture().await;
    let producer = Arc::new(ScriptedProducer {
        chunks: vec!["H", "i"],
        final_text: "Hi!",
    });
    let runner = runner(&fx, producer, Duration::from_secs(5));

    let report = run_to_end(&runner, &fx.stream_id).await;
    assert_eq!(report.snapshot.status, StreamStatus::Done);
    assert_eq!(report.snapshot.text, "Hi!");
    assert_eq!(report.snapshot.generation, 2);

    let message = fx
        .chat
        .message_by_stream_id(&fx.stream_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.id, fx.assistant_message_id);
    assert_eq!(message.content, "Hi!");
    assert!(!message.is_streaming);
}

#[tokio::test]
async fn test_rewritten_final_text_disables_suffix_reads() {
    let fx = fixture().await;
    let producer = Arc::new(ScriptedProducer {
        chunks: vec!["H", "i"],
        final_text: "Hi!",
    });
    let runner = runner(&fx, producer, Duration::from_secs(5));
    run_to_end(&runner, &fx.stream_id).await;

    let read = fx.streams.read(&fx.stream_id, Some(1)).await.unwrap();
    assert!(!read.is_delta);
    assert_eq!(read.text, "Hi!");
}

#[tokio::test]
async fn test_failing_producer_ends_in_error_with_apology() {
    let fx = fixture().await;
    let runner = runner(&fx, Arc::new(FailingProducer), Duration::from_secs(5));

    let report = run_to_end(&runner, &fx.stream_id).await;
    assert_eq!(report.snapshot.status, StreamStatus::Error);
    assert_eq!(report.snapshot.text, APOLOGY);

    let message = fx
        .chat
        .message_by_stream_id(&fx.stream_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.content, APOLOGY);
    assert!(!message.is_streaming);
}

#[tokio::test]
async fn test_panicking_producer_is_contained() {
    let fx = fixture().await;
    let runner = runner(&fx, Arc::new(PanickingProducer), Duration::from_secs(5));

    let report = run_to_end(&runner, &fx.stream_id).await;
    assert_eq!(report.snapshot.status, StreamStatus::Error);
    assert_eq!(report.snapshot.text, APOLOGY);
}

#[tokio::test]
async fn test_slow_producer_times_out() {
    let fx = fixture().await;
    let runner = runner(&fx, Arc::new(SlowProducer), Duration::from_millis(50));

    let report = run_to_end(&runner, &fx.stream_id).await;
    assert_eq!(report.snapshot.status, StreamStatus::Error);
    assert_eq!(report.snapshot.text, APOLOGY);

    // The aborted producer must not keep writing
    tokio::time::sleep(Duration::from_millis(50)).await;
    let read = fx.streams.read(&fx.stream_id, None).await.unwrap();
    assert_eq!(read.text, APOLOGY);
}

#[tokio::test]
async fn test_concurrent_starts_run_one_producer() {
    let fx = fixture().await;
    let producer = Arc::new(CountingProducer {
        calls: AtomicUsize::new(0),
    });
    let runner = Arc::new(runner(&fx, producer.clone(), Duration::from_secs(5)));

    let mut attempts = Vec::new();
    for _ in 0..8 {
        let runner = Arc::clone(&runner);
        let id = fx.stream_id.clone();
        attempts.push(tokio::spawn(async move {
            runner.start(&id, serde_json::Value::Null).await.unwrap()
        }));
    }

    let mut handles = Vec::new();
    for attempt in attempts {
        if let RunStart::Started(handle) = attempt.await.unwrap() {
            handles.push(handle);
        }
    }
    assert_eq!(handles.len(), 1);

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(producer.calls.load(Ordering::SeqCst), 1);

    // A finished stream can never be claimed again
    let again = runner
        .start(&fx.stream_id, serde_json::Value::Null)
        .await
        .unwrap();
    assert!(!again.is_started());
}

#[tokio::test]
async fn test_start_on_unknown_stream_is_not_found() {
    let fx = fixture().await;
    let runner = runner(&fx, Arc::new(FailingProducer), Duration::from_secs(5));

    let err = runner
        .start(&StreamId::from("missing"), serde_json::Value::Null)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_invalid_state_is_detected_through_producer_errors() {
    let err = RunError::Producer(anyhow::Error::new(quill_persist::PersistError::InvalidState {
        id: StreamId::from("s1"),
        status: StreamStatus::Done,
    }));
    assert!(err.is_invalid_state());
    assert!(!RunError::Panicked.is_invalid_state());
}
