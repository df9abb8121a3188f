//! # Quill
//!
//! Persistent, resumable text streaming for chat.
//!
//! An assistant reply is written into a durable stream as it is generated.
//! Any number of clients can attach to that stream, leave, reload and attach
//! again; they always see the text produced so far and then the rest live.
//! Exactly one producer ever runs per stream, no matter how many clients
//! asked for it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quill::prelude::*;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let persistence = Persistence::in_memory();
//!
//!     let runner = StreamProducerRunner::new(
//!         Arc::clone(&persistence.streams),
//!         Arc::clone(&persistence.chat),
//!         Arc::new(EchoProducer::new(Duration::from_millis(20))),
//!         RunnerConfig::default(),
//!     );
//!
//!     let conversation = persistence.chat.create_conversation("user-1", "Hello").await?;
//!     let stream_id = persistence.streams.create_stream().await?;
//!     persistence
//!         .chat
//!         .send_message(&conversation.id, "Hi there", stream_id.clone())
//!         .await?;
//!
//!     if let RunStart::Started(run) = runner.start(&stream_id, serde_json::Value::Null).await? {
//!         let report = run.await??;
//!         println!("{}", report.snapshot.text);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - **`quill-types`**: stream ids, statuses, reads and wire events
//! - **`quill-persist`**: the stream store and chat persistence (memory, MongoDB)
//! - **`quill-runner`**: single-producer runs, live following and the stale-stream sweeper
//! - **`quill-client`**: SSE client with reconnect and replay (feature `client`)
//!
//! The HTTP transport lives in the `quill-api` binary crate.

pub mod prelude;

pub use quill_types::{
    AttachRequest, StreamCursor, StreamEvent, StreamId, StreamOutcome, StreamRead,
    StreamSnapshot, StreamStatus,
};

pub use quill_persist::{
    ChangeFeed, ChatMessage, ChatPersistence, Conversation, MemoryChatPersistence,
    MemoryStreamStore, MessageRole, PersistBuilder, PersistError, Persistence, SentMessage,
    StorageBackend, StreamStore,
};

#[cfg(feature = "mongodb")]
pub use quill_persist::{MongoChatPersistence, MongoStreamStore};

pub use quill_runner::{
    follow_stream, ChunkAppender, EchoProducer, FollowMode, ProduceContext, Producer, RunError,
    RunReport, RunStart, RunnerConfig, StreamProducerRunner, StreamSweeper,
};

#[cfg(feature = "client")]
pub use quill_client::{
    AttachMode, ClientError, ClientOptions, ClientState, StreamClient, StreamHandle,
};
