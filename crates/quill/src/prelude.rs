//! Prelude module for convenient imports
//!
//! Import everything you need with:
//! ```rust
//! use quill::prelude::*;
//! ```

pub use crate::{
    StreamEvent, StreamId, StreamRead, StreamStatus,
    ChatPersistence, Persistence, PersistBuilder, StreamStore,
    ChunkAppender, EchoProducer, ProduceContext, Producer,
    RunStart, RunnerConfig, StreamProducerRunner,
};

#[cfg(feature = "client")]
pub use crate::{AttachMode, ClientState, StreamClient};
