//! Shared data model for Quill streams.
//!
//! A stream is a durable, append-only piece of text produced incrementally by a
//! single producer and read by any number of observers. This crate holds the
//! types every other Quill crate speaks: identifiers, the lifecycle status,
//! read snapshots and the events sent over the wire to attached clients.

pub mod stream;
pub mod events;
pub mod attach;

pub use stream::{StreamCursor, StreamId, StreamOutcome, StreamRead, StreamSnapshot, StreamStatus};
pub use events::StreamEvent;
pub use attach::AttachRequest;
