//! Client side of Quill streams.
//!
//! [`StreamClient::attach`] opens the server's event stream for a stream id,
//! folds every event into a [`ClientState`] and publishes it through a
//! `tokio::sync::watch` channel. Lost connections are resumed as a passive
//! observer with a full-text snapshot, so a reload or network drop never
//! starts a second producer and never duplicates text.
//!
//! ```no_run
//! use quill_client::{AttachMode, StreamClient};
//! use quill_types::StreamId;
//!
//! # async fn demo() -> quill_client::Result<()> {
//! let client = StreamClient::new("http://127.0.0.1:3000")?;
//! let handle = client.attach(StreamId::from("stream-id"), AttachMode::Drive);
//! let state = handle.wait_terminal().await?;
//! println!("{} ({})", state.text, state.status);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
pub mod sse;
pub mod state;

pub use client::{AttachMode, ClientOptions, EventStream, StreamClient, StreamHandle};
pub use error::{ClientError, Result};
pub use state::ClientState;
