use quill_persist::PersistError;
use std::time::Duration;
use thiserror::Error;

/// Why a run did not produce a final text
#[derive(Error, Debug)]
pub enum RunError {
    #[error("Producer failed: {0}")]
    Producer(#[source] anyhow::Error),

    #[error("Producer timed out after {0:?}")]
    TimedOut(Duration),

    #[error("Producer task panicked")]
    Panicked,

    #[error("Producer task was cancelled")]
    Cancelled,

    #[error("Persistence error: {0}")]
    Persist(#[from] PersistError),
}

impl RunError {
    /// The producer raced a terminal transition while appending
    pub fn is_invalid_state(&self) -> bool {
        match self {
            RunError::Producer(e) => e
                .downcast_ref::<PersistError>()
                .is_some_and(PersistError::is_invalid_state),
            RunError::Persist(e) => e.is_invalid_state(),
            _ => false,
        }
    }
}
