use quill_persist::{ChatPersistence, Persistence, StreamStore};
use quill_runner::{Producer, RunnerConfig, StreamProducerRunner};
use std::sync::Arc;

use crate::config::Config;

/// Shared application state passed to all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub streams: Arc<dyn StreamStore>,
    pub chat: Arc<dyn ChatPersistence>,
    pub runner: Arc<StreamProducerRunner>,
}

impl AppState {
    pub fn new(config: Config, persistence: Persistence, producer: Arc<dyn Producer>) -> Self {
        let runner = StreamProducerRunner::new(
            Arc::clone(&persistence.streams),
            Arc::clone(&persistence.chat),
            producer,
            RunnerConfig {
                producer_timeout: config.stream.producer_timeout(),
                error_text: config.stream.error_text.clone(),
            },
        );

        Self {
            config: Arc::new(config),
            streams: persistence.streams,
            chat: persistence.chat,
            runner: Arc::new(runner),
        }
    }
}
