pub mod producer;
pub mod runner;
pub mod follow;
pub mod echo;
pub mod sweeper;
pub mod error;

pub use producer::{ChunkAppender, ProduceContext, Producer};
pub use runner::{RunReport, RunStart, RunnerConfig, StreamProducerRunner, DEFAULT_ERROR_TEXT};
pub use follow::{follow_stream, FollowMode};
pub use echo::EchoProducer;
pub use sweeper::StreamSweeper;
pub use error::RunError;
