pub mod models;
pub mod dbs;
pub mod trait_store;
pub mod trait_client;
pub mod error;
pub mod builder;

pub use models::{ChatMessage, Conversation, MessageRole, SentMessage, StreamRecord};
pub use trait_store::{ChangeFeed, StreamStore};
pub use trait_client::ChatPersistence;
pub use dbs::memory::{MemoryChatPersistence, MemoryStreamStore};
#[cfg(feature = "mongodb")]
pub use dbs::mongo::{MongoChatPersistence, MongoStreamStore};
pub use error::{PersistError, Result};
pub use builder::{Persistence, PersistBuilder, StorageBackend};
