mod chat;
mod stream_store;

pub use chat::MemoryChatPersistence;
pub use stream_store::MemoryStreamStore;
