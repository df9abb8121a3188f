mod chat;
mod models;
mod stream_store;

pub use chat::MongoChatPersistence;
pub use stream_store::MongoStreamStore;
