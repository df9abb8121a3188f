use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use crate::dbs::memory::{MemoryChatPersistence, MemoryStreamStore};
use crate::error::{PersistError, Result};
use crate::trait_client::ChatPersistence;
use crate::trait_store::StreamStore;

/// Storage backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Memory,
    Mongodb,
}

/// Stream store and chat persistence sharing one backend
#[derive(Clone)]
pub struct Persistence {
    pub streams: Arc<dyn StreamStore>,
    pub chat: Arc<dyn ChatPersistence>,
}

impl Persistence {
    /// In-process storage, mostly for tests and local runs
    pub fn in_memory() -> Self {
        Self {
            streams: Arc::new(MemoryStreamStore::new()),
            chat: Arc::new(MemoryChatPersistence::new()),
        }
    }
}

pub struct PersistBuilder {
    backend: StorageBackend,
    mongodb_uri: Option<String>,
    database: Option<String>,
    poll_interval: Duration,
}

impl PersistBuilder {
    pub fn new() -> Self {
        Self {
            backend: StorageBackend::Memory,
            mongodb_uri: None,
            database: None,
            poll_interval: Duration::from_millis(250),
        }
    }

    pub fn backend(mut self, backend: StorageBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn mongodb_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongodb_uri = Some(uri.into());
        self
    }

    pub fn database(mut self, db: impl Into<String>) -> Self {
        self.database = Some(db.into());
        self
    }

    /// How often followers re-read streams on backends without push notification
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn build(self) -> Result<Persistence> {
        match self.backend {
            StorageBackend::Memory => Ok(Persistence::in_memory()),
            StorageBackend::Mongodb => self.build_mongo().await,
        }
    }

    #[cfg(feature = "mongodb")]
    async fn build_mongo(self) -> Result<Persistence> {
        use crate::dbs::mongo::{MongoChatPersistence, MongoStreamStore};

        let mongodb_uri = self
            .mongodb_uri
            .ok_or_else(|| PersistError::Internal("mongodb_uri is required".to_string()))?;
        let database = self
            .database
            .ok_or_else(|| PersistError::Internal("database is required".to_string()))?;

        let client = mongodb::Client::with_uri_str(&mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;

        let streams = MongoStreamStore::new(&client, &database, self.poll_interval);
        let chat = MongoChatPersistence::new(&client, &database);
        streams.ensure_indexes().await?;
        chat.ensure_indexes().await?;

        tracing::info!(database = %database, "MongoDB persistence ready");

        Ok(Persistence {
            streams: Arc::new(streams),
            chat: Arc::new(chat),
        })
    }

    #[cfg(not(feature = "mongodb"))]
    async fn build_mongo(self) -> Result<Persistence> {
        Err(PersistError::Internal(
            "MongoDB backend requested but quill-persist was built without the `mongodb` feature"
                .to_string(),
        ))
    }
}

impl Default for PersistBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_backend_builds() {
        let persistence = PersistBuilder::new().build().await.unwrap();
        let id = persistence.streams.create_stream().await.unwrap();
        assert!(persistence.streams.read(&id, None).await.is_ok());
    }

    #[test]
    fn test_backend_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            backend: StorageBackend,
        }

        let parsed: Wrapper = serde_json::from_str(r#"{"backend":"mongodb"}"#).unwrap();
        assert_eq!(parsed.backend, StorageBackend::Mongodb);
    }
}
