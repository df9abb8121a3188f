use async_trait::async_trait;
use bson::{doc, Document};
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::options::ReturnDocument;
use mongodb::{Client, Collection, IndexModel};
use quill_types::{StreamId, StreamOutcome, StreamRead, StreamSnapshot, StreamStatus};
use std::time::Duration;

use crate::dbs::mongo::models::MongoStream;
use crate::error::{PersistError, Result};
use crate::models::StreamRecord;
use crate::trait_store::{ChangeFeed, StreamStore};

/// Stream store backed by a MongoDB collection
///
/// Every state change is a single-document `find_one_and_update` guarded by a
/// status filter, which gives the per-stream single-writer guarantee without
/// any client-side locking. Followers poll since there is no push channel.
#[derive(Clone)]
pub struct MongoStreamStore {
    collection: Collection<MongoStream>,
    poll_interval: Duration,
}

fn active_filter(id: &StreamId) -> Document {
    doc! {
        "_id": id.as_str(),
        "status": { "$in": [StreamStatus::Pending.as_str(), StreamStatus::Streaming.as_str()] },
    }
}

impl MongoStreamStore {
    pub fn new(client: &Client, db_name: &str, poll_interval: Duration) -> Self {
        let collection = client.database(db_name).collection("streams");
        Self {
            collection,
            poll_interval,
        }
    }

    /// Connect to MongoDB and create the store
    pub async fn connect(mongodb_uri: &str, db_name: &str, poll_interval: Duration) -> Result<Self> {
        let client = Client::with_uri_str(mongodb_uri)
            .await
            .map_err(|e| PersistError::Connection(e.to_string()))?;
        Ok(Self::new(&client, db_name, poll_interval))
    }

    /// Index used by the stale-stream sweep
    pub async fn ensure_indexes(&self) -> Result<()> {
        let index = IndexModel::builder()
            .keys(doc! { "status": 1, "updated_at": 1 })
            .build();
        self.collection.create_index(index).await?;
        Ok(())
    }

    async fn fetch(&self, id: &StreamId) -> Result<StreamRecord> {
        self.collection
            .find_one(doc! { "_id": id.as_str() })
            .await?
            .map(StreamRecord::from)
            .ok_or_else(|| PersistError::StreamNotFound(id.clone()))
    }
}

#[async_trait]
impl StreamStore for MongoStreamStore {
    async fn create_stream(&self) -> Result<StreamId> {
        let id = StreamId::new();
        let document: MongoStream = StreamRecord::new(id.clone()).into();
        self.collection.insert_one(&document).await?;
        tracing::debug!(stream_id = %id, "Stream created");
        Ok(id)
    }

    async fn claim(&self, id: &StreamId) -> Result<bool> {
        let filter = doc! {
            "_id": id.as_str(),
            "status": StreamStatus::Pending.as_str(),
            "claimed": false,
        };
        let update = doc! {
            "$set": {
                "claimed": true,
                "updated_at": bson::DateTime::from_chrono(Utc::now()),
            }
        };

        let claimed = self.collection.find_one_and_update(filter, update).await?;
        if claimed.is_some() {
            return Ok(true);
        }

        // Distinguish "lost the race" from "no such stream"
        self.fetch(id).await.map(|_| false)
    }

    async fn append_chunk(&self, id: &StreamId, chunk: &str) -> Result<u64> {
        let chunk_len = chunk.len() as i64;
        // Aggregation pipeline update so concat and counters apply atomically;
        // $literal keeps chunks starting with '$' from being read as field paths.
        let update = vec![doc! {
            "$set": {
                "status": StreamStatus::Streaming.as_str(),
                "text": { "$concat": ["$text", { "$literal": chunk }] },
                "generation": { "$add": ["$generation", 1_i64] },
                "offsets": {
                    "$concatArrays": [
                        "$offsets",
                        [{ "$add": [{ "$arrayElemAt": ["$offsets", -1] }, chunk_len] }],
                    ]
                },
                "updated_at": bson::DateTime::from_chrono(Utc::now()),
            }
        }];

        let updated = self
            .collection
            .find_one_and_update(active_filter(id), update)
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(document) => Ok(document.generation.max(0) as u64),
            None => {
                let record = self.fetch(id).await?;
                Err(PersistError::InvalidState {
                    id: id.clone(),
                    status: record.status,
                })
            }
        }
    }

    async fn finalize(
        &self,
        id: &StreamId,
        final_text: &str,
        outcome: StreamOutcome,
    ) -> Result<StreamSnapshot> {
        let status: StreamStatus = outcome.into();
        // All expressions in one $set stage see the pre-update document
        let update = vec![doc! {
            "$set": {
                "rewritten": { "$ne": ["$text", { "$literal": final_text }] },
                "text": { "$literal": final_text },
                "status": status.as_str(),
                "updated_at": bson::DateTime::from_chrono(Utc::now()),
            }
        }];

        let updated = self
            .collection
            .find_one_and_update(active_filter(id), update)
            .return_document(ReturnDocument::After)
            .await?;

        match updated {
            Some(document) => {
                tracing::debug!(stream_id = %id, status = %status, "Stream finalized");
                Ok(StreamRecord::from(document).snapshot())
            }
            None => {
                let record = self.fetch(id).await?;
                tracing::debug!(
                    stream_id = %id,
                    status = %record.status,
                    "Stream already terminal, finalize ignored"
                );
                Ok(record.snapshot())
            }
        }
    }

    async fn read(&self, id: &StreamId, from_generation: Option<u64>) -> Result<StreamRead> {
        Ok(self.fetch(id).await?.read(from_generation))
    }

    async fn subscribe(&self, id: &StreamId) -> Result<ChangeFeed> {
        // Fail fast on unknown ids, same as the in-memory store
        self.fetch(id).await?;
        Ok(ChangeFeed::poll(self.poll_interval))
    }

    async fn list_stale(&self, idle_since: DateTime<Utc>) -> Result<Vec<StreamId>> {
        let filter = doc! {
            "status": { "$in": [StreamStatus::Pending.as_str(), StreamStatus::Streaming.as_str()] },
            "updated_at": { "$lt": bson::DateTime::from_chrono(idle_since) },
        };

        let documents: Vec<Document> = self
            .collection
            .clone_with_type::<Document>()
            .find(filter)
            .projection(doc! { "_id": 1 })
            .await?
            .try_collect()
            .await?;

        Ok(documents
            .iter()
            .filter_map(|d| d.get_str("_id").ok())
            .map(StreamId::from)
            .collect())
    }
}
