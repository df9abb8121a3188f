use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quill_types::{StreamCursor, StreamId, StreamOutcome, StreamRead, StreamSnapshot};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex, RwLock};

use crate::error::{PersistError, Result};
use crate::models::StreamRecord;
use crate::trait_store::{ChangeFeed, StreamStore};

struct StreamSlot {
    record: Mutex<StreamRecord>,
    changes: watch::Sender<StreamCursor>,
}

/// In-process stream store
///
/// The map lock is only held to find a slot; every write then goes through
/// the slot's own mutex, giving a single writer per stream while other
/// streams proceed independently. Data lives as long as the process.
#[derive(Clone, Default)]
pub struct MemoryStreamStore {
    streams: Arc<RwLock<HashMap<StreamId, Arc<StreamSlot>>>>,
}

impl MemoryStreamStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, id: &StreamId) -> Result<Arc<StreamSlot>> {
        let streams = self.streams.read().await;
        streams
            .get(id)
            .cloned()
            .ok_or_else(|| PersistError::StreamNotFound(id.clone()))
    }

    /// Number of streams held
    pub async fn len(&self) -> usize {
        self.streams.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.streams.read().await.is_empty()
    }
}

#[async_trait]
impl StreamStore for MemoryStreamStore {
    async fn create_stream(&self) -> Result<StreamId> {
        let id = StreamId::new();
        let record = StreamRecord::new(id.clone());
        let (changes, _) = watch::channel(record.cursor());

        let slot = Arc::new(StreamSlot {
            record: Mutex::new(record),
            changes,
        });

        self.streams.write().await.insert(id.clone(), slot);
        tracing::debug!(stream_id = %id, "Stream created");
        Ok(id)
    }

    async fn claim(&self, id: &StreamId) -> Result<bool> {
        let slot = self.slot(id).await?;
        let mut record = slot.record.lock().await;
        Ok(record.claim())
    }

    async fn append_chunk(&self, id: &StreamId, chunk: &str) -> Result<u64> {
        let slot = self.slot(id).await?;
        let mut record = slot.record.lock().await;

        let generation = record.append(chunk).map_err(|status| PersistError::InvalidState {
            id: id.clone(),
            status,
        })?;

        slot.changes.send_replace(record.cursor());
        Ok(generation)
    }

    async fn finalize(
        &self,
        id: &StreamId,
        final_text: &str,
        outcome: StreamOutcome,
    ) -> Result<StreamSnapshot> {
        let slot = self.slot(id).await?;
        let mut record = slot.record.lock().await;

        if record.finalize(final_text, outcome) {
            slot.changes.send_replace(record.cursor());
            tracing::debug!(stream_id = %id, status = %record.status, "Stream finalized");
        } else {
            tracing::debug!(
                stream_id = %id,
                status = %record.status,
                "Stream already terminal, finalize ignored"
            );
        }

        Ok(record.snapshot())
    }

    async fn read(&self, id: &StreamId, from_generation: Option<u64>) -> Result<StreamRead> {
        let slot = self.slot(id).await?;
        let record = slot.record.lock().await;
        Ok(record.read(from_generation))
    }

    async fn subscribe(&self, id: &StreamId) -> Result<ChangeFeed> {
        let slot = self.slot(id).await?;
        Ok(ChangeFeed::Push(slot.changes.subscribe()))
    }

    async fn list_stale(&self, idle_since: DateTime<Utc>) -> Result<Vec<StreamId>> {
        let slots: Vec<Arc<StreamSlot>> = self.streams.read().await.values().cloned().collect();

        let mut stale = Vec::new();
        for slot in slots {
            let record = slot.record.lock().await;
            if record.status.is_active() && record.updated_at < idle_since {
                stale.push(record.id.clone());
            }
        }
        Ok(stale)
    }
}
