use serde::{Deserialize, Serialize};

use crate::stream::StreamId;

fn default_follow() -> bool {
    true
}

/// Body of an attach request
///
/// `drive_intent` asks the server to start the producer if nobody has yet.
/// Without `follow` the server sends the current state once and closes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachRequest {
    pub stream_id: StreamId,
    #[serde(default)]
    pub drive_intent: bool,
    #[serde(default = "default_follow")]
    pub follow: bool,
    /// Resume after this generation instead of receiving the full text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_generation: Option<u64>,
    /// Opaque input handed to the producer
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub payload: serde_json::Value,
}

impl AttachRequest {
    pub fn drive(stream_id: StreamId) -> Self {
        Self {
            stream_id,
            drive_intent: true,
            follow: true,
            from_generation: None,
            payload: serde_json::Value::Null,
        }
    }

    pub fn observe(stream_id: StreamId) -> Self {
        Self {
            drive_intent: false,
            ..Self::drive(stream_id)
        }
    }
}
