use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::stream::{Stream, StreamExt};
use quill_runner::{follow_stream, FollowMode, RunStart};
use quill_types::{AttachRequest, StreamEvent, StreamId, StreamRead};
use serde::Deserialize;
use std::convert::Infallible;
use std::sync::Arc;

use crate::{error::ApiResult, state::AppState};

/// Attach to a stream and receive its text as Server-Sent Events
///
/// Body: `{"streamId", "driveIntent", "follow"?, "fromGeneration"?, "payload"?}`.
/// With `driveIntent` the producer is started if nobody has claimed the
/// stream yet; any other attach only reads. The first event is a `snapshot`
/// with the full text (or a `chunk` when resuming from `fromGeneration`),
/// followed by `chunk` events and one final `done` or `error` event carrying
/// the full final text. Disconnecting never stops the producer.
#[utoipa::path(
    post,
    path = "/chat-stream",
    responses(
        (status = 200, description = "Stream events", content_type = "text/event-stream"),
        (status = 404, description = "Stream not found")
    ),
    tag = "streams"
)]
pub async fn attach_stream(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AttachRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // Subscribe before the first read so no change between the two is lost
    let feed = state.streams.subscribe(&req.stream_id).await?;

    if req.drive_intent {
        match state.runner.start(&req.stream_id, req.payload).await? {
            // The run owns itself; dropping the handle detaches it
            RunStart::Started(_) => {
                tracing::info!(stream_id = %req.stream_id, "Driver attached, producer started");
            }
            RunStart::AlreadyClaimed => {
                tracing::debug!(stream_id = %req.stream_id, "Driver attached to a claimed stream, following");
            }
        }
    }

    let mode = if req.follow {
        FollowMode::Live
    } else {
        FollowMode::Snapshot
    };

    let events = follow_stream(
        Arc::clone(&state.streams),
        req.stream_id,
        feed,
        req.from_generation,
        mode,
    );
    let sse_stream = events.map(|event| Ok::<Event, Infallible>(to_sse_event(&event)));

    Ok(Sse::new(sse_stream).keep_alive(KeepAlive::new().interval(state.config.stream.keep_alive())))
}

fn to_sse_event(event: &StreamEvent) -> Event {
    match Event::default().event(event.event_name()).json_data(event) {
        Ok(sse_event) => sse_event,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize stream event");
            Event::default().comment("unserializable event")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ReadStreamQuery {
    #[serde(rename = "fromGeneration")]
    pub from_generation: Option<u64>,
}

/// Current text, status and generation of a stream as JSON
///
/// With `fromGeneration` only the text appended after that generation is
/// returned when possible (`isDelta = true`); otherwise the full text.
#[utoipa::path(
    get,
    path = "/streams/{stream_id}",
    params(
        ("stream_id" = String, Path, description = "Stream ID"),
        ("fromGeneration" = Option<u64>, Query, description = "Return only text appended after this generation")
    ),
    responses(
        (status = 200, description = "Stream state", content_type = "application/json"),
        (status = 404, description = "Stream not found")
    ),
    tag = "streams"
)]
pub async fn read_stream(
    State(state): State<Arc<AppState>>,
    Path(stream_id): Path<String>,
    Query(query): Query<ReadStreamQuery>,
) -> ApiResult<Json<StreamRead>> {
    let read = state
        .streams
        .read(&StreamId::from(stream_id), query.from_generation)
        .await?;
    Ok(Json(read))
}
