use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use quill_persist::{ChatMessage, MessageRole};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message_id: String,
    pub conversation_id: String,
    #[schema(value_type = String)]
    pub role: MessageRole,
    /// Live stream text while the reply is streaming, stored content otherwise
    pub content: String,
    pub stream_id: Option<String>,
    pub is_streaming: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListMessagesResponse {
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendMessageRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendMessageResponse {
    pub user_message_id: String,
    pub assistant_message_id: String,
    /// Attach to this stream with `POST /chat-stream` to receive the reply
    pub stream_id: String,
}

/// List messages in a conversation
#[utoipa::path(
    get,
    path = "/conversations/{conversation_id}/messages",
    params(
        ("conversation_id" = String, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Messages in creation order", body = ListMessagesResponse),
        (status = 404, description = "Conversation not found")
    ),
    tag = "messages"
)]
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<ListMessagesResponse>> {
    if state.chat.get_conversation(&conversation_id).await?.is_none() {
        return Err(ApiError::ConversationNotFound(conversation_id));
    }

    let stored = state.chat.messages_in_conversation(&conversation_id).await?;

    let mut messages = Vec::with_capacity(stored.len());
    for message in stored {
        messages.push(message_to_response(&state, message).await);
    }

    Ok(Json(ListMessagesResponse { messages }))
}

/// Send a user message and create the stream for the reply
///
/// Returns immediately; the reply is produced once a client attaches to the
/// returned stream with drive intent.
#[utoipa::path(
    post,
    path = "/conversations/{conversation_id}/messages",
    params(
        ("conversation_id" = String, Path, description = "Conversation ID")
    ),
    request_body = SendMessageRequest,
    responses(
        (status = 201, description = "Message stored, reply stream created", body = SendMessageResponse),
        (status = 404, description = "Conversation not found")
    ),
    tag = "messages"
)]
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
    Json(req): Json<SendMessageRequest>,
) -> ApiResult<(StatusCode, Json<SendMessageResponse>)> {
    if req.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content must not be empty".to_string()));
    }
    if state.chat.get_conversation(&conversation_id).await?.is_none() {
        return Err(ApiError::ConversationNotFound(conversation_id));
    }

    // A stream orphaned by a failure below stays pending until the sweeper fails it
    let stream_id = state.streams.create_stream().await?;
    let sent = state
        .chat
        .send_message(&conversation_id, &req.content, stream_id)
        .await?;

    tracing::info!(
        conversation_id = %conversation_id,
        stream_id = %sent.stream_id,
        "Message sent, reply stream created"
    );

    Ok((
        StatusCode::CREATED,
        Json(SendMessageResponse {
            user_message_id: sent.user_message_id,
            assistant_message_id: sent.assistant_message_id,
            stream_id: sent.stream_id.into_inner(),
        }),
    ))
}

async fn message_to_response(state: &AppState, message: ChatMessage) -> MessageResponse {
    let live = match (&message.stream_id, message.is_streaming) {
        (Some(stream_id), true) => match state.streams.read(stream_id, None).await {
            Ok(read) => Some(read),
            Err(e) => {
                tracing::warn!(stream_id = %stream_id, error = %e, "Could not read live stream text");
                None
            }
        },
        _ => None,
    };

    let content = message
        .display_text(live.as_ref().map(|read| (read.text.as_str(), read.status)))
        .to_string();

    MessageResponse {
        message_id: message.id,
        conversation_id: message.conversation_id,
        role: message.role,
        content,
        stream_id: message.stream_id.map(|id| id.into_inner()),
        is_streaming: message.is_streaming,
        created_at: message.created_at,
    }
}
