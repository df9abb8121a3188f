use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use quill_persist::Conversation;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateConversationRequest {
    pub user_id: String,
    #[serde(default = "default_title")]
    pub title: String,
}

fn default_title() -> String {
    "New conversation".to_string()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub user_id: String,
    pub title: String,
    pub last_message_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ListConversationsQuery {
    pub user_id: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    20
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ListConversationsResponse {
    pub conversations: Vec<ConversationResponse>,
    pub has_more: bool,
}

/// Create a new conversation
#[utoipa::path(
    post,
    path = "/conversations",
    request_body = CreateConversationRequest,
    responses(
        (status = 201, description = "Conversation created", body = ConversationResponse),
        (status = 400, description = "Invalid request")
    ),
    tag = "conversations"
)]
pub async fn create_conversation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateConversationRequest>,
) -> ApiResult<(StatusCode, Json<ConversationResponse>)> {
    if req.user_id.trim().is_empty() {
        return Err(ApiError::BadRequest("user_id must not be empty".to_string()));
    }

    let conversation = state
        .chat
        .create_conversation(&req.user_id, &req.title)
        .await?;

    Ok((StatusCode::CREATED, Json(conversation_to_response(conversation))))
}

/// List conversations for a user, most recently active first
#[utoipa::path(
    get,
    path = "/conversations",
    params(
        ("user_id" = String, Query, description = "User ID to filter conversations"),
        ("limit" = Option<usize>, Query, description = "Maximum number of conversations to return (default: 20)")
    ),
    responses(
        (status = 200, description = "List of conversations", body = ListConversationsResponse)
    ),
    tag = "conversations"
)]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListConversationsQuery>,
) -> ApiResult<Json<ListConversationsResponse>> {
    let limit = query.limit.min(100); // Cap at 100

    let conversations = state.chat.list_conversations(&query.user_id).await?;
    let has_more = conversations.len() > limit;

    Ok(Json(ListConversationsResponse {
        conversations: conversations
            .into_iter()
            .take(limit)
            .map(conversation_to_response)
            .collect(),
        has_more,
    }))
}

/// Get a specific conversation by ID
#[utoipa::path(
    get,
    path = "/conversations/{conversation_id}",
    params(
        ("conversation_id" = String, Path, description = "Conversation ID")
    ),
    responses(
        (status = 200, description = "Conversation details", body = ConversationResponse),
        (status = 404, description = "Conversation not found")
    ),
    tag = "conversations"
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> ApiResult<Json<ConversationResponse>> {
    let conversation = state
        .chat
        .get_conversation(&conversation_id)
        .await?
        .ok_or(ApiError::ConversationNotFound(conversation_id))?;

    Ok(Json(conversation_to_response(conversation)))
}

fn conversation_to_response(conversation: Conversation) -> ConversationResponse {
    ConversationResponse {
        conversation_id: conversation.id,
        user_id: conversation.user_id,
        title: conversation.title,
        last_message_at: conversation.last_message_at,
    }
}
