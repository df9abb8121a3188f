use axum::Json;
use utoipa::OpenApi;

use crate::handlers::stream;
use crate::routes::{conversations, health, messages};

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        conversations::create_conversation,
        conversations::list_conversations,
        conversations::get_conversation,
        messages::list_messages,
        messages::send_message,
        stream::attach_stream,
        stream::read_stream,
    ),
    components(schemas(
        health::HealthResponse,
        conversations::CreateConversationRequest,
        conversations::ConversationResponse,
        conversations::ListConversationsResponse,
        messages::MessageResponse,
        messages::ListMessagesResponse,
        messages::SendMessageRequest,
        messages::SendMessageResponse,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "conversations", description = "Conversations"),
        (name = "messages", description = "Messages and reply streams"),
        (name = "streams", description = "Attach to and read persistent text streams")
    )
)]
pub struct ApiDoc;

/// OpenAPI document as JSON
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
