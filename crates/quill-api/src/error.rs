use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Persistence error: {0}")]
    Persist(#[from] quill_persist::PersistError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::ConversationNotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Persist(ref e) if e.is_not_found() => (StatusCode::NOT_FOUND, e.to_string()),
            ApiError::Persist(ref e) if e.is_invalid_state() => (StatusCode::CONFLICT, e.to_string()),
            ApiError::Persist(ref e) => {
                tracing::error!("Persistence error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Storage error".to_string())
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use quill_persist::PersistError;
    use quill_types::{StreamId, StreamStatus};

    #[test]
    fn test_not_found_maps_to_404() {
        let response = ApiError::from(PersistError::StreamNotFound(StreamId::from("s1"))).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_invalid_state_maps_to_409() {
        let error = PersistError::InvalidState {
            id: StreamId::from("s1"),
            status: StreamStatus::Done,
        };
        let response = ApiError::from(error).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_storage_failure_hides_details() {
        let response = ApiError::from(PersistError::Connection("refused".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
