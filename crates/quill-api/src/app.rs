use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    config::Config,
    handlers::stream,
    middleware::logging,
    openapi,
    routes::{conversations, health, messages},
    state::AppState,
};

pub fn build_router(state: Arc<AppState>) -> Router {
    // JSON routes: bounded and compressed
    let api_routes = Router::new()
        // Health
        .route("/health", get(health::health_check))
        // Conversations
        .route(
            "/conversations",
            post(conversations::create_conversation).get(conversations::list_conversations),
        )
        .route("/conversations/:conversation_id", get(conversations::get_conversation))
        // Messages
        .route(
            "/conversations/:conversation_id/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        // Streams
        .route("/streams/:stream_id", get(stream::read_stream))
        // Docs
        .route("/api/openapi.json", get(openapi::openapi_json))
        .layer(TimeoutLayer::new(state.config.server.request_timeout()))
        .layer(CompressionLayer::new());

    // Event streams live as long as their producer, and must flush every event
    let stream_routes = Router::new().route("/chat-stream", post(stream::attach_stream));

    Router::new()
        .merge(api_routes)
        .merge(stream_routes)
        .layer(middleware::from_fn(logging::log_request))
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub fn build_cors_layer(config: &Config) -> CorsLayer {
    if !config.cors.enabled {
        return CorsLayer::new();
    }

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if config.cors.origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let parsed_origins: Vec<HeaderValue> = config
            .cors
            .origins
            .iter()
            .filter_map(|o| o.parse::<HeaderValue>().ok())
            .collect();

        cors.allow_origin(parsed_origins)
    }
}
