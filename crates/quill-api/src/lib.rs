//! HTTP surface of Quill.
//!
//! `POST /chat-stream` attaches a client to a persistent text stream over
//! Server-Sent Events; the conversation and message routes create the
//! streams in the first place. See [`app::build_router`].

pub mod app;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

pub use app::{build_cors_layer, build_router};
pub use config::Config;
pub use state::AppState;
