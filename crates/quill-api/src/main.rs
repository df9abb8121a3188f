use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quill_api::{build_router, config::Config, state::AppState};
use quill_persist::PersistBuilder;
use quill_runner::{EchoProducer, Producer, StreamSweeper};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;

    // Initialize logging
    init_logging(&config);

    tracing::info!("Starting Quill API server");
    tracing::info!("Config loaded: {}:{}", config.server.host, config.server.port);

    // Initialize persistence
    tracing::info!(backend = ?config.storage.backend, "Initializing persistence");
    let mut builder = PersistBuilder::new()
        .backend(config.storage.backend)
        .database(config.storage.database.clone())
        .poll_interval(config.stream.poll_interval());
    if let Some(uri) = &config.mongodb_uri {
        builder = builder.mongodb_uri(uri.clone());
    }
    let persistence = builder.build().await?;

    let producer: Arc<dyn Producer> = Arc::new(EchoProducer::new(config.stream.chunk_delay()));

    // Finalize streams abandoned before a driver attached or by a dead process
    let sweeper = Arc::new(StreamSweeper::new(
        Arc::clone(&persistence.streams),
        Arc::clone(&persistence.chat),
        config.stream.stale_after(),
        config.stream.sweep_interval(),
        config.stream.error_text.clone(),
    ))
    .spawn();

    // Create application state
    let state = Arc::new(AppState::new(config.clone(), persistence, producer));

    // Build router
    let app = build_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("API docs: http://{}/api/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        // Without a signal handler keep serving until the process is killed
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn init_logging(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    match config.logging.format.as_str() {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }
}
