use config::{Config as ConfigLoader, ConfigError, Environment, File};
use quill_persist::StorageBackend;
use quill_runner::DEFAULT_ERROR_TEXT;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub mongodb_uri: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Applies to the JSON routes only, event streams stay open
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_request_timeout_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_database")]
    pub database: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Memory,
            database: default_database(),
        }
    }
}

fn default_database() -> String {
    "quill".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub producer_timeout_secs: u64,
    /// Follower re-read interval on backends without push notification
    pub poll_interval_ms: u64,
    pub keep_alive_secs: u64,
    /// Active streams idle this long are finalized as failed
    pub stale_after_secs: u64,
    pub sweep_interval_secs: u64,
    pub error_text: String,
    /// Delay between characters of the demo producer
    pub chunk_delay_ms: u64,
}

impl StreamConfig {
    pub fn producer_timeout(&self) -> Duration {
        Duration::from_secs(self.producer_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_after_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn chunk_delay(&self) -> Duration {
        Duration::from_millis(self.chunk_delay_ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            producer_timeout_secs: 120,
            poll_interval_ms: 250,
            keep_alive_secs: 15,
            stale_after_secs: 600,
            sweep_interval_secs: 60,
            error_text: DEFAULT_ERROR_TEXT.to_string(),
            chunk_delay_ms: 20,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables: `QUILL_<SECTION>__<KEY>`, e.g. `QUILL_SERVER__PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let builder = ConfigLoader::builder()
            // 1. Load default config
            .add_source(File::with_name("config/default").required(false))
            // 2. Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // 3. Environment variables override everything
            .add_source(
                Environment::with_prefix("QUILL")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors.origins"),
            );

        let mut cfg: Config = builder.build()?.try_deserialize()?;

        // Load secrets from ENV (not in TOML)
        cfg.mongodb_uri = std::env::var("MONGODB_URI").ok();
        if cfg.storage.backend == StorageBackend::Mongodb && cfg.mongodb_uri.is_none() {
            return Err(ConfigError::Message(
                "MONGODB_URI environment variable is required for the mongodb backend".to_string(),
            ));
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let cfg: Config = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let stream = &self.stream;
        if stream.poll_interval_ms == 0 || stream.keep_alive_secs == 0 || stream.sweep_interval_secs == 0 {
            return Err(ConfigError::Message(
                "stream.poll_interval_ms, keep_alive_secs and sweep_interval_secs must be positive".to_string(),
            ));
        }
        // The sweeper would otherwise fail streams whose producer is still inside its time budget
        if stream.stale_after_secs <= stream.producer_timeout_secs {
            return Err(ConfigError::Message(format!(
                "stream.stale_after_secs ({}) must exceed stream.producer_timeout_secs ({})",
                stream.stale_after_secs, stream.producer_timeout_secs
            )));
        }
        Ok(())
    }
}
