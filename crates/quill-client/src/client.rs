use futures::{Stream, StreamExt};
use quill_types::{AttachRequest, StreamEvent, StreamId, StreamRead};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Response, StatusCode};
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::error::{ClientError, Result};
use crate::sse::parse_event_stream;
use crate::state::ClientState;

/// How a client attaches to a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachMode {
    /// Ask the server to start the producer if nobody has yet
    Drive,
    /// Only read
    Observe,
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Attempts after a 404 before giving up (the stream may not be visible yet)
    pub not_found_retries: u32,
    pub retry_delay: Duration,
    /// Reconnects after a connection ends without a terminal event
    pub max_reconnects: u32,
    pub connect_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            not_found_retries: 3,
            retry_delay: Duration::from_millis(500),
            max_reconnects: 5,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

pub type EventStream = Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>>;

/// HTTP client for the stream endpoints
#[derive(Clone)]
pub struct StreamClient {
    http_client: reqwest::Client,
    base_url: String,
    options: ClientOptions,
}

impl StreamClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::with_options(base_url, ClientOptions::default())
    }

    pub fn with_options(base_url: impl Into<String>, options: ClientOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        // No overall timeout: event streams stay open as long as the producer runs
        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(options.connect_timeout)
            .build()?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            options,
        })
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Open one event-stream connection
    pub async fn open(&self, request: &AttachRequest) -> Result<EventStream> {
        let response = self
            .http_client
            .post(format!("{}/chat-stream", self.base_url))
            .json(request)
            .send()
            .await?;

        let response = Self::check_status(response, &request.stream_id).await?;
        Ok(parse_event_stream(response))
    }

    /// One-shot read of the current text, or the suffix after `from_generation`
    pub async fn read(&self, stream_id: &StreamId, from_generation: Option<u64>) -> Result<StreamRead> {
        let mut request = self
            .http_client
            .get(format!("{}/streams/{}", self.base_url, stream_id))
            .header(ACCEPT, "application/json");
        if let Some(generation) = from_generation {
            request = request.query(&[("fromGeneration", generation)]);
        }

        let response = Self::check_status(request.send().await?, stream_id).await?;
        Ok(response.json().await?)
    }

    /// Current full text and status of a stream
    pub async fn snapshot(&self, stream_id: &StreamId) -> Result<StreamRead> {
        self.read(stream_id, None).await
    }

    /// Attach to a stream in the background
    ///
    /// The returned handle publishes every state change. A connect that
    /// fails before the server answered is retried with the same intent.
    /// Once a connection has delivered events and ends before the stream is
    /// terminal, the handle reconnects as an observer and takes the full text
    /// again, so a reconnect never appends a chunk twice.
    pub fn attach(&self, stream_id: StreamId, mode: AttachMode) -> StreamHandle {
        let (state_tx, state_rx) = watch::channel(ClientState::default());
        let client = self.clone();
        let task = tokio::spawn(async move { client.run_attachment(stream_id, mode, state_tx).await });

        StreamHandle {
            state: state_rx,
            task,
        }
    }

    async fn run_attachment(
        self,
        stream_id: StreamId,
        mode: AttachMode,
        state_tx: watch::Sender<ClientState>,
    ) -> Result<ClientState> {
        let mut request = match mode {
            AttachMode::Drive => AttachRequest::drive(stream_id.clone()),
            AttachMode::Observe => AttachRequest::observe(stream_id.clone()),
        };
        let mut not_found = 0;
        let mut reconnects = 0;

        loop {
            let mut events = match self.open(&request).await {
                Ok(events) => events,
                Err(ClientError::NotFound(_)) if not_found < self.options.not_found_retries => {
                    not_found += 1;
                    tracing::debug!(stream_id = %stream_id, attempt = not_found, "Stream not found yet, retrying");
                    tokio::time::sleep(self.options.retry_delay).await;
                    continue;
                }
                Err(e @ ClientError::Http(_)) if reconnects < self.options.max_reconnects => {
                    reconnects += 1;
                    tracing::warn!(
                        stream_id = %stream_id,
                        drive = request.drive_intent,
                        error = %e,
                        "Attach failed, retrying"
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let mut delivered = false;
            while let Some(item) = events.next().await {
                let event = match item {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::warn!(stream_id = %stream_id, error = %e, "Event stream broke");
                        break;
                    }
                };

                delivered = true;
                state_tx.send_modify(|state| state.apply(&event));
                let state = state_tx.borrow().clone();

                if state.is_terminal() {
                    return Ok(state);
                }
                if state.needs_resync {
                    tracing::debug!(stream_id = %stream_id, "Chunk gap detected, resyncing");
                    break;
                }
            }

            if reconnects >= self.options.max_reconnects {
                return Err(ClientError::Disconnected);
            }
            reconnects += 1;

            // Once the server has answered, never re-drive and never resume from an offset
            if delivered {
                request = AttachRequest::observe(stream_id.clone());
            }
            tracing::info!(
                stream_id = %stream_id,
                reconnects,
                drive = request.drive_intent,
                "Reconnecting"
            );
            tokio::time::sleep(self.options.retry_delay).await;
        }
    }

    async fn check_status(response: Response, stream_id: &StreamId) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(stream_id.clone()));
        }

        let message = response.text().await.unwrap_or_default();
        Err(ClientError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

/// Live view of one attached stream
pub struct StreamHandle {
    state: watch::Receiver<ClientState>,
    task: JoinHandle<Result<ClientState>>,
}

impl StreamHandle {
    /// Latest state
    pub fn state(&self) -> ClientState {
        self.state.borrow().clone()
    }

    /// Receiver notified on every state change
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.clone()
    }

    /// Wait until the stream is done or failed
    pub async fn wait_terminal(self) -> Result<ClientState> {
        self.task
            .await
            .map_err(|e| ClientError::Internal(format!("Attach task failed: {}", e)))?
    }

    /// Stop following; the stream itself is unaffected
    pub fn detach(self) {
        self.task.abort();
    }
}
