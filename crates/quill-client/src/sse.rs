use futures::{Stream, StreamExt};
use quill_types::StreamEvent;
use reqwest::Response;
use std::collections::VecDeque;
use std::pin::Pin;

use crate::error::{ClientError, Result};

/// Line buffer over a byte stream
///
/// Network chunks can split a line (or a multi-byte character) anywhere, so
/// bytes are only decoded once a full line is available.
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
}

impl CircularLineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Next complete line without its line terminator, `None` if none is buffered
    pub fn next_line(&mut self) -> Option<Result<String>> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();

        match String::from_utf8(line_bytes) {
            Ok(line) => Some(Ok(line.trim_end_matches(|c: char| c == '\n' || c == '\r').to_string())),
            Err(e) => Some(Err(ClientError::Decode(format!("Invalid UTF-8: {}", e)))),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Decode one SSE line into an event
///
/// Only `data:` lines carry events; the `event:` name is redundant with the
/// JSON `type` tag, and comment lines are keep-alives.
pub fn parse_line(line: &str) -> Option<Result<StreamEvent>> {
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() {
        return None;
    }
    Some(serde_json::from_str(data).map_err(|e| ClientError::Decode(e.to_string())))
}

/// Turn an SSE response body into stream events
///
/// The stream ends when the server closes the connection. Transport errors
/// are yielded once and end the stream.
pub fn parse_event_stream(
    response: Response,
) -> Pin<Box<dyn Stream<Item = Result<StreamEvent>> + Send>> {
    let stream = response.bytes_stream();

    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(stream);
        let mut buffer = CircularLineBuffer::with_capacity(4096);

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(bytes) => {
                    buffer.extend(&bytes);

                    while let Some(line_result) = buffer.next_line() {
                        match line_result {
                            Ok(line) => {
                                if let Some(event) = parse_line(&line) {
                                    yield event;
                                }
                            }
                            Err(e) => yield Err(e),
                        }
                    }
                }
                Err(e) => {
                    yield Err(ClientError::Http(e));
                    break;
                }
            }
        }
    })
}
