use anyhow::{anyhow, Result};
use async_trait::async_trait;
use quill_persist::MessageRole;
use std::time::Duration;

use crate::producer::{ChunkAppender, ProduceContext, Producer};

const GREETING: &str = "Hello! How can I help you?";

/// Demo producer that answers the latest user message one character at a time
#[derive(Debug, Clone)]
pub struct EchoProducer {
    chunk_delay: Duration,
}

impl EchoProducer {
    pub fn new(chunk_delay: Duration) -> Self {
        Self { chunk_delay }
    }

    fn reply_to(content: &str) -> String {
        format!(
            "Hello! You said \"{}\". I'm an AI assistant. How can I help you?",
            content
        )
    }
}

impl Default for EchoProducer {
    fn default() -> Self {
        Self::new(Duration::from_millis(20))
    }
}

#[async_trait]
impl Producer for EchoProducer {
    async fn produce(&self, ctx: ProduceContext, appender: ChunkAppender) -> Result<String> {
        let message = ctx
            .chat
            .message_by_stream_id(&ctx.stream_id)
            .await?
            .ok_or_else(|| anyhow!("No message found for stream {}", ctx.stream_id))?;

        let history = ctx
            .chat
            .messages_in_conversation(&message.conversation_id)
            .await?;

        let response = history
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| Self::reply_to(&m.content))
            .unwrap_or_else(|| GREETING.to_string());

        let mut buf = [0u8; 4];
        for ch in response.chars() {
            appender.append(ch.encode_utf8(&mut buf)).await?;
            if !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }

        Ok(response)
    }

    fn name(&self) -> &str {
        "echo"
    }
}
