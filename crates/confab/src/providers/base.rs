use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub input_tokens: Option<i32>,
    pub output_tokens: Option<i32>,
    pub total_tokens: Option<i32>,
}

impl Usage {
    pub fn new(
        input_tokens: Option<i32>,
        output_tokens: Option<i32>,
        total_tokens: Option<i32>,
    ) -> Self {
        Self {
            input_tokens,
            output_tokens,
            total_tokens,
        }
    }
}

/// One increment of a streamed completion.
///
/// Intermediate chunks carry a text delta; the terminal chunk has `done`
/// set and carries the finalized message plus usage when the provider
/// reports it.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub content: Option<String>,
    pub message: Option<Message>,
    pub usage: Option<Usage>,
    pub done: bool,
}

impl StreamChunk {
    pub fn delta<S: Into<String>>(content: S) -> Self {
        Self {
            content: Some(content.into()),
            message: None,
            usage: None,
            done: false,
        }
    }

    pub fn done(message: Message, usage: Option<Usage>) -> Self {
        Self {
            content: None,
            message: Some(message),
            usage,
            done: true,
        }
    }
}

pub type StreamReceiver = mpsc::Receiver<Result<StreamChunk, ProviderError>>;

/// Base trait for AI providers (Anthropic, mocks, etc)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate the next message for the given transcript and tool set
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError>;

    /// Generate the next message as a stream of partial chunks.
    ///
    /// The default implementation degrades to a single completion followed
    /// by the terminal chunk, for providers without a streaming transport.
    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<StreamReceiver, ProviderError> {
        let (message, usage) = self.complete(system, messages, tools).await?;
        let (tx, rx) = mpsc::channel(4);
        let text = message.text();
        if !text.is_empty() {
            let _ = tx.send(Ok(StreamChunk::delta(text))).await;
        }
        let _ = tx.send(Ok(StreamChunk::done(message, Some(usage)))).await;
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_usage_creation() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        assert_eq!(usage.input_tokens, Some(10));
        assert_eq!(usage.output_tokens, Some(20));
        assert_eq!(usage.total_tokens, Some(30));
    }

    #[test]
    fn test_usage_serialization() {
        let usage = Usage::new(Some(10), Some(20), Some(30));
        let serialized = serde_json::to_string(&usage).unwrap();
        let json_value: serde_json::Value = serde_json::from_str(&serialized).unwrap();
        assert_eq!(json_value["input_tokens"], json!(10));
        assert_eq!(json_value["output_tokens"], json!(20));
        assert_eq!(json_value["total_tokens"], json!(30));
    }
}
