use async_trait::async_trait;
use std::sync::Arc;
use std::sync::Mutex;
use tokio::sync::mpsc;

use crate::errors::ProviderError;
use crate::models::message::Message;
use crate::models::tool::Tool;
use crate::providers::base::{Provider, StreamChunk, StreamReceiver, Usage};

/// A mock provider that returns pre-configured responses for testing
pub struct MockProvider {
    responses: Arc<Mutex<Vec<Message>>>,
}

impl MockProvider {
    /// Create a new mock provider with a sequence of responses
    pub fn new(responses: Vec<Message>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
        }
    }

    fn next_response(&self) -> Message {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            // Return empty response if no more pre-configured responses
            Message::assistant().with_text("")
        } else {
            responses.remove(0)
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn complete(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        Ok((self.next_response(), Usage::default()))
    }

    async fn stream(
        &self,
        _system: &str,
        _messages: &[Message],
        _tools: &[Tool],
    ) -> Result<StreamReceiver, ProviderError> {
        let message = self.next_response();
        let (tx, rx) = mpsc::channel(8);

        // Split the text roughly in half so consumers observe more than
        // one delta before the finalized message.
        let text = message.text();
        if !text.is_empty() {
            let mid = text
                .char_indices()
                .nth(text.chars().count() / 2)
                .map(|(i, _)| i)
                .unwrap_or(0);
            let (head, tail) = text.split_at(mid);
            for part in [head, tail] {
                if !part.is_empty() {
                    let _ = tx.send(Ok(StreamChunk::delta(part))).await;
                }
            }
        }
        let _ = tx
            .send(Ok(StreamChunk::done(message, Some(Usage::default()))))
            .await;
        Ok(rx)
    }
}
