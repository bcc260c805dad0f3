use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::mpsc;

use super::base::{Provider, StreamChunk, StreamReceiver, Usage};
use super::configs::AnthropicProviderConfig;
use crate::errors::{AgentError, ProviderError};
use crate::models::content::{Content, ImageContent, TextContent};
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolCall};

const ANTHROPIC_VERSION: &str = "2023-06-01";
const PROMPT_CACHING_BETA: &str = "prompt-caching-2024-07-31";
const DEFAULT_MAX_TOKENS: i32 = 4096;

pub struct AnthropicProvider {
    client: Client,
    config: AnthropicProviderConfig,
}

impl AnthropicProvider {
    pub fn new(config: AnthropicProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client, config })
    }

    fn text_block(text: &TextContent) -> Value {
        let mut block = json!({
            "type": "text",
            "text": text.text,
        });
        if let Some(cache_control) = &text.cache_control {
            block["cache_control"] = json!(cache_control);
        }
        block
    }

    fn image_block(image: &ImageContent) -> Value {
        let mut block = json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": image.mime_type,
                "data": image.data,
            },
        });
        if let Some(cache_control) = &image.cache_control {
            block["cache_control"] = json!(cache_control);
        }
        block
    }

    fn content_blocks(contents: &[Content]) -> Vec<Value> {
        contents
            .iter()
            .filter(|content| {
                content
                    .audience()
                    .map(|audience| audience.contains(&Role::Assistant))
                    .unwrap_or(true)
            })
            .map(|content| match content {
                Content::Text(text) => Self::text_block(text),
                Content::Image(image) => Self::image_block(image),
            })
            .collect()
    }

    /// The system parameter is a content-block array: the fixed instruction
    /// first, permanently marked as a cache boundary, then any system
    /// messages the caller's transcript carries.
    fn system_to_anthropic_spec(system: &str, messages: &[Message]) -> Value {
        let mut blocks = vec![json!({
            "type": "text",
            "text": system,
            "cache_control": {"type": "ephemeral"},
        })];

        for message in messages.iter().filter(|m| m.role == Role::System) {
            for content in &message.content {
                match content {
                    MessageContent::Text(text) => blocks.push(Self::text_block(text)),
                    MessageContent::Image(image) => blocks.push(Self::image_block(image)),
                    _ => {}
                }
            }
        }

        json!(blocks)
    }

    fn messages_to_anthropic_spec(messages: &[Message]) -> Vec<Value> {
        let mut anthropic_messages = Vec::new();

        for message in messages {
            match message.role {
                Role::System => {} // folded into the system parameter
                Role::User => {
                    let mut blocks = Vec::new();
                    for content in &message.content {
                        match content {
                            MessageContent::Text(text) => blocks.push(Self::text_block(text)),
                            MessageContent::Image(image) => blocks.push(Self::image_block(image)),
                            _ => {}
                        }
                    }
                    if !blocks.is_empty() {
                        anthropic_messages.push(json!({
                            "role": "user",
                            "content": blocks,
                        }));
                    }
                }
                Role::Assistant => {
                    let mut blocks = Vec::new();
                    for content in &message.content {
                        match content {
                            MessageContent::Text(text) => {
                                if !text.text.is_empty() {
                                    blocks.push(Self::text_block(text));
                                }
                            }
                            MessageContent::ToolRequest(request) => match &request.tool_call {
                                Ok(tool_call) => blocks.push(json!({
                                    "type": "tool_use",
                                    "id": request.id,
                                    "name": tool_call.name,
                                    "input": tool_call.arguments,
                                })),
                                // A call the model got wrong still needs its
                                // id in the history so the paired error
                                // result stays linked.
                                Err(_) => blocks.push(json!({
                                    "type": "tool_use",
                                    "id": request.id,
                                    "name": "invalid_tool",
                                    "input": {},
                                })),
                            },
                            _ => {}
                        }
                    }
                    if !blocks.is_empty() {
                        anthropic_messages.push(json!({
                            "role": "assistant",
                            "content": blocks,
                        }));
                    }
                }
                Role::Tool => {
                    for content in &message.content {
                        if let MessageContent::ToolResponse(response) = content {
                            let block = match &response.tool_result {
                                Ok(contents) => json!({
                                    "type": "tool_result",
                                    "tool_use_id": response.id,
                                    "content": Self::content_blocks(contents),
                                }),
                                Err(error) => json!({
                                    "type": "tool_result",
                                    "tool_use_id": response.id,
                                    "content": [{"type": "text", "text": format!("Error: {}", error)}],
                                    "is_error": true,
                                }),
                            };
                            anthropic_messages.push(json!({
                                "role": "user",
                                "content": [block],
                            }));
                        }
                    }
                }
            }
        }

        anthropic_messages
    }

    fn tools_to_anthropic_spec(tools: &[Tool]) -> Value {
        let tool_specs: Vec<Value> = tools
            .iter()
            .map(|tool| {
                json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect();
        json!(tool_specs)
    }

    fn build_payload(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
        stream: bool,
    ) -> Value {
        let mut payload = json!({
            "model": self.config.model,
            "system": Self::system_to_anthropic_spec(system, messages),
            "messages": Self::messages_to_anthropic_spec(messages),
            "max_tokens": self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
        });

        if let Some(temperature) = self.config.temperature {
            payload["temperature"] = json!(temperature);
        }
        if !tools.is_empty() {
            payload["tools"] = Self::tools_to_anthropic_spec(tools);
        }
        if stream {
            payload["stream"] = json!(true);
        }

        payload
    }

    fn get_usage(data: &Value) -> Usage {
        let usage = &data["usage"];
        let input_tokens = usage["input_tokens"].as_i64().map(|n| n as i32);
        let output_tokens = usage["output_tokens"].as_i64().map(|n| n as i32);
        let total_tokens = match (input_tokens, output_tokens) {
            (Some(i), Some(o)) => Some(i + o),
            _ => None,
        };
        Usage::new(input_tokens, output_tokens, total_tokens)
    }

    fn parse_message(data: &Value) -> Result<Message, ProviderError> {
        let content = data
            .get("content")
            .and_then(|c| c.as_array())
            .ok_or_else(|| {
                ProviderError::Response("missing content array in response".to_string())
            })?;

        let mut message = Message::assistant();
        for block in content {
            match block["type"].as_str() {
                Some("text") => {
                    if let Some(text) = block["text"].as_str() {
                        message = message.with_text(text);
                    }
                }
                Some("tool_use") => {
                    let id = block["id"].as_str().unwrap_or_default().to_string();
                    let name = block["name"].as_str().unwrap_or_default().to_string();
                    message = message
                        .with_tool_request(id, Ok(ToolCall::new(name, block["input"].clone())));
                }
                _ => {}
            }
        }
        Ok(message)
    }

    async fn post(&self, payload: &Value) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/v1/messages", self.config.host.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("anthropic-beta", PROMPT_CACHING_BETA)
            .json(payload)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        match response.status() {
            StatusCode::OK => Ok(response),
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(5);
                Err(ProviderError::RateLimited { retry_after_secs })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(
                ProviderError::Authentication("invalid Anthropic API key".to_string()),
            ),
            status => {
                let message = response.text().await.unwrap_or_default();
                tracing::warn!(%status, "Anthropic API error");
                Err(ProviderError::Api {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    async fn complete(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<(Message, Usage), ProviderError> {
        let payload = self.build_payload(system, messages, tools, false);

        tracing::debug!(model = %self.config.model, "sending completion request");
        let response = self.post(&payload).await?;
        let data: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Response(e.to_string()))?;

        let message = Self::parse_message(&data)?;
        let usage = Self::get_usage(&data);
        Ok((message, usage))
    }

    async fn stream(
        &self,
        system: &str,
        messages: &[Message],
        tools: &[Tool],
    ) -> Result<StreamReceiver, ProviderError> {
        let payload = self.build_payload(system, messages, tools, true);

        tracing::debug!(model = %self.config.model, "sending streaming request");
        let response = self.post(&payload).await?;

        let (tx, rx) = mpsc::channel(64);

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            let mut full_text = String::new();
            let mut input_tokens: Option<i32> = None;
            let mut output_tokens: Option<i32> = None;

            // Tool-use accumulators; arguments stream in as partial JSON.
            let mut tool_uses: Vec<(String, String, String)> = Vec::new();
            let mut current_tool: Option<(String, String, String)> = None;

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }
                    let data = match line.strip_prefix("data: ") {
                        Some(data) if !data.trim().is_empty() => data.trim().to_string(),
                        _ => continue,
                    };

                    let event: Value = match serde_json::from_str(&data) {
                        Ok(event) => event,
                        Err(e) => {
                            tracing::trace!(error = %e, "ignoring unparseable SSE data");
                            continue;
                        }
                    };

                    match event["type"].as_str().unwrap_or_default() {
                        "message_start" => {
                            input_tokens = event["message"]["usage"]["input_tokens"]
                                .as_i64()
                                .map(|n| n as i32);
                        }
                        "content_block_start" => {
                            let block = &event["content_block"];
                            if block["type"].as_str() == Some("tool_use") {
                                if let Some(tool) = current_tool.take() {
                                    tool_uses.push(tool);
                                }
                                current_tool = Some((
                                    block["id"].as_str().unwrap_or_default().to_string(),
                                    block["name"].as_str().unwrap_or_default().to_string(),
                                    String::new(),
                                ));
                            }
                        }
                        "content_block_delta" => match event["delta"]["type"].as_str() {
                            Some("text_delta") => {
                                if let Some(text) = event["delta"]["text"].as_str() {
                                    full_text.push_str(text);
                                    if tx.send(Ok(StreamChunk::delta(text))).await.is_err() {
                                        return;
                                    }
                                }
                            }
                            Some("input_json_delta") => {
                                if let Some((_, _, args)) = current_tool.as_mut() {
                                    args.push_str(
                                        event["delta"]["partial_json"].as_str().unwrap_or_default(),
                                    );
                                }
                            }
                            _ => {}
                        },
                        "content_block_stop" => {
                            if let Some(tool) = current_tool.take() {
                                tool_uses.push(tool);
                            }
                        }
                        "message_delta" => {
                            if let Some(tokens) = event["usage"]["output_tokens"].as_i64() {
                                output_tokens = Some(tokens as i32);
                            }
                        }
                        "message_stop" => {
                            if let Some(tool) = current_tool.take() {
                                tool_uses.push(tool);
                            }

                            let mut message = Message::assistant();
                            if !full_text.is_empty() {
                                message = message.with_text(full_text.clone());
                            }
                            for (id, name, args) in tool_uses.drain(..) {
                                let tool_call = if args.trim().is_empty() {
                                    Ok(ToolCall::new(name, json!({})))
                                } else {
                                    match serde_json::from_str(&args) {
                                        Ok(arguments) => Ok(ToolCall::new(name, arguments)),
                                        Err(e) => Err(AgentError::InvalidParameters(format!(
                                            "tool '{}' arguments were not valid JSON: {}",
                                            name, e
                                        ))),
                                    }
                                };
                                message = message.with_tool_request(id, tool_call);
                            }

                            let total_tokens = match (input_tokens, output_tokens) {
                                (Some(i), Some(o)) => Some(i + o),
                                _ => None,
                            };
                            let usage = Usage::new(input_tokens, output_tokens, total_tokens);
                            let _ = tx.send(Ok(StreamChunk::done(message, Some(usage)))).await;
                            return;
                        }
                        _ => {}
                    }
                }
            }

            let _ = tx
                .send(Err(ProviderError::StreamInterrupted(
                    "stream ended before message_stop".to_string(),
                )))
                .await;
        });

        Ok(rx)
    }
}
