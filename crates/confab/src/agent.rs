use anyhow::{anyhow, Result};
use futures::stream::BoxStream;
use serde::Serialize;
use std::collections::HashMap;

use crate::cache::annotate_cache_boundaries;
use crate::checkpoint::MemoryCheckpointer;
use crate::events::{TurnEvent, TurnState};
use crate::models::message::{Message, ToolRequest};
use crate::prompt_template::{load_prompt, SYSTEM_TEMPLATE};
use crate::providers::base::Provider;
use crate::registry::ToolRegistry;
use crate::toolset::Toolset;
use crate::transcript::{trim_messages, TrimConfig};

#[derive(Clone, Debug, Serialize)]
struct ToolsetInfo {
    name: String,
    description: String,
    instructions: String,
}

impl ToolsetInfo {
    fn new(name: &str, description: &str, instructions: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            instructions: instructions.to_string(),
        }
    }
}

/// Options governing one turn's execution.
#[derive(Debug, Clone)]
pub struct TurnConfig {
    /// How the transcript is bounded before each model invocation
    pub trim: TrimConfig,
    /// Stream partial model output instead of waiting for completion
    pub streaming: bool,
    /// Upper bound on agent steps within one turn. `None` leaves the
    /// agent/tools loop unbounded; termination then rests on the model
    /// and the system instruction.
    pub max_steps: Option<u32>,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            trim: TrimConfig::default(),
            streaming: true,
            max_steps: None,
        }
    }
}

/// Agent drives one conversational turn: the model produces the next
/// assistant message, requested tools are resolved into the transcript,
/// and the loop continues until the model answers without calling tools.
pub struct Agent {
    provider: Box<dyn Provider>,
    registry: ToolRegistry,
    config: TurnConfig,
}

impl Agent {
    /// Create a new Agent with the specified provider
    pub fn new(provider: Box<dyn Provider>) -> Self {
        Self {
            provider,
            registry: ToolRegistry::new(),
            config: TurnConfig::default(),
        }
    }

    /// Replace the default turn configuration
    pub fn with_config(mut self, config: TurnConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a toolset to the agent
    pub fn add_toolset(&mut self, toolset: Box<dyn Toolset>) {
        self.registry.add_toolset(toolset);
    }

    fn system_prompt(&self) -> Result<String> {
        let toolsets: Vec<ToolsetInfo> = self
            .registry
            .toolsets()
            .iter()
            .map(|toolset| {
                ToolsetInfo::new(toolset.name(), toolset.description(), toolset.instructions())
            })
            .collect();

        let mut context = HashMap::new();
        context.insert("toolsets", toolsets);
        load_prompt(SYSTEM_TEMPLATE, &context).map_err(|e| anyhow!(e.to_string()))
    }

    /// Run one turn against the supplied transcript, which already
    /// contains the new user message.
    ///
    /// Returns a live stream of execution events; nothing is buffered
    /// ahead of the caller. The caller may stop consuming at any point —
    /// event delivery stops, though in-flight model or tool requests are
    /// not forcibly aborted. Checkpoints are keyed by `chat_id` and live
    /// only as long as the returned stream; concurrent turns on the same
    /// chat id should be serialized by the caller.
    pub async fn run_turn(
        &self,
        messages: &[Message],
        chat_id: &str,
    ) -> Result<BoxStream<'_, Result<TurnEvent>>> {
        let annotated = annotate_cache_boundaries(messages);
        let system_prompt = self.system_prompt()?;
        let tools = self.registry.tools();

        let checkpointer = MemoryCheckpointer::new();
        checkpointer.save(chat_id, &annotated);
        let chat_id = chat_id.to_string();

        Ok(Box::pin(async_stream::try_stream! {
            let mut transcript = annotated;
            let mut state = TurnState::Agent;
            let mut pending: Vec<ToolRequest> = Vec::new();
            let mut final_response: Option<Message> = None;
            let mut steps: u32 = 0;

            loop {
                tracing::debug!(chat_id = %chat_id, state = ?state, "entering state");
                yield TurnEvent::StateEntered { state };

                match state {
                    TurnState::Agent => {
                        if let Some(max_steps) = self.config.max_steps {
                            if steps >= max_steps {
                                Err::<(), anyhow::Error>(anyhow!(
                                    "turn exceeded the configured limit of {} agent steps",
                                    max_steps
                                ))?;
                            }
                        }
                        steps += 1;

                        let trimmed = trim_messages(&transcript, &self.config.trim);

                        let response = if self.config.streaming {
                            let mut rx = self
                                .provider
                                .stream(&system_prompt, &trimmed, &tools)
                                .await?;
                            let mut finalized: Option<Message> = None;
                            while let Some(chunk) = rx.recv().await {
                                let chunk = chunk?;
                                if let Some(content) = chunk.content {
                                    yield TurnEvent::TextDelta { content };
                                }
                                if chunk.done {
                                    finalized = chunk.message;
                                    break;
                                }
                            }
                            finalized.ok_or_else(|| {
                                anyhow!("model stream ended without a finalized message")
                            })?
                        } else {
                            let (message, _usage) = self
                                .provider
                                .complete(&system_prompt, &trimmed, &tools)
                                .await?;
                            message
                        };

                        transcript.push(response.clone());
                        checkpointer.save(&chat_id, &transcript);
                        yield TurnEvent::Message { message: response.clone() };

                        // Ensure the message above reaches the consumer
                        // before potentially long-running tool calls start
                        tokio::task::yield_now().await;

                        pending = response.tool_requests().into_iter().cloned().collect();
                        if pending.is_empty() {
                            final_response = Some(response);
                            state = TurnState::End;
                        } else {
                            state = TurnState::Tools;
                        }
                    }
                    TurnState::Tools => {
                        for request in &pending {
                            let name = match &request.tool_call {
                                Ok(tool_call) => tool_call.name.clone(),
                                Err(_) => "invalid_tool".to_string(),
                            };
                            yield TurnEvent::ToolStarted {
                                id: request.id.clone(),
                                name,
                            };
                        }

                        // Calls within one assistant message are causally
                        // unrelated; resolve them concurrently but wait for
                        // every one before returning to the agent.
                        let futures: Vec<_> = pending
                            .iter()
                            .map(|request| self.registry.dispatch(request.tool_call.clone()))
                            .collect();
                        let outputs = futures::future::join_all(futures).await;

                        for (request, output) in pending.drain(..).zip(outputs.into_iter()) {
                            let is_error = output.is_err();
                            if is_error {
                                tracing::warn!(id = %request.id, "tool call failed; folding error into transcript");
                            }
                            let tool_message =
                                Message::tool().with_tool_response(request.id.clone(), output);
                            transcript.push(tool_message.clone());
                            yield TurnEvent::ToolCompleted {
                                id: request.id,
                                is_error,
                            };
                            yield TurnEvent::Message { message: tool_message };
                        }
                        checkpointer.save(&chat_id, &transcript);

                        state = TurnState::Agent;
                    }
                    TurnState::End => {
                        if let Some(message) = final_response.take() {
                            yield TurnEvent::Completed { message };
                        }
                        break;
                    }
                }
            }
        }))
    }
}
