use crate::state::AppState;
use axum::{
    extract::State,
    http::{self, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use confab::{
    events::TurnEvent,
    models::content::Content,
    models::message::Message,
    models::tool::ToolCall,
};
use futures::{Stream, TryStreamExt};
use serde::Deserialize;
use serde_json::{json, Value};
use std::{
    convert::Infallible,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

// Types matching the incoming JSON structure
#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(rename = "chatId")]
    chat_id: String,
    messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
struct IncomingMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default)]
    #[serde(rename = "toolInvocations")]
    tool_invocations: Vec<ToolInvocation>,
}

#[derive(Debug, Deserialize)]
struct ToolInvocation {
    state: String,
    #[serde(rename = "toolCallId")]
    tool_call_id: String,
    #[serde(rename = "toolName")]
    tool_name: String,
    args: Value,
    result: Option<Vec<Content>>,
}

// Custom SSE response streaming turn events to the client
pub struct SseResponse {
    rx: ReceiverStream<String>,
}

impl SseResponse {
    fn new(rx: ReceiverStream<String>) -> Self {
        Self { rx }
    }
}

impl Stream for SseResponse {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx)
            .poll_next(cx)
            .map(|opt| opt.map(|s| Ok(Bytes::from(s))))
    }
}

impl IntoResponse for SseResponse {
    fn into_response(self) -> axum::response::Response {
        let stream = self;
        let body = axum::body::Body::from_stream(stream);

        http::Response::builder()
            .header("Content-Type", "text/event-stream")
            .header("Cache-Control", "no-cache")
            .header("Connection", "keep-alive")
            .body(body)
            .unwrap()
    }
}

// Convert incoming messages to our internal Message type
fn convert_messages(incoming: Vec<IncomingMessage>) -> Vec<Message> {
    let mut messages = Vec::new();

    for msg in incoming {
        match msg.role.as_str() {
            "system" => {
                messages.push(Message::system().with_text(msg.content));
            }
            "user" => {
                messages.push(Message::user().with_text(msg.content));
            }
            "assistant" => {
                // First replay any tool invocations - each represents a
                // complete request/response cycle
                for tool in msg.tool_invocations {
                    if tool.state == "result" {
                        // The original tool request from the assistant
                        let tool_call = ToolCall {
                            name: tool.tool_name,
                            arguments: tool.args,
                        };
                        messages.push(
                            Message::assistant()
                                .with_tool_request(tool.tool_call_id.clone(), Ok(tool_call)),
                        );

                        // The tool result that answered it
                        if let Some(result) = tool.result {
                            messages.push(
                                Message::tool().with_tool_response(tool.tool_call_id, Ok(result)),
                            );
                        }
                    }
                }

                // Then the assistant's text response after tool interactions
                if !msg.content.is_empty() {
                    messages.push(Message::assistant().with_text(msg.content));
                }
            }
            _ => {
                tracing::warn!("Unknown role: {}", msg.role);
            }
        }
    }

    messages
}

// SSE framing of turn events
struct EventFormatter;

impl EventFormatter {
    fn format_event(event: &TurnEvent) -> String {
        let data = serde_json::to_string(event).unwrap_or_else(|_| String::from("{}"));
        format!("event: {}\ndata: {}\n\n", event.event_type(), data)
    }

    fn format_error(message: &str) -> String {
        let data = json!({"message": message});
        format!("event: error\ndata: {}\n\n", data)
    }

    fn format_finish(reason: &str) -> String {
        let data = json!({"finishReason": reason});
        format!("event: done\ndata: {}\n\n", data)
    }
}

async fn handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> Result<SseResponse, StatusCode> {
    // The identity provider fronting this server injects the verified
    // user id; without one no turn begins.
    let user_id = headers
        .get("x-user-id")
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(StatusCode::UNAUTHORIZED)?
        .to_string();

    let run_id = Uuid::new_v4();
    tracing::info!(%run_id, user_id = %user_id, chat_id = %request.chat_id, "starting turn");

    // Create channel for streaming
    let (tx, rx) = mpsc::channel(100);
    let stream = ReceiverStream::new(rx);

    let messages = convert_messages(request.messages);
    let chat_id = request.chat_id;
    let agent = state.agent.clone();

    // Spawn task to drive the turn and relay its events
    tokio::spawn(async move {
        let mut events = match agent.run_turn(&messages, &chat_id).await {
            Ok(events) => events,
            Err(e) => {
                tracing::error!(%run_id, "failed to start turn: {}", e);
                let _ = tx.send(EventFormatter::format_error(&e.to_string())).await;
                let _ = tx.send(EventFormatter::format_finish("error")).await;
                return;
            }
        };

        loop {
            match timeout(Duration::from_millis(500), events.try_next()).await {
                Ok(Ok(Some(event))) => {
                    if tx.send(EventFormatter::format_event(&event)).await.is_err() {
                        tracing::debug!(%run_id, "client disconnected mid-turn");
                        return;
                    }
                }
                Ok(Ok(None)) => {
                    break;
                }
                Ok(Err(e)) => {
                    // A turn-level failure closes the stream with a final
                    // error event so the caller can tell an abort from a
                    // finished answer
                    tracing::error!(%run_id, "turn failed: {}", e);
                    let _ = tx.send(EventFormatter::format_error(&e.to_string())).await;
                    let _ = tx.send(EventFormatter::format_finish("error")).await;
                    return;
                }
                Err(_) => {
                    // Heartbeat, used to detect disconnected clients
                    if tx.is_closed() {
                        tracing::debug!(%run_id, "client disconnected mid-turn");
                        return;
                    }
                    continue;
                }
            }
        }

        let _ = tx.send(EventFormatter::format_finish("stop")).await;
    });

    Ok(SseResponse::new(stream))
}

// Configure routes for this module
pub fn routes(state: AppState) -> Router {
    Router::new().route("/reply", post(handler)).with_state(state)
}
