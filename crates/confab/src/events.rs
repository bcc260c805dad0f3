//! Turn-level streaming events.
//!
//! `TurnEvent` is the live, ordered sequence a caller consumes while a
//! turn executes: state transitions, partial model output, tool
//! invocation progress, finalized transcript messages, and the final
//! answer. Delivery order follows production order — deltas arrive before
//! the finalized assistant message, tool starts before tool results.

use serde::{Deserialize, Serialize};

use crate::models::message::Message;

/// The phases of one conversational turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    /// The model is producing the next assistant message
    Agent,
    /// Pending tool calls are being resolved
    Tools,
    /// The final answer has been reached
    End,
}

/// Events emitted while a turn executes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    /// The state machine entered a new state.
    StateEntered { state: TurnState },

    /// Partial text from the model.
    TextDelta { content: String },

    /// A tool invocation began.
    ToolStarted { id: String, name: String },

    /// A tool invocation resolved into a result.
    ToolCompleted { id: String, is_error: bool },

    /// A message was finalized and appended to the turn's transcript.
    Message { message: Message },

    /// The turn ended with this final assistant answer.
    Completed { message: Message },
}

impl TurnEvent {
    /// SSE event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::StateEntered { .. } => "state_entered",
            Self::TextDelta { .. } => "text_delta",
            Self::ToolStarted { .. } => "tool_started",
            Self::ToolCompleted { .. } => "tool_completed",
            Self::Message { .. } => "message",
            Self::Completed { .. } => "completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_entered_serialization() {
        let event = TurnEvent::StateEntered {
            state: TurnState::Agent,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"state_entered""#));
        assert!(json.contains(r#""state":"agent""#));
    }

    #[test]
    fn test_text_delta_serialization() {
        let event = TurnEvent::TextDelta {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"text_delta""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn test_event_types_match_variants() {
        let event = TurnEvent::ToolStarted {
            id: "1".into(),
            name: "calculator".into(),
        };
        assert_eq!(event.event_type(), "tool_started");
    }
}
