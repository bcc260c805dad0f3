//! Conversation-window trimming.
//!
//! Before each model invocation the transcript is cut down to a fixed
//! budget so old turns stop being resent. The budget counts whole
//! messages; partial inclusion is never allowed.

use crate::models::message::Message;
use crate::models::role::Role;

/// How the transcript is bounded before each model invocation.
#[derive(Debug, Clone)]
pub struct TrimConfig {
    /// Maximum number of messages sent to the model, counting the
    /// retained system message.
    pub max_messages: usize,
    /// Keep the first system message even when trimming would drop it.
    pub include_system: bool,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            max_messages: 10,
            include_system: true,
        }
    }
}

/// Returns the most recent messages that fit the budget.
///
/// The result is the retained system message (when configured) followed by
/// a contiguous suffix of the transcript that always begins at a user
/// message, so a tool call is never separated from the request that issued
/// it. If the budget cannot reach any user message, the suffix falls back
/// to starting at the most recent one so model input is never empty.
pub fn trim_messages(messages: &[Message], config: &TrimConfig) -> Vec<Message> {
    let system = if config.include_system {
        messages.iter().find(|m| m.role == Role::System).cloned()
    } else {
        None
    };

    let rest: Vec<&Message> = messages
        .iter()
        .filter(|m| m.role != Role::System)
        .collect();

    let budget = config
        .max_messages
        .saturating_sub(usize::from(system.is_some()));

    // Longest suffix within budget, advanced to the next user message.
    let mut start = rest.len().saturating_sub(budget);
    while start < rest.len() && rest[start].role != Role::User {
        start += 1;
    }
    if start >= rest.len() {
        // No user message fits the budget; keep the suffix from the most
        // recent one rather than sending the model nothing.
        start = rest
            .iter()
            .rposition(|m| m.role == Role::User)
            .unwrap_or(rest.len());
    }

    let mut trimmed: Vec<Message> = Vec::new();
    if let Some(system) = system {
        trimmed.push(system);
    }
    trimmed.extend(rest[start..].iter().map(|m| (*m).clone()));
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::Content;
    use crate::models::tool::ToolCall;
    use serde_json::json;

    fn transcript_with_tool_round() -> Vec<Message> {
        vec![
            Message::system().with_text("instructions"),
            Message::user().with_text("first question"),
            Message::assistant().with_text("first answer"),
            Message::user().with_text("what is 2+2?"),
            Message::assistant().with_tool_request(
                "1",
                Ok(ToolCall::new("calculator", json!({"expr": "2+2"}))),
            ),
            Message::tool().with_tool_response("1", Ok(vec![Content::text("4")])),
            Message::assistant().with_text("it is 4"),
            Message::user().with_text("thanks, one more"),
        ]
    }

    #[test]
    fn test_within_budget_keeps_everything() {
        let messages = transcript_with_tool_round();
        let trimmed = trim_messages(&messages, &TrimConfig::default());
        assert_eq!(trimmed.len(), messages.len());
    }

    #[test]
    fn test_suffix_starts_at_user_message() {
        let messages = transcript_with_tool_round();
        let config = TrimConfig {
            max_messages: 5,
            include_system: true,
        };
        let trimmed = trim_messages(&messages, &config);

        assert!(trimmed.len() <= 5);
        assert_eq!(trimmed[0].role, Role::System);
        assert_eq!(trimmed[1].role, Role::User);
    }

    #[test]
    fn test_never_splits_tool_round() {
        let messages = transcript_with_tool_round();
        // A budget that would land mid tool round if suffixes were naive
        let config = TrimConfig {
            max_messages: 4,
            include_system: true,
        };
        let trimmed = trim_messages(&messages, &config);

        // Any tool message retained must have its requesting assistant
        // message retained as well.
        for (i, message) in trimmed.iter().enumerate() {
            if message.role == Role::Tool {
                assert!(trimmed[..i]
                    .iter()
                    .any(|m| !m.tool_requests().is_empty()));
            }
        }
    }

    #[test]
    fn test_include_system_false_drops_system() {
        let messages = transcript_with_tool_round();
        let config = TrimConfig {
            max_messages: 3,
            include_system: false,
        };
        let trimmed = trim_messages(&messages, &config);
        assert!(trimmed.iter().all(|m| m.role != Role::System));
    }

    #[test]
    fn test_degenerate_budget_keeps_most_recent_user() {
        let messages = vec![
            Message::system().with_text("instructions"),
            Message::user().with_text("hello"),
        ];
        let config = TrimConfig {
            max_messages: 0,
            include_system: false,
        };
        let trimmed = trim_messages(&messages, &config);
        assert_eq!(trimmed.len(), 1);
        assert_eq!(trimmed[0].role, Role::User);
        assert_eq!(trimmed[0].text(), "hello");
    }

    #[test]
    fn test_output_is_contiguous_suffix() {
        let messages = transcript_with_tool_round();
        let config = TrimConfig {
            max_messages: 6,
            include_system: false,
        };
        let trimmed = trim_messages(&messages, &config);
        let suffix_len = trimmed.len();
        let expected: Vec<Message> = messages[messages.len() - suffix_len..].to_vec();
        assert_eq!(trimmed, expected);
    }
}
