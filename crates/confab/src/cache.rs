//! Cache-boundary annotation of transcripts.
//!
//! Rules for turn-by-turn conversations:
//! 1. the first system message is always a boundary
//! 2. the last message is a boundary
//! 3. the second user message counted from the end is a boundary
//!
//! The fixed per-turn system instruction is not part of the transcript and
//! carries a permanent boundary when the provider request is built; rule 1
//! covers the case of a caller whose stored transcript begins with its own
//! system message.

use crate::models::message::Message;
use crate::models::role::Role;

/// Annotates cache boundaries on a copy of the transcript.
///
/// The caller's messages are never mutated; callers that hold on to their
/// transcript keep it unannotated.
pub fn annotate_cache_boundaries(messages: &[Message]) -> Vec<Message> {
    let mut annotated: Vec<Message> = messages.to_vec();
    if annotated.is_empty() {
        return annotated;
    }

    if let Some(system) = annotated.iter_mut().find(|m| m.role == Role::System) {
        system.mark_cache_boundary();
    }

    if let Some(last) = annotated.last_mut() {
        last.mark_cache_boundary();
    }

    let mut user_count = 0;
    for message in annotated.iter_mut().rev() {
        if message.role == Role::User {
            user_count += 1;
            if user_count == 2 {
                message.mark_cache_boundary();
                break;
            }
        }
    }

    annotated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundaries(messages: &[Message]) -> Vec<usize> {
        messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.has_cache_boundary())
            .map(|(i, _)| i)
            .collect()
    }

    #[test]
    fn test_input_is_never_mutated() {
        let messages = vec![
            Message::system().with_text("instructions"),
            Message::user().with_text("first"),
            Message::assistant().with_text("answer"),
            Message::user().with_text("second"),
        ];
        let snapshot = messages.clone();

        let _ = annotate_cache_boundaries(&messages);

        assert_eq!(messages, snapshot);
    }

    #[test]
    fn test_marks_last_and_second_to_last_user() {
        let messages = vec![
            Message::user().with_text("first"),
            Message::assistant().with_text("answer one"),
            Message::user().with_text("second"),
            Message::assistant().with_text("answer two"),
            Message::user().with_text("third"),
        ];
        let annotated = annotate_cache_boundaries(&messages);

        // The second user message from the end is index 2; the last
        // message is index 4.
        assert_eq!(boundaries(&annotated), vec![2, 4]);
    }

    #[test]
    fn test_single_user_marks_only_last() {
        let messages = vec![
            Message::user().with_text("hi"),
            Message::assistant().with_text("hello"),
        ];
        let annotated = annotate_cache_boundaries(&messages);
        assert_eq!(boundaries(&annotated), vec![1]);
    }

    #[test]
    fn test_system_message_is_marked() {
        let messages = vec![
            Message::system().with_text("instructions"),
            Message::user().with_text("hi"),
        ];
        let annotated = annotate_cache_boundaries(&messages);
        assert_eq!(boundaries(&annotated), vec![0, 1]);
    }

    #[test]
    fn test_empty_transcript_is_untouched() {
        let annotated = annotate_cache_boundaries(&[]);
        assert!(annotated.is_empty());
    }
}
