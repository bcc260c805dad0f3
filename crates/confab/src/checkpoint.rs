//! Per-turn checkpointing of the transcript-so-far.
//!
//! A checkpointer lives for exactly one turn. Entries are keyed by chat
//! id and overwritten on every save (last writer wins); nothing is
//! persisted beyond the turn — durable storage of finished messages
//! belongs to the caller's chat store.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::message::Message;

/// The saved in-progress state of a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnCheckpoint {
    pub chat_id: String,
    pub messages: Vec<Message>,
    pub updated: i64,
}

#[derive(Default)]
pub struct MemoryCheckpointer {
    checkpoints: Mutex<HashMap<String, TurnCheckpoint>>,
}

impl MemoryCheckpointer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, chat_id: &str, messages: &[Message]) {
        let checkpoint = TurnCheckpoint {
            chat_id: chat_id.to_string(),
            messages: messages.to_vec(),
            updated: Utc::now().timestamp(),
        };
        self.checkpoints
            .lock()
            .unwrap()
            .insert(chat_id.to_string(), checkpoint);
    }

    pub fn load(&self, chat_id: &str) -> Option<TurnCheckpoint> {
        self.checkpoints.lock().unwrap().get(chat_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load() {
        let checkpointer = MemoryCheckpointer::new();
        let messages = vec![Message::user().with_text("hi")];
        checkpointer.save("chat-1", &messages);

        let checkpoint = checkpointer.load("chat-1").unwrap();
        assert_eq!(checkpoint.chat_id, "chat-1");
        assert_eq!(checkpoint.messages, messages);
    }

    #[test]
    fn test_chats_are_isolated() {
        let checkpointer = MemoryCheckpointer::new();
        checkpointer.save("chat-1", &[Message::user().with_text("one")]);
        checkpointer.save("chat-2", &[Message::user().with_text("two")]);

        assert_eq!(checkpointer.load("chat-1").unwrap().messages[0].text(), "one");
        assert_eq!(checkpointer.load("chat-2").unwrap().messages[0].text(), "two");
    }

    #[test]
    fn test_last_writer_wins() {
        let checkpointer = MemoryCheckpointer::new();
        checkpointer.save("chat-1", &[Message::user().with_text("first")]);
        checkpointer.save("chat-1", &[Message::user().with_text("second")]);

        let checkpoint = checkpointer.load("chat-1").unwrap();
        assert_eq!(checkpoint.messages.len(), 1);
        assert_eq!(checkpoint.messages[0].text(), "second");
    }

    #[test]
    fn test_missing_chat_is_none() {
        let checkpointer = MemoryCheckpointer::new();
        assert!(checkpointer.load("nope").is_none());
    }
}
