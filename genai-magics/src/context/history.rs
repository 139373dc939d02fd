//! Per-session conversation history with a sliding read window.

use serde::{Deserialize, Serialize};

use super::types::{Message, Role};

/// Ordered record of completed turns.
///
/// Storage grows without bound; prompts only ever see
/// [`windowed`](Self::windowed) suffixes of it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message at the tail.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(Message::new(role, content));
    }

    /// Append a user/assistant exchange.
    pub fn append_turn(&mut self, request: impl Into<String>, response: impl Into<String>) {
        self.append(Role::User, request);
        self.append(Role::Assistant, response);
    }

    /// The last `max_count` messages, oldest first.
    pub fn windowed(&self, max_count: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(max_count);
        &self.messages[start..]
    }

    /// Drop every message.
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
