//! Conversation buffer

use serde::{Deserialize, Serialize};

use crate::message::ChatMessage;

/// Ordered, append-only list of chat messages
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    /// Create an empty transcript
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from existing messages (e.g. a restored mirror)
    #[must_use]
    pub fn from_messages(messages: Vec<ChatMessage>) -> Self {
        Self { messages }
    }

    /// Append a message and return its index
    pub fn push(&mut self, message: ChatMessage) -> usize {
        self.messages.push(message);
        self.messages.len() - 1
    }

    /// Message at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&ChatMessage> {
        self.messages.get(index)
    }

    /// Mutable message at `index`
    pub fn get_mut(&mut self, index: usize) -> Option<&mut ChatMessage> {
        self.messages.get_mut(index)
    }

    /// Last message
    #[must_use]
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Index of the most recent assistant message
    #[must_use]
    pub fn last_assistant_index(&self) -> Option<usize> {
        self.messages.iter().rposition(ChatMessage::is_assistant)
    }

    /// Most recent assistant message
    pub fn last_assistant_mut(&mut self) -> Option<&mut ChatMessage> {
        let index = self.last_assistant_index()?;
        self.messages.get_mut(index)
    }

    /// All messages
    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no messages
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Drop every message
    pub fn clear(&mut self) {
        self.messages.clear();
    }
}
